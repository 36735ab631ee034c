//! Control frames sent by clients.

use serde::Deserialize;

/// A typed control message consumed by the connection lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    Subscribe { topic: String },
    Unsubscribe { topic: String },
    /// The socket closed or errored.
    Closed,
}

/// Why an inbound frame was ignored.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("binary frame is not valid UTF-8")]
    NotUtf8,
    #[error("missing or non-string 'action'")]
    MissingAction,
    #[error("unknown action '{0}'")]
    UnknownAction(String),
    #[error("action '{0}' requires a non-empty string 'topic'")]
    MissingTopic(String),
}

#[derive(Deserialize)]
struct RawFrame {
    action: Option<serde_json::Value>,
    topic: Option<serde_json::Value>,
}

impl ControlMessage {
    /// Parse a text frame of the form `{"action": "...", "topic": "..."}`.
    ///
    /// Extra fields are ignored.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let raw: RawFrame = serde_json::from_str(text)?;
        let action = match raw.action {
            Some(serde_json::Value::String(action)) => action,
            _ => return Err(ProtocolError::MissingAction),
        };
        let topic = match raw.topic {
            Some(serde_json::Value::String(topic)) if !topic.is_empty() => Some(topic),
            _ => None,
        };

        match (action.as_str(), topic) {
            ("subscribe", Some(topic)) => Ok(Self::Subscribe { topic }),
            ("unsubscribe", Some(topic)) => Ok(Self::Unsubscribe { topic }),
            ("subscribe" | "unsubscribe", None) => Err(ProtocolError::MissingTopic(action)),
            _ => Err(ProtocolError::UnknownAction(action)),
        }
    }

    /// Parse a binary frame carrying the same JSON as UTF-8.
    pub fn parse_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let text = std::str::from_utf8(bytes).map_err(|_| ProtocolError::NotUtf8)?;
        Self::parse(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subscribe_and_unsubscribe() {
        assert_eq!(
            ControlMessage::parse(r#"{"action":"subscribe","topic":"scraper_logs"}"#).unwrap(),
            ControlMessage::Subscribe {
                topic: "scraper_logs".into()
            }
        );
        assert_eq!(
            ControlMessage::parse(r#"{"topic":"dashboard_summary","action":"unsubscribe"}"#)
                .unwrap(),
            ControlMessage::Unsubscribe {
                topic: "dashboard_summary".into()
            }
        );
    }

    #[test]
    fn extra_fields_are_ignored() {
        let msg = ControlMessage::parse(r#"{"action":"subscribe","topic":"t","id":7}"#).unwrap();
        assert_eq!(msg, ControlMessage::Subscribe { topic: "t".into() });
    }

    #[test]
    fn rejects_malformed_frames() {
        assert!(matches!(
            ControlMessage::parse("not json"),
            Err(ProtocolError::Json(_))
        ));
        assert!(matches!(
            ControlMessage::parse("42"),
            Err(ProtocolError::Json(_))
        ));
        assert!(matches!(
            ControlMessage::parse(r#"{"topic":"t"}"#),
            Err(ProtocolError::MissingAction)
        ));
        assert!(matches!(
            ControlMessage::parse(r#"{"action":42,"topic":"t"}"#),
            Err(ProtocolError::MissingAction)
        ));
        assert!(matches!(
            ControlMessage::parse(r#"{"action":"publish","topic":"t"}"#),
            Err(ProtocolError::UnknownAction(a)) if a == "publish"
        ));
    }

    #[test]
    fn topic_must_be_non_empty_string() {
        for frame in [
            r#"{"action":"subscribe"}"#,
            r#"{"action":"subscribe","topic":""}"#,
            r#"{"action":"unsubscribe","topic":null}"#,
            r#"{"action":"subscribe","topic":["a"]}"#,
        ] {
            assert!(
                matches!(ControlMessage::parse(frame), Err(ProtocolError::MissingTopic(_))),
                "{frame}"
            );
        }
    }

    #[test]
    fn binary_frames_must_be_utf8() {
        assert!(matches!(
            ControlMessage::parse_bytes(&[0xff, 0xfe]),
            Err(ProtocolError::NotUtf8)
        ));
        assert_eq!(
            ControlMessage::parse_bytes(br#"{"action":"subscribe","topic":"x"}"#).unwrap(),
            ControlMessage::Subscribe { topic: "x".into() }
        );
    }
}
