// AG-UI protocol events for SSE streaming to browser clients.

use serde::{Deserialize, Serialize};

/// Wire events emitted by the agent over SSE.
///
/// Framed as `data: <json>\n\n` with the event type in the `type` field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum AgUiEvent {
    RunStarted {
        thread_id: String,
        run_id: String,
    },
    TextMessageStart {
        message_id: String,
        role: String,
    },
    TextMessageContent {
        message_id: String,
        delta: String,
    },
    TextMessageEnd {
        message_id: String,
    },
    Custom {
        name: String,
        value: serde_json::Value,
    },
    RunFinished {
        thread_id: String,
        run_id: String,
    },
}

impl AgUiEvent {
    pub fn run_started(thread_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self::RunStarted {
            thread_id: thread_id.into(),
            run_id: run_id.into(),
        }
    }

    pub fn run_finished(thread_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self::RunFinished {
            thread_id: thread_id.into(),
            run_id: run_id.into(),
        }
    }

    pub fn text_message_start(message_id: impl Into<String>) -> Self {
        Self::TextMessageStart {
            message_id: message_id.into(),
            role: "assistant".to_string(),
        }
    }

    pub fn text_message_content(message_id: impl Into<String>, delta: impl Into<String>) -> Self {
        Self::TextMessageContent {
            message_id: message_id.into(),
            delta: delta.into(),
        }
    }

    pub fn text_message_end(message_id: impl Into<String>) -> Self {
        Self::TextMessageEnd {
            message_id: message_id.into(),
        }
    }

    pub fn custom(name: impl Into<String>, value: serde_json::Value) -> Self {
        Self::Custom {
            name: name.into(),
            value,
        }
    }

    /// An error surfaced to the client before RUN_FINISHED.
    pub fn error(message: impl Into<String>) -> Self {
        Self::custom("error", serde_json::json!({ "message": message.into() }))
    }

    /// Encode as an SSE frame.
    pub fn to_sse(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        format!("data: {json}\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_tags_are_screaming_snake_case() {
        let event = AgUiEvent::run_started("t1", "r1");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "RUN_STARTED");
        assert_eq!(json["threadId"], "t1");
        assert_eq!(json["runId"], "r1");

        let event = AgUiEvent::text_message_content("m1", "hi");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "TEXT_MESSAGE_CONTENT");
        assert_eq!(json["messageId"], "m1");
        assert_eq!(json["delta"], "hi");
    }

    #[test]
    fn text_message_start_has_assistant_role() {
        let json = serde_json::to_value(AgUiEvent::text_message_start("m")).unwrap();
        assert_eq!(json["role"], "assistant");
    }

    #[test]
    fn sse_framing() {
        let frame = AgUiEvent::text_message_end("m1").to_sse();
        assert!(frame.starts_with("data: {"));
        assert!(frame.ends_with("\n\n"));
    }

    #[test]
    fn error_event_carries_message() {
        let json = serde_json::to_value(AgUiEvent::error("boom")).unwrap();
        assert_eq!(json["type"], "CUSTOM");
        assert_eq!(json["name"], "error");
        assert_eq!(json["value"]["message"], "boom");
    }

    #[test]
    fn round_trip() {
        let events = vec![
            AgUiEvent::run_started("t", "r"),
            AgUiEvent::text_message_start("m"),
            AgUiEvent::text_message_content("m", "x"),
            AgUiEvent::text_message_end("m"),
            AgUiEvent::custom("plan", serde_json::json!({"message": "searching"})),
            AgUiEvent::run_finished("t", "r"),
        ];
        for event in events {
            let json = serde_json::to_string(&event).unwrap();
            let back: AgUiEvent = serde_json::from_str(&json).unwrap();
            assert_eq!(back, event);
        }
    }
}
