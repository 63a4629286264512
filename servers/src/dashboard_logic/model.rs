use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientMessage {
    pub subscribe: Option<Vec<String>>,
    pub unsubscribe: Option<Vec<String>>,
    pub refresh: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerMessage {
    pub r#type: String,
    pub domain: Option<String>,
    pub snapshot: Option<Value>,
    pub error: Option<String>,
    pub ack: Option<bool>,
}

impl ServerMessage {
    pub fn snapshot(domain: &str, snapshot: Value) -> Self {
        Self {
            r#type: "snapshot".to_string(),
            domain: Some(domain.to_string()),
            snapshot: Some(snapshot),
            error: None,
            ack: None,
        }
    }

    pub fn ack() -> Self {
        Self {
            r#type: "ack".to_string(),
            domain: None,
            snapshot: None,
            error: None,
            ack: Some(true),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            r#type: "error".to_string(),
            domain: None,
            snapshot: None,
            error: Some(message.into()),
            ack: None,
        }
    }
}
