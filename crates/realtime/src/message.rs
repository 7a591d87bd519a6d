use serde::{Deserialize, Serialize};

/// Envelope of every frame exchanged over the socket (Phoenix JSON v1)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeMessage {
    pub topic: String,
    pub event: ChannelEvent,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(rename = "ref", default)]
    pub message_ref: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelEvent {
    PostgresChanges,
    #[serde(rename = "phx_join")]
    PhoenixJoin,
    #[serde(rename = "phx_leave")]
    PhoenixLeave,
    #[serde(rename = "phx_reply")]
    PhoenixReply,
    #[serde(rename = "phx_error")]
    PhoenixError,
    #[serde(rename = "phx_close")]
    PhoenixClose,
    Heartbeat,
    AccessToken,
    System,
    #[serde(other)]
    Other,
}

/// Row-change kinds a subscription can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostgresChangeEvent {
    #[serde(rename = "*")]
    All,
    #[serde(rename = "INSERT")]
    Insert,
    #[serde(rename = "UPDATE")]
    Update,
    #[serde(rename = "DELETE")]
    Delete,
}

impl PostgresChangeEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "*",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }

    /// Whether a subscription for `self` wants an event of kind `other`
    pub fn accepts(&self, other: PostgresChangeEvent) -> bool {
        *self == Self::All || *self == other
    }
}

/// One row change delivered to a subscription callback
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PostgresChangePayload {
    pub schema: String,
    pub table: String,
    #[serde(rename = "type", alias = "eventType")]
    pub event_type: PostgresChangeEvent,
    #[serde(default)]
    pub commit_timestamp: Option<String>,
    #[serde(default)]
    pub record: serde_json::Value,
    #[serde(default)]
    pub old_record: serde_json::Value,
}

impl PostgresChangePayload {
    /// Extracts the change from a `postgres_changes` frame payload
    /// (`{"ids": [...], "data": {...}}`).
    pub fn from_frame(payload: &serde_json::Value) -> Result<Self, serde_json::Error> {
        let data = payload.get("data").unwrap_or(payload);
        serde_json::from_value(data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_postgres_change_frame() {
        let raw = json!({
            "topic": "realtime:fridge_sync_h1",
            "event": "postgres_changes",
            "payload": {
                "ids": [12],
                "data": {
                    "schema": "public",
                    "table": "fridge_items",
                    "commit_timestamp": "2024-05-01T10:00:00Z",
                    "type": "UPDATE",
                    "record": { "id": "i1", "quantity": 2 },
                    "old_record": { "id": "i1" },
                    "columns": []
                }
            },
            "ref": null
        });

        let message: RealtimeMessage = serde_json::from_value(raw).unwrap();
        assert_eq!(message.event, ChannelEvent::PostgresChanges);
        assert!(message.message_ref.is_none());

        let change = PostgresChangePayload::from_frame(&message.payload).unwrap();
        assert_eq!(change.event_type, PostgresChangeEvent::Update);
        assert_eq!(change.record["quantity"], 2);
    }

    #[test]
    fn test_unknown_event_does_not_fail() {
        let raw = json!({
            "topic": "realtime:x",
            "event": "presence_state",
            "payload": {},
            "ref": "3"
        });

        let message: RealtimeMessage = serde_json::from_value(raw).unwrap();
        assert_eq!(message.event, ChannelEvent::Other);
    }

    #[test]
    fn test_wildcard_accepts_everything() {
        assert!(PostgresChangeEvent::All.accepts(PostgresChangeEvent::Delete));
        assert!(!PostgresChangeEvent::Insert.accepts(PostgresChangeEvent::Delete));
    }
}
