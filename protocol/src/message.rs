use chrono::DateTime;
use chrono::Local;
use chrono::TimeZone;
use serde::Deserialize;
use serde::Serialize;

/// A chat message as it travels between peers.
///
/// `timestamp` is unix seconds as reported by the sender. It is used for display only; ordering
/// in the UI is strictly arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: String,
    pub content: String,
    pub timestamp: i64,
}

impl ChatMessage {
    pub fn new(sender: impl Into<String>, content: impl Into<String>, timestamp: i64) -> Self {
        Self {
            sender: sender.into(),
            content: content.into(),
            timestamp,
        }
    }

    /// Creates a message stamped with the current wall-clock time.
    pub fn now(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(sender, content, chrono::Utc::now().timestamp())
    }

    /// The sender's timestamp in the local timezone, if it is representable.
    pub fn local_time(&self) -> Option<DateTime<Local>> {
        Local.timestamp_opt(self.timestamp, 0).single()
    }
}
