use std::future::Future;

use tokio::sync::mpsc::UnboundedReceiver;

use crate::ChatMessage;

/// Receiving half of a message subscription. Dropping it unsubscribes.
pub type MessageReceiver = UnboundedReceiver<ChatMessage>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport is not connected")]
    NotConnected,

    #[error("transport i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The peer-discovery / delivery backend the chat session talks to.
///
/// The session never inspects how peers are found or how messages are encoded on the wire. Every
/// message the user sends must come back through [`Transport::subscribe`] (the backend echoes
/// self-sent messages); the session does not render anything optimistically.
pub trait Transport: Send + Sync + 'static {
    /// Fire-and-forget publish. Delivery failures are the backend's concern.
    fn send_message(&self, content: &str);

    /// Snapshot of the number of reachable peers.
    fn peer_count(&self) -> impl Future<Output = Result<usize, TransportError>> + Send;

    fn username(&self) -> String;

    fn set_username(&self, name: &str);

    /// Start receiving messages in arrival order.
    fn subscribe(&self) -> MessageReceiver;
}
