//! Types shared between the Hush transport backends and the terminal UI.

mod message;
mod transport;

pub use message::ChatMessage;
pub use transport::MessageReceiver;
pub use transport::Transport;
pub use transport::TransportError;
