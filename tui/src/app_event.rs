//! Events posted into the chat loop by background tasks.
//!
//! Background tasks never touch session state directly. They post an [`AppEvent`] through an
//! [`AppEventSender`], and the loop applies it on its own turn, one event at a time.

use hush_protocol::ChatMessage;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// A message delivered by the transport subscription, in arrival order.
    MessageReceived(ChatMessage),

    /// Result of a presence poll.
    PeerCount(usize),
}

#[derive(Clone, Debug)]
pub struct AppEventSender {
    app_event_tx: UnboundedSender<AppEvent>,
}

impl AppEventSender {
    pub fn new(app_event_tx: UnboundedSender<AppEvent>) -> Self {
        Self { app_event_tx }
    }

    /// Send an event to the chat loop. A closed loop just drops the event.
    pub fn send(&self, event: AppEvent) {
        if let Err(err) = self.app_event_tx.send(event) {
            tracing::debug!("chat loop is gone, dropping event: {:?}", err.0);
        }
    }

    /// Like [`AppEventSender::send`], but drops the event once the owning session is torn down.
    pub fn send_unless_cancelled(&self, cancel: &CancellationToken, event: AppEvent) {
        if cancel.is_cancelled() {
            return;
        }
        self.send(event);
    }
}
