//! In-memory [`Transport`] used by unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use hush_protocol::ChatMessage;
use hush_protocol::MessageReceiver;
use hush_protocol::Transport;
use hush_protocol::TransportError;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::mpsc::unbounded_channel;

/// Records sends and lets tests push incoming messages and scripted peer counts.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<String>>,
    username: Mutex<String>,
    subscribers: Mutex<Vec<UnboundedSender<ChatMessage>>>,
    peer_counts: Mutex<VecDeque<Result<usize, TransportError>>>,
    peer_count_calls: AtomicUsize,
}

impl RecordingTransport {
    pub fn new(username: &str) -> Self {
        let transport = Self::default();
        transport.set_username(username);
        transport
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn peer_count_calls(&self) -> usize {
        self.peer_count_calls.load(Ordering::SeqCst)
    }

    /// Queue the result of a future `peer_count()` call. When the queue is empty the transport
    /// reports zero peers.
    pub fn push_peer_count(&self, result: Result<usize, TransportError>) {
        self.peer_counts.lock().unwrap().push_back(result);
    }

    /// Deliver `message` to every live subscriber.
    pub fn deliver(&self, message: ChatMessage) {
        self.subscribers
            .lock()
            .unwrap()
            .retain(|tx| tx.send(message.clone()).is_ok());
    }

    pub fn live_subscribers(&self) -> usize {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }
}

impl Transport for RecordingTransport {
    fn send_message(&self, content: &str) {
        self.sent.lock().unwrap().push(content.to_string());
    }

    async fn peer_count(&self) -> Result<usize, TransportError> {
        self.peer_count_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.peer_counts.lock().unwrap().pop_front();
        next.unwrap_or(Ok(0))
    }

    fn username(&self) -> String {
        self.username.lock().unwrap().clone()
    }

    fn set_username(&self, name: &str) {
        *self.username.lock().unwrap() = name.to_string();
    }

    fn subscribe(&self) -> MessageReceiver {
        let (tx, rx) = unbounded_channel();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }
}
