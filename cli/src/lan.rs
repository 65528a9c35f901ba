//! LAN transport: chat and presence over a UDP multicast group.
//!
//! Every node joins the same group and publishes JSON datagrams:
//!
//! ```json
//! {"kind":"chat","from":42,"message":{"sender":"casper","content":"hi","timestamp":1700000000}}
//! {"kind":"presence","from":42}
//! ```
//!
//! `from` is a random per-process node id. Datagrams carrying our own id (multicast loopback) are
//! dropped on receive; sent messages are echoed to local subscribers directly instead.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::net::SocketAddr;
use std::net::SocketAddrV4;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use hush_protocol::ChatMessage;
use hush_protocol::MessageReceiver;
use hush_protocol::Transport;
use hush_protocol::TransportError;
use serde::Deserialize;
use serde::Serialize;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::mpsc::unbounded_channel;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub const DEFAULT_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 42, 99);
pub const DEFAULT_PORT: u16 = 47474;

/// How often this node announces itself.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

/// A peer counts as active while its last datagram is younger than this.
pub const PEER_TTL: Duration = Duration::from_secs(5);

const MAX_DATAGRAM_LEN: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanConfig {
    pub group: Ipv4Addr,
    pub port: u16,
}

impl Default for LanConfig {
    fn default() -> Self {
        Self {
            group: DEFAULT_GROUP,
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Datagram {
    Chat { from: u64, message: ChatMessage },
    Presence { from: u64 },
}

impl Datagram {
    fn sender_id(&self) -> u64 {
        match self {
            Datagram::Chat { from, .. } | Datagram::Presence { from } => *from,
        }
    }
}

fn encode_datagram(datagram: &Datagram) -> Result<Vec<u8>, TransportError> {
    Ok(serde_json::to_vec(datagram)?)
}

fn decode_datagram(bytes: &[u8]) -> Option<Datagram> {
    match serde_json::from_slice(bytes) {
        Ok(datagram) => Some(datagram),
        Err(err) => {
            tracing::debug!("dropping malformed datagram ({} bytes): {err}", bytes.len());
            None
        }
    }
}

/// State shared between the transport handle and its socket tasks.
struct LanState {
    node_id: u64,
    username: Mutex<String>,
    subscribers: Mutex<Vec<UnboundedSender<ChatMessage>>>,
    /// Last time each remote node was heard from.
    peers: Mutex<HashMap<u64, Instant>>,
    connected: AtomicBool,
}

impl LanState {
    fn new(node_id: u64, username: &str) -> Self {
        Self {
            node_id,
            username: Mutex::new(username.to_string()),
            subscribers: Mutex::new(Vec::new()),
            peers: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(true),
        }
    }

    fn username(&self) -> String {
        lock(&self.username).clone()
    }

    fn subscribe(&self) -> MessageReceiver {
        let (tx, rx) = unbounded_channel();
        lock(&self.subscribers).push(tx);
        rx
    }

    /// Fans `message` out to live subscribers, forgetting dropped ones.
    fn deliver(&self, message: &ChatMessage) {
        lock(&self.subscribers).retain(|tx| tx.send(message.clone()).is_ok());
    }

    fn handle_datagram(&self, bytes: &[u8], now: Instant) {
        let Some(datagram) = decode_datagram(bytes) else {
            return;
        };
        let from = datagram.sender_id();
        if from == self.node_id {
            return;
        }
        lock(&self.peers).insert(from, now);
        if let Datagram::Chat { message, .. } = datagram {
            self.deliver(&message);
        }
    }

    /// Distinct remote nodes heard from within [`PEER_TTL`] of `now`. Expired peers are pruned.
    fn active_peers(&self, now: Instant) -> usize {
        let mut peers = lock(&self.peers);
        peers.retain(|_, last_seen| now.saturating_duration_since(*last_seen) < PEER_TTL);
        peers.len()
    }
}

/// Recovers the guard from a poisoned lock.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

pub struct LanTransport {
    state: Arc<LanState>,
    outbound_tx: UnboundedSender<Vec<u8>>,
    tasks: Vec<JoinHandle<()>>,
}

impl LanTransport {
    /// Joins the multicast group and starts the receive, send and heartbeat tasks.
    pub async fn bind(config: LanConfig, username: &str) -> Result<Self, TransportError> {
        let socket =
            UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port)).await?;
        socket.join_multicast_v4(config.group, Ipv4Addr::UNSPECIFIED)?;
        socket.set_multicast_loop_v4(true)?;
        let socket = Arc::new(socket);
        let target = SocketAddr::V4(SocketAddrV4::new(config.group, config.port));

        let node_id = rand::random::<u64>();
        let state = Arc::new(LanState::new(node_id, username));
        let (outbound_tx, outbound_rx) = unbounded_channel();

        let tasks = vec![
            spawn_receiver(Arc::clone(&socket), Arc::clone(&state)),
            spawn_sender(socket, target, outbound_rx),
            spawn_heartbeat(node_id, outbound_tx.clone()),
        ];

        tracing::info!(
            node_id,
            group = %config.group,
            port = config.port,
            "joined multicast group"
        );
        Ok(Self {
            state,
            outbound_tx,
            tasks,
        })
    }

    fn publish(&self, datagram: &Datagram) -> Result<(), TransportError> {
        let bytes = encode_datagram(datagram)?;
        self.outbound_tx
            .send(bytes)
            .map_err(|_| TransportError::NotConnected)
    }
}

impl Transport for LanTransport {
    fn send_message(&self, content: &str) {
        let message = ChatMessage::now(self.state.username(), content);
        let datagram = Datagram::Chat {
            from: self.state.node_id,
            message: message.clone(),
        };
        if let Err(err) = self.publish(&datagram) {
            tracing::warn!("failed to publish chat message: {err}");
        }
        self.state.deliver(&message);
    }

    async fn peer_count(&self) -> Result<usize, TransportError> {
        if !self.state.connected.load(Ordering::Relaxed) {
            return Err(TransportError::NotConnected);
        }
        Ok(self.state.active_peers(Instant::now()))
    }

    fn username(&self) -> String {
        self.state.username()
    }

    fn set_username(&self, name: &str) {
        *lock(&self.state.username) = name.to_string();
    }

    fn subscribe(&self) -> MessageReceiver {
        self.state.subscribe()
    }
}

impl Drop for LanTransport {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn spawn_receiver(socket: Arc<UdpSocket>, state: Arc<LanState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = vec![0u8; MAX_DATAGRAM_LEN];
        loop {
            match socket.recv_from(&mut buf).await {
                Ok((len, _addr)) => state.handle_datagram(&buf[..len], Instant::now()),
                Err(err) => {
                    tracing::warn!("multicast receive failed, stopping: {err}");
                    state.connected.store(false, Ordering::Relaxed);
                    break;
                }
            }
        }
    })
}

fn spawn_sender(
    socket: Arc<UdpSocket>,
    target: SocketAddr,
    mut outbound_rx: UnboundedReceiver<Vec<u8>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(bytes) = outbound_rx.recv().await {
            if let Err(err) = socket.send_to(&bytes, target).await {
                tracing::warn!("multicast send failed: {err}");
            }
        }
    })
}

fn spawn_heartbeat(node_id: u64, outbound_tx: UnboundedSender<Vec<u8>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let presence = match encode_datagram(&Datagram::Presence { from: node_id }) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!("failed to encode presence heartbeat: {err}");
                return;
            }
        };
        let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if outbound_tx.send(presence.clone()).is_err() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SELF_ID: u64 = 7;

    fn chat_bytes(from: u64, content: &str) -> Vec<u8> {
        encode_datagram(&Datagram::Chat {
            from,
            message: ChatMessage::new("peer", content, 1_700_000_000),
        })
        .expect("encode")
    }

    fn presence_bytes(from: u64) -> Vec<u8> {
        encode_datagram(&Datagram::Presence { from }).expect("encode")
    }

    #[test]
    fn datagrams_use_tagged_json() {
        let bytes = presence_bytes(42);
        assert_eq!(
            String::from_utf8(bytes).expect("utf8"),
            r#"{"kind":"presence","from":42}"#
        );

        let decoded = decode_datagram(
            br#"{"kind":"chat","from":3,"message":{"sender":"a","content":"b","timestamp":5}}"#,
        );
        assert_eq!(
            decoded,
            Some(Datagram::Chat {
                from: 3,
                message: ChatMessage::new("a", "b", 5),
            })
        );
    }

    #[test]
    fn malformed_datagrams_are_skipped() {
        let state = LanState::new(SELF_ID, "me");
        let mut rx = state.subscribe();
        let now = Instant::now();

        state.handle_datagram(b"not json", now);
        state.handle_datagram(br#"{"kind":"shout","from":1}"#, now);

        assert!(rx.try_recv().is_err());
        assert_eq!(state.active_peers(now), 0);
    }

    #[test]
    fn remote_chat_is_delivered_and_counts_as_presence() {
        let state = LanState::new(SELF_ID, "me");
        let mut rx = state.subscribe();
        let now = Instant::now();

        state.handle_datagram(&chat_bytes(1, "hello"), now);

        assert_eq!(rx.try_recv().expect("message").content, "hello");
        assert_eq!(state.active_peers(now), 1);
    }

    #[test]
    fn own_datagrams_are_ignored() {
        let state = LanState::new(SELF_ID, "me");
        let mut rx = state.subscribe();
        let now = Instant::now();

        state.handle_datagram(&chat_bytes(SELF_ID, "echo"), now);
        state.handle_datagram(&presence_bytes(SELF_ID), now);

        assert!(rx.try_recv().is_err());
        assert_eq!(state.active_peers(now), 0);
    }

    #[test]
    fn peers_expire_after_ttl() {
        let state = LanState::new(SELF_ID, "me");
        let start = Instant::now();
        state.handle_datagram(&presence_bytes(1), start);
        state.handle_datagram(&presence_bytes(2), start + Duration::from_secs(3));
        state.handle_datagram(&presence_bytes(1), start + Duration::from_secs(1));

        assert_eq!(state.active_peers(start + Duration::from_secs(4)), 2);
        assert_eq!(state.active_peers(start + Duration::from_secs(6)), 1);
        assert_eq!(state.active_peers(start + Duration::from_secs(8)), 0);
    }

    #[test]
    fn dropped_subscribers_are_forgotten() {
        let state = LanState::new(SELF_ID, "me");
        let rx = state.subscribe();
        let mut kept = state.subscribe();
        drop(rx);

        state.deliver(&ChatMessage::new("a", "b", 0));

        assert_eq!(lock(&state.subscribers).len(), 1);
        assert_eq!(kept.try_recv().expect("message").content, "b");
    }

    #[tokio::test]
    async fn send_publishes_and_echoes_locally() {
        let state = Arc::new(LanState::new(SELF_ID, "casper"));
        let (outbound_tx, mut outbound_rx) = unbounded_channel();
        let transport = LanTransport {
            state: Arc::clone(&state),
            outbound_tx,
            tasks: Vec::new(),
        };
        let mut rx = transport.subscribe();

        transport.send_message("hi all");

        let echoed = rx.try_recv().expect("echo");
        assert_eq!(echoed.sender, "casper");
        assert_eq!(echoed.content, "hi all");

        let published = decode_datagram(&outbound_rx.recv().await.expect("datagram"));
        assert_eq!(
            published,
            Some(Datagram::Chat {
                from: SELF_ID,
                message: echoed,
            })
        );
    }

    #[tokio::test]
    async fn username_changes_apply_to_later_sends() {
        let (outbound_tx, _outbound_rx) = unbounded_channel();
        let transport = LanTransport {
            state: Arc::new(LanState::new(SELF_ID, "")),
            outbound_tx,
            tasks: Vec::new(),
        };
        transport.set_username("Ghost-123");
        let mut rx = transport.subscribe();

        transport.send_message("boo");

        assert_eq!(transport.username(), "Ghost-123");
        assert_eq!(rx.try_recv().expect("echo").sender, "Ghost-123");
        assert_eq!(transport.peer_count().await.expect("count"), 0);
    }
}
