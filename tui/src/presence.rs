//! Periodic peer-count refresh.

use std::sync::Arc;
use std::time::Duration;

use hush_protocol::Transport;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::app_event::AppEvent;
use crate::app_event::AppEventSender;

/// How often the session asks the transport for a fresh peer count.
///
/// The first fetch happens immediately when the session starts.
pub const PRESENCE_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Spawns the poller task. It runs until `cancel` fires.
///
/// Every successful fetch is posted as [`AppEvent::PeerCount`]; the session overwrites its count
/// with whatever arrives last. A failed fetch is logged and retried on the next tick.
pub fn spawn_presence_poller<T: Transport>(
    transport: Arc<T>,
    interval: Duration,
    app_event_tx: AppEventSender,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = transport.peer_count() => result,
            };

            match result {
                Ok(count) => app_event_tx.send_unless_cancelled(&cancel, AppEvent::PeerCount(count)),
                Err(err) => tracing::warn!("presence poll failed, keeping last peer count: {err}"),
            }
        }
        tracing::debug!("presence poller stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_transport::RecordingTransport;
    use hush_protocol::TransportError;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc::unbounded_channel;

    #[tokio::test(start_paused = true)]
    async fn fetches_immediately_then_once_per_interval() {
        let transport = Arc::new(RecordingTransport::new("me"));
        transport.push_peer_count(Ok(2));
        transport.push_peer_count(Ok(3));
        transport.push_peer_count(Ok(1));
        let (tx, mut rx) = unbounded_channel();
        let cancel = CancellationToken::new();

        let handle = spawn_presence_poller(
            Arc::clone(&transport),
            PRESENCE_POLL_INTERVAL,
            AppEventSender::new(tx),
            cancel.clone(),
        );

        assert_eq!(rx.recv().await, Some(AppEvent::PeerCount(2)));
        assert_eq!(transport.peer_count_calls(), 1);

        tokio::time::advance(PRESENCE_POLL_INTERVAL).await;
        assert_eq!(rx.recv().await, Some(AppEvent::PeerCount(3)));
        tokio::time::advance(PRESENCE_POLL_INTERVAL).await;
        assert_eq!(rx.recv().await, Some(AppEvent::PeerCount(1)));
        assert_eq!(transport.peer_count_calls(), 3);

        cancel.cancel();
        handle.await.expect("poller joins");
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetch_posts_nothing_and_retries_next_tick() {
        let transport = Arc::new(RecordingTransport::new("me"));
        transport.push_peer_count(Err(TransportError::NotConnected));
        transport.push_peer_count(Ok(4));
        let (tx, mut rx) = unbounded_channel();
        let cancel = CancellationToken::new();

        let handle = spawn_presence_poller(
            Arc::clone(&transport),
            PRESENCE_POLL_INTERVAL,
            AppEventSender::new(tx),
            cancel.clone(),
        );

        tokio::time::advance(PRESENCE_POLL_INTERVAL).await;
        assert_eq!(rx.recv().await, Some(AppEvent::PeerCount(4)));
        assert_eq!(transport.peer_count_calls(), 2);

        cancel.cancel();
        handle.await.expect("poller joins");
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_poller_stops_posting() {
        let transport = Arc::new(RecordingTransport::new("me"));
        let (tx, mut rx) = unbounded_channel();
        let cancel = CancellationToken::new();

        let handle = spawn_presence_poller(
            Arc::clone(&transport),
            PRESENCE_POLL_INTERVAL,
            AppEventSender::new(tx),
            cancel.clone(),
        );
        assert_eq!(rx.recv().await, Some(AppEvent::PeerCount(0)));

        cancel.cancel();
        handle.await.expect("poller joins");
        tokio::time::advance(PRESENCE_POLL_INTERVAL * 3).await;

        // The task owned the only sender, so the channel is now closed and drained.
        assert_eq!(rx.recv().await, None);
        assert_eq!(transport.peer_count_calls(), 1);
    }
}
