//! Network setup that runs behind the welcome and chat screens.
//!
//! The transport is built on a background task so the UI can come up immediately. Screens poll
//! [`Connection::settle`] from their `select!` loops and render [`ConnectionStatus`] meanwhile.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// How often the connecting spinner advances.
pub const SPINNER_INTERVAL: Duration = Duration::from_millis(150);

pub fn spinner_frame(tick: usize) -> &'static str {
    SPINNER_FRAMES[tick % SPINNER_FRAMES.len()]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    /// Setup failed; holds the error chain for display.
    Failed(String),
}

pub struct Connection<T> {
    status: ConnectionStatus,
    pending: Option<oneshot::Receiver<anyhow::Result<T>>>,
    transport: Option<Arc<T>>,
}

impl<T: Send + 'static> Connection<T> {
    /// Runs `setup` on a background task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<F>(setup: F) -> Self
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();
        tokio::spawn(async move {
            // Nobody is listening if the user quit before setup finished.
            let _ = result_tx.send(setup.await);
        });
        Self::pending(result_rx)
    }
}

impl<T> Connection<T> {
    pub(crate) fn pending(result_rx: oneshot::Receiver<anyhow::Result<T>>) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            pending: Some(result_rx),
            transport: None,
        }
    }

    /// A connection whose transport is already up.
    pub fn ready(transport: Arc<T>) -> Self {
        Self {
            status: ConnectionStatus::Connected,
            pending: None,
            transport: Some(transport),
        }
    }

    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    pub fn is_connecting(&self) -> bool {
        self.status == ConnectionStatus::Connecting
    }

    pub fn transport(&self) -> Option<&Arc<T>> {
        self.transport.as_ref()
    }

    /// Waits for the background setup and records its result.
    ///
    /// Never completes once the connection has settled. Cancel safe.
    pub async fn settle(&mut self) {
        let Some(pending) = self.pending.as_mut() else {
            return std::future::pending().await;
        };
        let result = pending.await;
        self.pending = None;

        self.status = match result {
            Ok(Ok(transport)) => {
                tracing::info!("network ready");
                self.transport = Some(Arc::new(transport));
                ConnectionStatus::Connected
            }
            Ok(Err(err)) => {
                tracing::warn!("network setup failed: {err:#}");
                ConnectionStatus::Failed(format!("{err:#}"))
            }
            Err(_) => {
                tracing::warn!("network setup task stopped without a result");
                ConnectionStatus::Failed("setup task stopped".to_string())
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn settles_to_connected_with_the_transport() {
        let mut connection = Connection::spawn(async { Ok(7_u32) });
        assert_eq!(connection.status(), &ConnectionStatus::Connecting);

        connection.settle().await;
        assert_eq!(connection.status(), &ConnectionStatus::Connected);
        assert_eq!(connection.transport().map(|t| **t), Some(7));
    }

    #[tokio::test]
    async fn settles_to_failed_with_the_error_chain() {
        let mut connection = Connection::<u32>::spawn(async {
            Err(anyhow::anyhow!("address in use").context("join multicast group"))
        });
        connection.settle().await;
        assert_eq!(
            connection.status(),
            &ConnectionStatus::Failed("join multicast group: address in use".to_string())
        );
        assert!(connection.transport().is_none());
    }

    #[tokio::test]
    async fn dropped_setup_task_counts_as_failure() {
        let (result_tx, result_rx) = oneshot::channel::<anyhow::Result<u32>>();
        drop(result_tx);
        let mut connection = Connection::pending(result_rx);
        connection.settle().await;
        assert!(matches!(connection.status(), ConnectionStatus::Failed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn settled_connection_never_completes_again() {
        let mut connection = Connection::ready(Arc::new(1_u32));
        let waited =
            tokio::time::timeout(Duration::from_secs(60), connection.settle()).await;
        assert!(waited.is_err());
        assert_eq!(connection.status(), &ConnectionStatus::Connected);
    }

    #[test]
    fn spinner_wraps_around() {
        assert_eq!(spinner_frame(0), "⠋");
        assert_eq!(spinner_frame(9), "⠏");
        assert_eq!(spinner_frame(10), "⠋");
    }
}
