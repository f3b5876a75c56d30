//! Run-wide cancellation
//!
//! A `CancelSignal` is cloned into every parse and lookup task. Cancelling
//! any clone, or letting a timeout armed with `cancel_after` elapse, stops
//! the tasks that have not finished yet.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

/// Cloneable cancellation flag shared by the tasks of one run
#[derive(Debug, Clone)]
pub struct CancelSignal {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl CancelSignal {
    /// Create a signal that has not been cancelled
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// Cancel the run
    pub fn cancel(&self) {
        if !self.sender.send_replace(true) {
            info!("run cancelled");
        }
    }

    /// Returns true once the run was cancelled
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Completes when the run is cancelled
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            // The sender lives as long as any clone, so this is unreachable
            // while `self` exists; never report a cancellation that did not happen
            std::future::pending::<()>().await;
        }
    }

    /// Cancel the run once `timeout` has elapsed
    ///
    /// Must be called from within a tokio runtime.
    pub fn cancel_after(&self, timeout: Duration) -> tokio::task::JoinHandle<()> {
        let signal = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => {
                    info!(timeout_secs = timeout.as_secs_f64(), "run timed out");
                    signal.cancel();
                }
                _ = signal.cancelled() => {}
            }
        })
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}
