//! Run cancellation signal.
//!
//! A watch channel carrying `false` until shutdown is requested. Receivers can be cloned freely
//! and observe the request at their next check point, or wake up from [`wait_for_shutdown`].

use tokio::sync::watch;

/// Receiver side of the shutdown signal.
pub type ShutdownRx = watch::Receiver<bool>;

/// Sender side of the shutdown signal.
#[derive(Debug, Clone)]
pub struct ShutdownTx(watch::Sender<bool>);

impl ShutdownTx {
    /// Requests shutdown of every run holding a receiver of this channel.
    pub fn shutdown(&self) -> Result<(), watch::error::SendError<bool>> {
        self.0.send(true)
    }

    /// Creates a new receiver for this channel.
    pub fn subscribe(&self) -> ShutdownRx {
        self.0.subscribe()
    }
}

/// Creates a shutdown channel in the not-requested state.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTx(tx), rx)
}

/// Returns `true` once shutdown was requested.
pub fn is_shutdown_requested(shutdown_rx: &ShutdownRx) -> bool {
    *shutdown_rx.borrow()
}

/// Completes when shutdown is requested. Never completes if the sender is dropped first.
pub async fn wait_for_shutdown(shutdown_rx: &mut ShutdownRx) {
    loop {
        if *shutdown_rx.borrow_and_update() {
            return;
        }

        if shutdown_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
