//! Cooperative cancellation for the sync worker.
//!
//! Cancellation is a single boolean flag that the worker polls at every
//! suspension point: the top of the sync loop, before each event read, at
//! block boundaries inside the snapshot dumper, and inside the prepare retry
//! loop. The flag rides on a watch channel so the owning handle can flip it
//! without sharing state with the worker.

use tokio::sync::watch;

/// Transmitter side of the shutdown flag.
///
/// Held by the pipeline; sending `true` requests cancellation of every
/// worker holding a matching [`ShutdownRx`].
pub type ShutdownTx = watch::Sender<bool>;

/// Receiver side of the shutdown flag.
///
/// Cheap to clone and to poll; `is_cancelled` never blocks.
#[derive(Debug, Clone)]
pub struct ShutdownRx(watch::Receiver<bool>);

impl ShutdownRx {
    /// Returns `true` once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }
}

/// Creates a new shutdown flag in the "running" state.
pub fn create_shutdown() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(false);
    (tx, ShutdownRx(rx))
}
