//! Change notification channel.
//!
//! Signals carry no payload, only "something changed". The channel is bounded
//! and producers never wait: when it is full a rebuild is already pending, and
//! the debounce window would collapse the extra signal anyway.

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::observability::metrics;

/// Producer half of the change channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: mpsc::Sender<()>,
}

/// Create a notifier and the receiver consumed by the rebuild scheduler.
pub fn channel(capacity: usize) -> (ChangeNotifier, mpsc::Receiver<()>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChangeNotifier { tx }, rx)
}

impl ChangeNotifier {
    /// Signal a change without blocking.
    pub fn notify(&self) {
        match self.tx.try_send(()) {
            Ok(()) => {}
            Err(TrySendError::Full(())) => {
                tracing::trace!("Change channel full, rebuild already pending");
                metrics::record_signal_dropped();
            }
            Err(TrySendError::Closed(())) => {
                tracing::debug!("Rebuild scheduler stopped, change signal ignored");
            }
        }
    }
}
