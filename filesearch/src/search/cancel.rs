use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Caller-driven abort signal for one search.
///
/// Clones observe the same token. `is_cancelled` is the polling side used
/// by workers between records; `signal` is a channel whose sender is
/// dropped on cancellation, so a feeder blocked inside
/// `crossbeam_channel::select!` wakes immediately instead of waiting on
/// channel capacity.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    guard: Arc<Mutex<Option<Sender<()>>>>,
    signal: Receiver<()>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            guard: Arc::new(Mutex::new(Some(tx))),
            signal: rx,
        }
    }

    /// Requests cancellation. Idempotent; wakes every blocked `select!`
    /// holding this token's signal.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        // Dropping the sender disconnects the signal channel.
        self.guard.lock().take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Receiver that becomes disconnected once `cancel` is called.
    pub(crate) fn signal(&self) -> &Receiver<()> {
        &self.signal
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
