//! Progress reporting for long-running acquisitions.
//!
//! The client reports through [`ProgressCallback`] after every batch.
//! Rendering is left to the caller: the CLI drives an `indicatif` bar,
//! background loads forward [`ProgressEvent`]s over a channel with
//! [`ChannelProgress`], and tests use [`NullProgress`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

/// Receives progress updates from long-running operations.
///
/// Implementations must be `Send + Sync` so one instance can be shared
/// with spawned tasks.
pub trait ProgressCallback: Send + Sync {
    /// Set the total expected units of work.
    fn set_total(&self, total: u64);

    /// Advance progress by `delta` units.
    fn inc(&self, delta: u64);

    /// Update the status message.
    fn set_message(&self, msg: String);

    /// Mark progress as complete with a final message.
    fn finish(&self, msg: String);
}

/// Ignores all progress updates.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}

/// Forwards only status messages to an outer callback.
///
/// Used for a step nested inside a larger operation: the step's totals
/// and its `finish` must not end or reset the outer progress, so `finish`
/// becomes a plain message.
pub struct MessagesOnly<'a>(pub &'a dyn ProgressCallback);

impl ProgressCallback for MessagesOnly<'_> {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}

    fn set_message(&self, msg: String) {
        self.0.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.0.set_message(msg);
    }
}

/// A status update emitted by a background load.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Human-readable status.
    pub message: String,
    /// Completion percentage, when the total is known.
    pub percent: Option<f64>,
    /// `true` for the final event of an operation.
    pub finished: bool,
}

/// Forwards progress as [`ProgressEvent`]s over an unbounded channel.
///
/// A dropped receiver is ignored; the operation keeps running.
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressEvent>,
    total: AtomicU64,
    position: AtomicU64,
}

impl ChannelProgress {
    /// Creates the callback together with its receiving end.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                total: AtomicU64::new(0),
                position: AtomicU64::new(0),
            },
            rx,
        )
    }

    #[allow(clippy::cast_precision_loss)]
    fn percent(&self) -> Option<f64> {
        let total = self.total.load(Ordering::Relaxed);
        (total > 0).then(|| {
            let position = self.position.load(Ordering::Relaxed).min(total);
            position as f64 / total as f64 * 100.0
        })
    }

    fn send(&self, message: String, percent: Option<f64>, finished: bool) {
        let _ = self.tx.send(ProgressEvent {
            message,
            percent,
            finished,
        });
    }
}

impl ProgressCallback for ChannelProgress {
    fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
        self.position.store(0, Ordering::Relaxed);
    }

    fn inc(&self, delta: u64) {
        self.position.fetch_add(delta, Ordering::Relaxed);
    }

    fn set_message(&self, msg: String) {
        self.send(msg, self.percent(), false);
    }

    fn finish(&self, msg: String) {
        self.send(msg, Some(100.0), true);
    }
}
