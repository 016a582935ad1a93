//! Background loads.
//!
//! A [`LoadTask`] runs on the tokio runtime and reports through a channel
//! of [`ProgressEvent`]s. The event stream ends when the load finishes;
//! the result is then collected with [`LoadTask::join`].

use std::future::Future;

use region_map_acquisition::{Cancellation, ChannelProgress, ProgressEvent};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::SessionError;

/// A spawned load.
#[derive(Debug)]
pub struct LoadTask<T> {
    /// Progress events. Closed once the load has finished.
    pub events: mpsc::UnboundedReceiver<ProgressEvent>,
    cancel: Cancellation,
    handle: JoinHandle<Result<T, SessionError>>,
}

impl<T: Send + 'static> LoadTask<T> {
    /// Spawns `load`, handing it the progress sink and cancel flag.
    pub fn spawn<F, Fut>(load: F) -> Self
    where
        F: FnOnce(ChannelProgress, Cancellation) -> Fut,
        Fut: Future<Output = Result<T, SessionError>> + Send + 'static,
    {
        let (progress, events) = ChannelProgress::channel();
        let cancel = Cancellation::new();
        let handle = tokio::spawn(load(progress, cancel.clone()));
        Self {
            events,
            cancel,
            handle,
        }
    }

    /// Stops issuing further batches. A batch already in flight completes.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A handle that can cancel this task from elsewhere.
    #[must_use]
    pub fn cancellation(&self) -> Cancellation {
        self.cancel.clone()
    }

    /// Returns `true` once the load has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the load.
    ///
    /// # Errors
    ///
    /// Returns the load's own error, or [`SessionError::Task`] if it
    /// panicked or was aborted.
    pub async fn join(self) -> Result<T, SessionError> {
        self.handle.await.map_err(|e| SessionError::Task {
            message: e.to_string(),
        })?
    }
}
