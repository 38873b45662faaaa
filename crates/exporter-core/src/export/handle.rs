//! Caller-side view of a running export

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio_stream::wrappers::WatchStream;
use uuid::Uuid;

use super::status::ExportStatus;
use super::worker::ExportShared;
use crate::error::{Error, Result};
use crate::format::ExportFormat;

/// Returned by [`Exporter::export`](super::Exporter::export). Resolves to
/// the output path or the error that ended the export, exactly once.
pub struct ExportHandle {
    shared: Arc<ExportShared>,
    outcome: oneshot::Receiver<Result<PathBuf>>,
}

impl ExportHandle {
    pub(crate) fn new(
        shared: Arc<ExportShared>,
        outcome: oneshot::Receiver<Result<PathBuf>>,
    ) -> Self {
        Self { shared, outcome }
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn format(&self) -> ExportFormat {
        self.shared.format
    }

    /// Where the file is written on success
    pub fn output_path(&self) -> &Path {
        &self.shared.path
    }

    pub fn progress(&self) -> f32 {
        self.shared.progress.get()
    }

    pub fn status(&self) -> ExportStatus {
        self.shared.status()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<f32> {
        self.shared.progress.subscribe()
    }

    /// The current progress followed by every later change
    pub fn progress_stream(&self) -> WatchStream<f32> {
        WatchStream::new(self.subscribe_progress())
    }

    /// Request cooperative cancellation of this export
    pub fn cancel(&self) {
        self.shared.cancel.cancel();
    }

    /// Wait for the outcome
    pub async fn wait(self) -> Result<PathBuf> {
        self.outcome.await.unwrap_or_else(|_| Err(lost_outcome()))
    }

    /// Block the current thread until the outcome arrives.
    ///
    /// Panics when called from within an async runtime; use [`wait`](Self::wait) there.
    pub fn wait_blocking(self) -> Result<PathBuf> {
        self.outcome.blocking_recv().unwrap_or_else(|_| Err(lost_outcome()))
    }
}

fn lost_outcome() -> Error {
    Error::EncodeError("export worker stopped without an outcome".to_string())
}

impl std::fmt::Debug for ExportHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportHandle")
            .field("id", &self.shared.id)
            .field("format", &self.shared.format)
            .field("path", &self.shared.path)
            .field("status", &self.shared.status())
            .finish()
    }
}
