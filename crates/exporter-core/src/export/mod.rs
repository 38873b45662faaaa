//! Asynchronous, cancellable export of audio assets

mod exporter;
mod handle;
mod progress;
mod status;
mod worker;

pub use exporter::Exporter;
pub use handle::ExportHandle;
pub use progress::{CancelToken, ProgressCell};
pub use status::{ExportSnapshot, ExportStatus};
