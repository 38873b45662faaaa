//! The export façade

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::handle::ExportHandle;
use super::status::{ExportSnapshot, ExportStatus};
use super::worker::{self, Completion, ExportShared};
use crate::asset::AudioAsset;
use crate::config::ExporterConfig;
use crate::error::{Error, Result};
use crate::format::ExportFormat;
use crate::output::resolve_output_location;

/// Converts audio assets into files of a requested format, one export at a time.
///
/// Work runs on a dedicated thread; `export` returns immediately with an
/// [`ExportHandle`] that resolves to the output path or an error.
pub struct Exporter {
    config: ExporterConfig,
    current: Mutex<Option<Arc<ExportShared>>>,
}

impl Exporter {
    pub fn new(config: ExporterConfig) -> Result<Self> {
        config.validate()?;
        info!("Exporter writing to {:?}", config.output_dir);
        Ok(Self {
            config,
            current: Mutex::new(None),
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(ExporterConfig::default())
    }

    pub fn config(&self) -> &ExporterConfig {
        &self.config
    }

    /// Formats this build can export to
    pub fn supported_formats(&self) -> Vec<ExportFormat> {
        ExportFormat::supported()
    }

    /// Deterministic destination for `format`; an existing file there is deleted
    pub fn resolve_output_location(&self, format: ExportFormat) -> Result<PathBuf> {
        resolve_output_location(&self.config.output_dir, &self.config.file_stem, format)
    }

    /// Start exporting `asset` to `format`.
    ///
    /// Fails without starting any work when the format is unavailable in
    /// this build, another export is still running, or the output location
    /// cannot be prepared.
    pub fn export<A>(&self, asset: A, format: ExportFormat) -> Result<ExportHandle>
    where
        A: AudioAsset + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let completion = Completion::new(move |outcome| {
            let _ = tx.send(outcome);
        });
        let shared = self
            .start(asset, format, completion)
            .map_err(|(e, completion)| {
                if let Some(completion) = completion {
                    completion.discard();
                }
                e
            })?;
        Ok(ExportHandle::new(shared, rx))
    }

    /// Start an export whose outcome goes to `on_complete`.
    ///
    /// `on_complete` runs exactly once: on the worker thread when the export
    /// ends, or immediately on this thread when the export cannot start.
    /// Returns the export id when work was started.
    pub fn export_with<A, F>(&self, asset: A, format: ExportFormat, on_complete: F) -> Option<Uuid>
    where
        A: AudioAsset + 'static,
        F: FnOnce(Result<PathBuf>) + Send + 'static,
    {
        match self.start(asset, format, Completion::new(on_complete)) {
            Ok(shared) => Some(shared.id),
            Err((e, completion)) => {
                if let Some(completion) = completion {
                    completion.deliver(Err(e));
                }
                None
            }
        }
    }

    /// Export to the Core Audio Format container
    pub fn export_caf<A>(&self, asset: A) -> Result<ExportHandle>
    where
        A: AudioAsset + 'static,
    {
        self.export(asset, ExportFormat::Caf)
    }

    /// Export to MP3 through LAME
    #[cfg(feature = "lame")]
    pub fn export_mp3<A>(&self, asset: A) -> Result<ExportHandle>
    where
        A: AudioAsset + 'static,
    {
        self.export(asset, ExportFormat::Mp3)
    }

    /// Request cancellation of the running export. No-op when idle.
    pub fn cancel(&self) {
        let current = self.lock_current();
        match current.as_ref() {
            Some(shared) if shared.status() == ExportStatus::Exporting => {
                info!(id = %shared.id, "Cancelling export");
                shared.cancel.cancel();
            }
            _ => debug!("Cancel requested with no export in flight"),
        }
    }

    /// Progress of the latest export, 0.0 before any export has started
    pub fn progress(&self) -> f32 {
        self.lock_current()
            .as_ref()
            .map(|s| s.progress.get())
            .unwrap_or(0.0)
    }

    pub fn status(&self) -> ExportStatus {
        self.lock_current()
            .as_ref()
            .map(|s| s.status())
            .unwrap_or_default()
    }

    pub fn is_exporting(&self) -> bool {
        self.status() == ExportStatus::Exporting
    }

    pub fn snapshot(&self) -> ExportSnapshot {
        match self.lock_current().as_ref() {
            Some(s) => ExportSnapshot {
                id: Some(s.id),
                format: Some(s.format),
                status: s.status(),
                progress: s.progress.get(),
                output_path: Some(s.path.clone()),
            },
            None => ExportSnapshot::idle(),
        }
    }

    /// Validate, claim the exporter and spawn the worker. On failure the
    /// completion is handed back so it is delivered after the lock is released.
    fn start<A>(
        &self,
        asset: A,
        format: ExportFormat,
        completion: Completion,
    ) -> std::result::Result<Arc<ExportShared>, (Error, Option<Completion>)>
    where
        A: AudioAsset + 'static,
    {
        if let Err(e) = format.ensure_supported() {
            return Err((e, Some(completion)));
        }

        let mut current = self.lock_current();
        if let Some(running) = current.as_ref() {
            if running.status() == ExportStatus::Exporting {
                warn!(id = %running.id, "Rejecting export: another export is running");
                return Err((Error::ExportInProgress, Some(completion)));
            }
        }

        let path = match self.resolve_output_location(format) {
            Ok(path) => path,
            Err(e) => return Err((e, Some(completion))),
        };
        let shared = Arc::new(ExportShared::new(format, path));

        let worker_shared = shared.clone();
        let config = self.config.clone();
        let builder = std::thread::Builder::new().name(format!("export-{}", shared.id.simple()));
        let spawned = worker::spawn(builder, completion, move |completion| {
            worker::run(asset, &worker_shared, &config, completion)
        });

        if let Err((e, completion)) = spawned {
            warn!("Could not start export worker: {}", e);
            return Err((
                Error::EncodeError(format!("cannot start export worker: {}", e)),
                Some(completion),
            ));
        }

        debug!(id = %shared.id, "Export worker spawned for {}", format);
        *current = Some(shared.clone());
        Ok(shared)
    }

    fn lock_current(&self) -> MutexGuard<'_, Option<Arc<ExportShared>>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}
