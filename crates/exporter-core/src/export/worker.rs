//! Background export worker: read -> convert -> encode -> write

use std::any::Any;
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Mutex};
use std::thread;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use super::progress::{CancelToken, ProgressCell};
use super::status::ExportStatus;
use crate::asset::AudioAsset;
use crate::config::ExporterConfig;
use crate::encoder::{create_encoder, AudioEncoder, Conversion};
use crate::error::{Error, Result};
use crate::format::ExportFormat;
use crate::output::remove_existing;

/// Progress never reaches 1.0 before the encoder is finalized
const MAX_IN_FLIGHT_PROGRESS: f32 = 0.99;

/// State of one export, shared by the exporter, its handle and the worker
pub struct ExportShared {
    pub id: Uuid,
    pub format: ExportFormat,
    pub path: PathBuf,
    pub progress: ProgressCell,
    pub cancel: CancelToken,
    status: Mutex<ExportStatus>,
}

impl ExportShared {
    pub fn new(format: ExportFormat, path: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            format,
            path,
            progress: ProgressCell::new(),
            cancel: CancelToken::new(),
            status: Mutex::new(ExportStatus::Exporting),
        }
    }

    pub fn status(&self) -> ExportStatus {
        *self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_status(&self, status: ExportStatus) {
        *self.status.lock().unwrap_or_else(|e| e.into_inner()) = status;
    }
}

type CompletionFn = Box<dyn FnOnce(Result<PathBuf>) + Send + 'static>;

/// Delivers the outcome exactly once. Dropping it undelivered reports a
/// failure, so a worker that never ran still resolves its caller.
pub struct Completion(Option<CompletionFn>);

impl Completion {
    pub fn new(f: impl FnOnce(Result<PathBuf>) + Send + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    pub fn deliver(mut self, outcome: Result<PathBuf>) {
        if let Some(f) = self.0.take() {
            f(outcome);
        }
    }

    /// Drop without delivering, for callers that report the error themselves
    pub fn discard(mut self) {
        self.0.take();
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(f) = self.0.take() {
            f(Err(Error::EncodeError(
                "export worker stopped without an outcome".to_string(),
            )));
        }
    }
}

/// Start `job` on the thread `builder` describes and hand it `completion`
/// once the thread exists. When the thread cannot be created the completion
/// comes back untouched, so the caller decides where it is delivered.
pub fn spawn<F>(
    builder: thread::Builder,
    completion: Completion,
    job: F,
) -> std::result::Result<(), (io::Error, Completion)>
where
    F: FnOnce(Completion) + Send + 'static,
{
    let (handoff, pending) = mpsc::sync_channel::<Completion>(1);
    let spawned = builder.spawn(move || {
        if let Ok(completion) = pending.recv() {
            job(completion);
        }
    });

    match spawned {
        Ok(_) => handoff
            .send(completion)
            .map_err(|mpsc::SendError(completion)| {
                let err = io::Error::new(io::ErrorKind::Other, "export worker exited early");
                (err, completion)
            }),
        Err(e) => Err((e, completion)),
    }
}

/// Worker entry point. Runs the pipeline, settles the status, cleans up
/// partial output, then delivers the outcome.
pub fn run<A: AudioAsset>(
    mut asset: A,
    shared: &ExportShared,
    config: &ExporterConfig,
    completion: Completion,
) {
    let span = info_span!("export", id = %shared.id, format = %shared.format);
    let _enter = span.enter();
    info!("Export started -> {:?}", shared.path);

    let result = catch_unwind(AssertUnwindSafe(|| pipeline(&mut asset, shared, config)))
        .unwrap_or_else(|panic| Err(Error::EncodeError(panic_message(panic))));

    let outcome = match result {
        Ok(()) => {
            shared.progress.complete();
            shared.set_status(ExportStatus::Succeeded);
            info!("Export finished: {:?}", shared.path);
            Ok(shared.path.clone())
        }
        Err(e) => {
            discard_partial(&shared.path);
            if e.is_cancelled() {
                shared.set_status(ExportStatus::Cancelled);
                info!("Export cancelled");
            } else {
                shared.set_status(ExportStatus::Failed);
                error!("Export failed: {}", e);
            }
            Err(e)
        }
    };

    completion.deliver(outcome);
}

fn pipeline<A: AudioAsset>(
    asset: &mut A,
    shared: &ExportShared,
    config: &ExporterConfig,
) -> Result<()> {
    let check_cancelled = || {
        if shared.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    };

    check_cancelled()?;

    let source = asset.spec();
    let total_frames = asset.total_frames().filter(|&n| n > 0);
    let mut conversion = Conversion::plan(shared.format, source)?;
    if !conversion.is_passthrough() {
        let out = conversion.output_spec();
        debug!(
            "Converting {} Hz/{} ch -> {} Hz/{} ch",
            source.sample_rate, source.channels, out.sample_rate, out.channels
        );
    }

    let mut encoder = create_encoder(
        shared.format,
        conversion.output_spec(),
        config,
        &shared.path,
    )?;

    let channels = source.channels as usize;
    let mut frames_read: u64 = 0;

    loop {
        check_cancelled()?;
        let chunk = match asset.read_chunk(config.chunk_frames)? {
            Some(chunk) => chunk,
            None => break,
        };
        if chunk.len() % channels != 0 {
            return Err(Error::ReadError(format!(
                "chunk of {} samples is not a whole number of {}-channel frames",
                chunk.len(),
                channels
            )));
        }
        frames_read += (chunk.len() / channels) as u64;

        check_cancelled()?;
        let converted = conversion.apply(chunk)?;
        encoder.write(&converted)?;

        if let Some(total) = total_frames {
            let fraction = frames_read as f64 / total as f64;
            shared
                .progress
                .advance((fraction as f32).min(MAX_IN_FLIGHT_PROGRESS));
        }
    }

    check_cancelled()?;
    let tail = conversion.flush()?;
    if !tail.is_empty() {
        encoder.write(&tail)?;
    }
    encoder.finish()?;

    debug!("Encoded {} source frames", frames_read);
    Ok(())
}

fn discard_partial(path: &Path) {
    if let Err(e) = remove_existing(path) {
        warn!("Could not remove partial output {:?}: {}", path, e);
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("export worker panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("export worker panicked: {}", s)
    } else {
        "export worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{MemoryAsset, SourceSpec};
    use std::time::Duration;

    struct PanickingAsset;

    impl AudioAsset for PanickingAsset {
        fn spec(&self) -> SourceSpec {
            SourceSpec::new(8000, 1)
        }

        fn total_frames(&self) -> Option<u64> {
            None
        }

        fn read_chunk(&mut self, _max_frames: usize) -> Result<Option<Vec<f32>>> {
            panic!("decoder exploded")
        }
    }

    fn collect() -> (Completion, mpsc::Receiver<Result<PathBuf>>) {
        let (tx, rx) = mpsc::channel();
        let completion = Completion::new(move |r| {
            let _ = tx.send(r);
        });
        (completion, rx)
    }

    #[test]
    fn test_success_sets_progress_and_status() {
        let dir = tempfile::tempdir().unwrap();
        let shared = ExportShared::new(ExportFormat::LinearPcm, dir.path().join("a.wav"));
        let asset = MemoryAsset::silence(Duration::from_millis(500), 8000, 1).unwrap();
        let (completion, rx) = collect();

        run(asset, &shared, &ExporterConfig::default(), completion);

        let path = rx.try_recv().unwrap().unwrap();
        assert!(path.exists());
        assert_eq!(shared.progress.get(), 1.0);
        assert_eq!(shared.status(), ExportStatus::Succeeded);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_panic_becomes_failure_and_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let shared = ExportShared::new(ExportFormat::Caf, dir.path().join("a.caf"));
        let (completion, rx) = collect();

        run(PanickingAsset, &shared, &ExporterConfig::default(), completion);

        let err = rx.try_recv().unwrap().unwrap_err();
        assert!(err.to_string().contains("decoder exploded"));
        assert_eq!(shared.status(), ExportStatus::Failed);
        assert!(!shared.path.exists());
    }

    #[test]
    fn test_pre_cancelled_export_never_writes() {
        let dir = tempfile::tempdir().unwrap();
        let shared = ExportShared::new(ExportFormat::LinearPcm, dir.path().join("a.wav"));
        shared.cancel.cancel();
        let asset = MemoryAsset::silence(Duration::from_secs(1), 8000, 1).unwrap();
        let (completion, rx) = collect();

        run(asset, &shared, &ExporterConfig::default(), completion);

        assert!(rx.try_recv().unwrap().unwrap_err().is_cancelled());
        assert_eq!(shared.status(), ExportStatus::Cancelled);
        assert!(!shared.path.exists());
    }

    #[test]
    fn test_spawned_job_receives_completion() {
        let (completion, rx) = collect();
        let spawned = spawn(thread::Builder::new(), completion, |completion| {
            completion.deliver(Ok(PathBuf::from("done.wav")));
        });

        assert!(spawned.is_ok());
        let outcome = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(outcome.unwrap(), PathBuf::from("done.wav"));
    }

    #[cfg(all(target_os = "linux", target_pointer_width = "64"))]
    #[test]
    fn test_failed_spawn_returns_completion_undelivered() {
        let (completion, rx) = collect();
        // a stack this large cannot be mapped, so thread creation fails
        let builder = thread::Builder::new().stack_size(1 << 60);
        let (_, completion) = spawn(builder, completion, |completion| {
            completion.deliver(Ok(PathBuf::new()));
        })
        .unwrap_err();

        assert!(matches!(rx.try_recv(), Err(mpsc::TryRecvError::Empty)));
        completion.deliver(Err(Error::ExportInProgress));
        assert_eq!(rx.try_recv().unwrap().unwrap_err().kind(), crate::error::ErrorKind::Busy);
    }

    #[test]
    fn test_dropped_completion_reports_failure() {
        let (completion, rx) = collect();
        drop(completion);
        assert!(rx.try_recv().unwrap().is_err());
    }
}
