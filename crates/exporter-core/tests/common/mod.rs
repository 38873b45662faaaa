//! Shared helpers for the integration tests.

#![allow(dead_code)]

use exporter_core::{AudioAsset, Error, Result, SourceSpec};
use std::sync::mpsc;
use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Route `tracing` output through the test harness. Set `RUST_LOG` to see it.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| "exporter_core=warn".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Control side of a [`GatedAsset`].
pub struct Gate {
    reached: mpsc::Receiver<()>,
    release: mpsc::Sender<()>,
}

impl Gate {
    /// Block until the asset is parked at its gate.
    pub fn wait_reached(&self) {
        self.reached
            .recv_timeout(std::time::Duration::from_secs(10))
            .expect("asset never reached its gate");
    }

    pub fn release(&self) {
        let _ = self.release.send(());
    }
}

/// Wraps an asset and parks the export worker inside `read_chunk` once
/// `gate_at` chunks have been handed out, until the test releases it.
pub struct GatedAsset<A> {
    inner: A,
    gate_at: usize,
    reads: usize,
    reached: mpsc::Sender<()>,
    release: mpsc::Receiver<()>,
}

impl<A: AudioAsset> GatedAsset<A> {
    pub fn new(inner: A, gate_at: usize) -> (Self, Gate) {
        let (reached_tx, reached_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let asset = Self {
            inner,
            gate_at,
            reads: 0,
            reached: reached_tx,
            release: release_rx,
        };
        let gate = Gate {
            reached: reached_rx,
            release: release_tx,
        };
        (asset, gate)
    }
}

impl<A: AudioAsset> AudioAsset for GatedAsset<A> {
    fn spec(&self) -> SourceSpec {
        self.inner.spec()
    }

    fn total_frames(&self) -> Option<u64> {
        self.inner.total_frames()
    }

    fn read_chunk(&mut self, max_frames: usize) -> Result<Option<Vec<f32>>> {
        if self.reads == self.gate_at {
            let _ = self.reached.send(());
            let _ = self.release.recv();
        }
        self.reads += 1;
        self.inner.read_chunk(max_frames)
    }
}

/// Yields `good_chunks` chunks of silence, then a read error.
pub struct FailingAsset {
    pub good_chunks: usize,
}

impl AudioAsset for FailingAsset {
    fn spec(&self) -> SourceSpec {
        SourceSpec::new(44100, 2)
    }

    fn total_frames(&self) -> Option<u64> {
        Some(44100)
    }

    fn read_chunk(&mut self, max_frames: usize) -> Result<Option<Vec<f32>>> {
        if self.good_chunks == 0 {
            return Err(Error::ReadError("sector not readable".to_string()));
        }
        self.good_chunks -= 1;
        Ok(Some(vec![0.0; max_frames * 2]))
    }
}
