//! Progress and cancellation primitives shared with the export worker

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Monotonic progress in `[0.0, 1.0]`.
///
/// Stored as the bit pattern of an `f32`; for non-negative floats the bit
/// order matches the numeric order, so `fetch_max` keeps it monotonic.
pub struct ProgressCell {
    bits: AtomicU32,
    tx: watch::Sender<f32>,
}

impl ProgressCell {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0.0);
        Self {
            bits: AtomicU32::new(0.0f32.to_bits()),
            tx,
        }
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Acquire))
    }

    /// Raise progress to `value`. Lower values are ignored.
    pub fn advance(&self, value: f32) {
        // NaN and -0.0 become +0.0; the sign bit would win `fetch_max`
        let value = if value > 0.0 { value.min(1.0) } else { 0.0 };
        let bits = value.to_bits();
        let prev = self.bits.fetch_max(bits, Ordering::AcqRel);
        if bits > prev {
            self.tx.send_replace(value);
        }
    }

    pub fn complete(&self) {
        self.advance(1.0);
    }

    pub fn subscribe(&self) -> watch::Receiver<f32> {
        self.tx.subscribe()
    }
}

impl Default for ProgressCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Cooperative cancellation flag checked by the worker between steps
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
