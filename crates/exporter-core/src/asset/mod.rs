//! Decodable audio sources

mod file;
mod memory;

pub use file::FileAsset;
pub use memory::MemoryAsset;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Sample rate and channel layout of a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub sample_rate: u32,
    pub channels: u16,
}

impl SourceSpec {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }
}

/// A source of decoded audio handed to the exporter.
///
/// Samples are interleaved `f32` in `[-1.0, 1.0]`.
pub trait AudioAsset: Send {
    fn spec(&self) -> SourceSpec;

    /// Length in frames, when the source knows it. Used for progress.
    fn total_frames(&self) -> Option<u64>;

    /// Next block of interleaved samples, `None` once the source is exhausted.
    fn read_chunk(&mut self, max_frames: usize) -> Result<Option<Vec<f32>>>;
}

impl<A: AudioAsset + ?Sized> AudioAsset for Box<A> {
    fn spec(&self) -> SourceSpec {
        (**self).spec()
    }

    fn total_frames(&self) -> Option<u64> {
        (**self).total_frames()
    }

    fn read_chunk(&mut self, max_frames: usize) -> Result<Option<Vec<f32>>> {
        (**self).read_chunk(max_frames)
    }
}
