//! In-memory sample source

use std::time::Duration;

use super::{AudioAsset, SourceSpec};
use crate::error::{Error, Result};

/// Interleaved samples held in memory
#[derive(Debug, Clone)]
pub struct MemoryAsset {
    spec: SourceSpec,
    samples: Vec<f32>,
    position: usize,
}

impl MemoryAsset {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self> {
        if sample_rate == 0 || channels == 0 {
            return Err(Error::ReadError(format!(
                "invalid layout: {} Hz, {} channels",
                sample_rate, channels
            )));
        }
        if samples.len() % channels as usize != 0 {
            return Err(Error::ReadError(format!(
                "{} samples do not divide into {} channels",
                samples.len(),
                channels
            )));
        }
        Ok(Self {
            spec: SourceSpec::new(sample_rate, channels),
            samples,
            position: 0,
        })
    }

    /// Digital silence of the given length
    pub fn silence(duration: Duration, sample_rate: u32, channels: u16) -> Result<Self> {
        let frames = (duration.as_secs_f64() * sample_rate as f64).round() as usize;
        Self::new(vec![0.0; frames * channels as usize], sample_rate, channels)
    }

    /// A sine tone, same level on every channel
    pub fn tone(
        frequency: f32,
        duration: Duration,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Self> {
        let frames = (duration.as_secs_f64() * sample_rate as f64).round() as usize;
        let mut samples = Vec::with_capacity(frames * channels as usize);
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let s = (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.5;
            samples.extend(std::iter::repeat(s).take(channels as usize));
        }
        Self::new(samples, sample_rate, channels)
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.spec.channels as usize
    }
}

impl AudioAsset for MemoryAsset {
    fn spec(&self) -> SourceSpec {
        self.spec
    }

    fn total_frames(&self) -> Option<u64> {
        Some(self.frames() as u64)
    }

    fn read_chunk(&mut self, max_frames: usize) -> Result<Option<Vec<f32>>> {
        if self.position >= self.samples.len() {
            return Ok(None);
        }
        let len = (max_frames.max(1) * self.spec.channels as usize)
            .min(self.samples.len() - self.position);
        let chunk = self.samples[self.position..self.position + len].to_vec();
        self.position += len;
        Ok(Some(chunk))
    }
}
