//! Streaming sample rate conversion

use rubato::{FftFixedIn, Resampler};
use tracing::debug;

use crate::error::{Error, Result};

/// Input block size handed to rubato per call
const CHUNK_FRAMES: usize = 1024;

/// Wraps a fixed-input rubato resampler so callers can push interleaved
/// blocks of any size.
pub struct StreamResampler {
    inner: FftFixedIn<f32>,
    channels: usize,
    from: u32,
    to: u32,
    input: Vec<Vec<f32>>,
    /// Leading output frames that are filter delay, not signal
    delay: usize,
    frames_in: u64,
    frames_out: u64,
}

impl StreamResampler {
    pub fn new(from: u32, to: u32, channels: u16) -> Result<Self> {
        let channels = channels as usize;
        if channels == 0 || from == 0 || to == 0 {
            return Err(Error::EncodeError(format!(
                "cannot resample {} Hz -> {} Hz with {} channels",
                from, to, channels
            )));
        }
        let inner = FftFixedIn::<f32>::new(from as usize, to as usize, CHUNK_FRAMES, 2, channels)
            .map_err(|e| Error::EncodeError(format!("resampler setup failed: {}", e)))?;

        let delay = inner.output_delay();
        debug!(
            "Resampling {} Hz -> {} Hz ({} channels, {} frames delay)",
            from, to, channels, delay
        );
        Ok(Self {
            inner,
            channels,
            from,
            to,
            input: vec![Vec::new(); channels],
            delay,
            frames_in: 0,
            frames_out: 0,
        })
    }

    pub fn output_rate(&self) -> u32 {
        self.to
    }

    /// Push interleaved input, returning whatever output is ready
    pub fn process(&mut self, interleaved: &[f32]) -> Result<Vec<f32>> {
        for frame in interleaved.chunks_exact(self.channels) {
            for (ch, &s) in frame.iter().enumerate() {
                self.input[ch].push(s);
            }
        }
        self.frames_in += (interleaved.len() / self.channels) as u64;

        let mut out = Vec::new();
        loop {
            let needed = self.inner.input_frames_next();
            if self.input[0].len() < needed {
                break;
            }
            let block: Vec<Vec<f32>> = self
                .input
                .iter_mut()
                .map(|ch| ch.drain(..needed).collect())
                .collect();
            let resampled = self
                .inner
                .process(&block, None)
                .map_err(|e| Error::EncodeError(format!("resampling failed: {}", e)))?;
            self.append_interleaved(&resampled, &mut out);
        }
        Ok(out)
    }

    /// Drain buffered input and the filter tail
    pub fn flush(&mut self) -> Result<Vec<f32>> {
        let mut out = Vec::new();

        if !self.input[0].is_empty() {
            let rest: Vec<Vec<f32>> = self.input.iter_mut().map(std::mem::take).collect();
            let resampled = self
                .inner
                .process_partial(Some(rest.as_slice()), None)
                .map_err(|e| Error::EncodeError(format!("resampling failed: {}", e)))?;
            self.append_interleaved(&resampled, &mut out);
        }

        // the last input frames are still inside the filter; push silence until they are out
        let max_rounds = self.inner.output_delay() / self.inner.output_frames_next().max(1) + 2;
        let mut rounds = 0;
        while self.frames_out < self.expected_frames() && rounds < max_rounds {
            let tail = self
                .inner
                .process_partial::<Vec<f32>>(None, None)
                .map_err(|e| Error::EncodeError(format!("resampling failed: {}", e)))?;
            self.append_interleaved(&tail, &mut out);
            rounds += 1;
        }

        Ok(out)
    }

    /// Output frames the input seen so far amounts to at the output rate
    fn expected_frames(&self) -> u64 {
        self.frames_in * self.to as u64 / self.from as u64
    }

    /// Interleave planar output after skipping the filter delay, never
    /// exceeding the frame count the input length implies.
    fn append_interleaved(&mut self, planar: &[Vec<f32>], out: &mut Vec<f32>) {
        let available = planar.first().map(|c| c.len()).unwrap_or(0);
        let skip = self.delay.min(available);
        self.delay -= skip;

        let remaining = self.expected_frames().saturating_sub(self.frames_out);
        let frames = ((available - skip) as u64).min(remaining) as usize;

        out.reserve(frames * self.channels);
        for i in skip..skip + frames {
            for ch in planar {
                out.push(ch[i]);
            }
        }
        self.frames_out += frames as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_length_tracks_ratio() {
        let mut resampler = StreamResampler::new(22050, 44100, 2).unwrap();
        let input = vec![0.25f32; 22050 * 2];

        let mut out = Vec::new();
        for block in input.chunks(3000 * 2) {
            out.extend(resampler.process(block).unwrap());
        }
        out.extend(resampler.flush().unwrap());

        assert_eq!(out.len() % 2, 0);
        assert!(out.len() / 2 <= 44100);
        assert!(out.len() / 2 > 40000);
    }

    #[test]
    fn test_end_of_input_survives_resampling() {
        let mut resampler = StreamResampler::new(22050, 44100, 1).unwrap();
        let mut input = vec![0.0f32; 22050];
        for s in input.iter_mut().skip(22050 - 200) {
            *s = 0.5;
        }

        let mut out = Vec::new();
        for block in input.chunks(4096) {
            out.extend(resampler.process(block).unwrap());
        }
        out.extend(resampler.flush().unwrap());

        assert_eq!(out.len(), 44100);
        // the 200-frame step lands in the last 400 output frames, in place
        let onset = out.iter().position(|s| s.abs() > 0.25).unwrap();
        assert!((44100 - 440..44100 - 360).contains(&onset), "onset at {}", onset);
        let body = &out[44100 - 300..44100 - 100];
        let mean = body.iter().sum::<f32>() / body.len() as f32;
        assert!((mean - 0.5).abs() < 0.05, "tail mean {}", mean);
    }

    #[test]
    fn test_rejects_zero_rate() {
        assert!(StreamResampler::new(0, 44100, 1).is_err());
        assert!(StreamResampler::new(44100, 48000, 0).is_err());
    }
}
