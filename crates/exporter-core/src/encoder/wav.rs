//! Linear PCM export into a RIFF WAVE container

use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::debug;

use super::AudioEncoder;
use crate::asset::SourceSpec;
use crate::audio::convert::{f32_to_i16, f32_to_i24};
use crate::error::{Error, Result};

pub struct WavEncoder {
    writer: WavWriter<BufWriter<File>>,
    bit_depth: u16,
    samples_written: u64,
}

impl WavEncoder {
    pub fn create(path: &Path, spec: SourceSpec, bit_depth: u16) -> Result<Self> {
        let sample_format = match bit_depth {
            16 | 24 => SampleFormat::Int,
            32 => SampleFormat::Float,
            other => {
                return Err(Error::EncodeError(format!(
                    "unsupported PCM bit depth {}",
                    other
                )))
            }
        };
        let wav_spec = WavSpec {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: bit_depth,
            sample_format,
        };

        let writer = WavWriter::create(path, wav_spec).map_err(|e| match e {
            hound::Error::IoError(io) => {
                Error::WriteError(format!("cannot create {}: {}", path.display(), io))
            }
            other => Error::EncodeError(other.to_string()),
        })?;

        Ok(Self {
            writer,
            bit_depth,
            samples_written: 0,
        })
    }
}

impl AudioEncoder for WavEncoder {
    fn write(&mut self, samples: &[f32]) -> Result<()> {
        match self.bit_depth {
            16 => {
                for &s in samples {
                    self.writer.write_sample(f32_to_i16(s))?;
                }
            }
            24 => {
                for &s in samples {
                    self.writer.write_sample(f32_to_i24(s))?;
                }
            }
            _ => {
                for &s in samples {
                    self.writer.write_sample(s.clamp(-1.0, 1.0))?;
                }
            }
        }
        self.samples_written += samples.len() as u64;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<()> {
        let samples = self.samples_written;
        self.writer.finalize()?;
        debug!("Finalized WAV with {} samples", samples);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::WavReader;

    #[test]
    fn test_writes_readable_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");

        let mut encoder =
            Box::new(WavEncoder::create(&path, SourceSpec::new(8000, 2), 16).unwrap());
        encoder.write(&[0.5, -0.5, 0.0, 1.0]).unwrap();
        encoder.finish().unwrap();

        let mut reader = WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 8000);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![16383, -16383, 0, 32767]);
    }

    #[test]
    fn test_float_depth() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");

        let mut encoder =
            Box::new(WavEncoder::create(&path, SourceSpec::new(48000, 1), 32).unwrap());
        encoder.write(&[0.25, -0.75]).unwrap();
        encoder.finish().unwrap();

        let mut reader = WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_format, SampleFormat::Float);
        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0.25, -0.75]);
    }

    #[test]
    fn test_rejects_odd_bit_depth() {
        let dir = tempfile::tempdir().unwrap();
        let result = WavEncoder::create(&dir.path().join("x.wav"), SourceSpec::new(8000, 1), 12);
        assert!(result.is_err());
    }
}
