//! Per-format encoders and the conversion stage in front of them

mod aac;
mod caf;
#[cfg(feature = "lame")]
mod mp3;
mod wav;

pub use aac::{AacEncoder, AAC_FRAME_LEN};
pub use caf::CafEncoder;
#[cfg(feature = "lame")]
pub use mp3::Mp3Encoder;
pub use wav::WavEncoder;

use std::path::Path;
use tracing::debug;

use crate::asset::SourceSpec;
use crate::audio::convert::fold_to_stereo;
use crate::audio::StreamResampler;
use crate::config::ExporterConfig;
use crate::error::{Error, Result};
use crate::format::ExportFormat;

/// Rate used when an encoder cannot take the source rate
pub const FALLBACK_SAMPLE_RATE: u32 = 44100;

/// Sink turning interleaved f32 samples into a finished output file
pub trait AudioEncoder {
    /// Encode interleaved samples in the layout the encoder was created with
    fn write(&mut self, samples: &[f32]) -> Result<()>;

    /// Flush codec state and finalize the container
    fn finish(self: Box<Self>) -> Result<()>;
}

/// Create the encoder for `format` writing to `path`
pub fn create_encoder(
    format: ExportFormat,
    spec: SourceSpec,
    config: &ExporterConfig,
    path: &Path,
) -> Result<Box<dyn AudioEncoder>> {
    format.ensure_supported()?;
    debug!(
        "Creating {} encoder: {} Hz, {} channels -> {:?}",
        format, spec.sample_rate, spec.channels, path
    );

    let encoder: Box<dyn AudioEncoder> = match format {
        ExportFormat::LinearPcm => Box::new(WavEncoder::create(path, spec, config.pcm_bit_depth)?),
        ExportFormat::Caf => Box::new(CafEncoder::create(path, spec)?),
        ExportFormat::Aac => Box::new(AacEncoder::create(path, spec, config.aac_bitrate)?),
        #[cfg(feature = "lame")]
        ExportFormat::Mp3 => Box::new(Mp3Encoder::create(
            path,
            spec,
            config.mp3_bitrate,
            config.mp3_quality,
        )?),
        #[cfg(not(feature = "lame"))]
        ExportFormat::Mp3 => {
            return Err(Error::UnsupportedFormat(
                "mp3 export is not available in this build".to_string(),
            ))
        }
    };
    Ok(encoder)
}

/// Channel folding and resampling between the asset and the encoder
pub struct Conversion {
    source_channels: u16,
    fold: bool,
    resampler: Option<StreamResampler>,
    output: SourceSpec,
}

impl Conversion {
    /// Plan the conversion `format` needs for a source laid out as `source`
    pub fn plan(format: ExportFormat, source: SourceSpec) -> Result<Self> {
        if source.channels == 0 || source.sample_rate == 0 {
            return Err(Error::ReadError(format!(
                "source reports {} Hz, {} channels",
                source.sample_rate, source.channels
            )));
        }

        let fold = source.channels > format.max_channels();
        let channels = if fold { 2 } else { source.channels };

        let resampler = if format.accepts_sample_rate(source.sample_rate) {
            None
        } else {
            Some(StreamResampler::new(
                source.sample_rate,
                FALLBACK_SAMPLE_RATE,
                channels,
            )?)
        };
        let sample_rate = resampler
            .as_ref()
            .map(|r| r.output_rate())
            .unwrap_or(source.sample_rate);

        Ok(Self {
            source_channels: source.channels,
            fold,
            resampler,
            output: SourceSpec::new(sample_rate, channels),
        })
    }

    /// Layout the encoder receives
    pub fn output_spec(&self) -> SourceSpec {
        self.output
    }

    pub fn is_passthrough(&self) -> bool {
        !self.fold && self.resampler.is_none()
    }

    pub fn apply(&mut self, samples: Vec<f32>) -> Result<Vec<f32>> {
        let samples = if self.fold {
            fold_to_stereo(&samples, self.source_channels)
        } else {
            samples
        };
        match self.resampler.as_mut() {
            Some(resampler) => resampler.process(&samples),
            None => Ok(samples),
        }
    }

    pub fn flush(&mut self) -> Result<Vec<f32>> {
        match self.resampler.as_mut() {
            Some(resampler) => resampler.flush(),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_is_passthrough() {
        let conversion = Conversion::plan(ExportFormat::LinearPcm, SourceSpec::new(7000, 6)).unwrap();
        assert!(conversion.is_passthrough());
        assert_eq!(conversion.output_spec(), SourceSpec::new(7000, 6));
    }

    #[test]
    fn test_aac_folds_and_resamples() {
        let mut conversion = Conversion::plan(ExportFormat::Aac, SourceSpec::new(44000, 4)).unwrap();
        assert_eq!(
            conversion.output_spec(),
            SourceSpec::new(FALLBACK_SAMPLE_RATE, 2)
        );

        let mut out = conversion.apply(vec![0.0; 44000 * 4]).unwrap();
        out.extend(conversion.flush().unwrap());
        assert_eq!(out.len() % 2, 0);
        assert!(out.len() / 2 <= 44100);
    }

    #[test]
    fn test_mp3_encoder_gated_by_feature() {
        let dir = tempfile::tempdir().unwrap();
        let result = create_encoder(
            ExportFormat::Mp3,
            SourceSpec::new(44100, 2),
            &ExporterConfig::default(),
            &dir.path().join("x.mp3"),
        );
        assert_eq!(result.is_ok(), cfg!(feature = "lame"));
    }
}
