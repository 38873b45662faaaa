//! AAC-LC export: fdk-aac access units muxed into an MP4 (`.m4a`) container
//!
//! The encoder's priming delay ([`AacEncoder::priming_frames`]) is not
//! signalled in the file: the mp4 writer emits no edit list, so players
//! start with that many frames of leading silence.

use bytes::Bytes;
use fdk_aac::enc::{BitRate, ChannelMode, Encoder, EncoderParams, Transport};
use mp4::{
    AacConfig, AudioObjectType, ChannelConfig, MediaConfig, Mp4Config, Mp4Sample, Mp4Writer,
    SampleFreqIndex, TrackConfig, TrackType,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

use super::AudioEncoder;
use crate::asset::SourceSpec;
use crate::audio::convert::to_i16;
use crate::error::{Error, Result};

/// Frames per AAC-LC access unit
pub const AAC_FRAME_LEN: usize = 1024;

/// Largest access unit fdk-aac emits per channel (6144 bits)
const MAX_AU_BYTES_PER_CHANNEL: usize = 768;

/// Priming assumed when the encoder cannot report its delay
const DEFAULT_PRIMING_FRAMES: u32 = 2048;

const TRACK_ID: u32 = 1;

pub struct AacEncoder {
    encoder: Encoder,
    muxer: Mp4Writer<BufWriter<File>>,
    channels: usize,
    pcm: Vec<i16>,
    out_buf: Vec<u8>,
    priming_frames: u32,
    /// Extra units written past the input length to cover the priming
    delay_units: u64,
    frames_in: u64,
    units_written: u64,
}

impl AacEncoder {
    pub fn create(path: &Path, spec: SourceSpec, bitrate: u32) -> Result<Self> {
        let freq_index = freq_index(spec.sample_rate)?;
        let (mode, chan_conf) = match spec.channels {
            1 => (ChannelMode::Mono, ChannelConfig::Mono),
            2 => (ChannelMode::Stereo, ChannelConfig::Stereo),
            n => {
                return Err(Error::EncodeError(format!(
                    "AAC export takes mono or stereo input, got {} channels",
                    n
                )))
            }
        };

        let encoder = Encoder::new(EncoderParams {
            bit_rate: BitRate::Cbr(bitrate),
            sample_rate: spec.sample_rate,
            transport: Transport::Raw,
            channels: mode,
        })
        .map_err(|e| Error::EncodeError(format!("fdk-aac setup failed: {:?}", e)))?;
        let priming_frames = match encoder.info() {
            Ok(info) => info.nDelay as u32,
            Err(e) => {
                debug!("fdk-aac info unavailable ({:?}), assuming default delay", e);
                DEFAULT_PRIMING_FRAMES
            }
        };
        let delay_units = (priming_frames as u64).div_ceil(AAC_FRAME_LEN as u64);

        let file = File::create(path)
            .map_err(|e| Error::WriteError(format!("cannot create {}: {}", path.display(), e)))?;

        let config = Mp4Config {
            major_brand: str::parse("M4A ").unwrap_or_default(),
            minor_version: 512,
            compatible_brands: vec![
                str::parse("M4A ").unwrap_or_default(),
                str::parse("mp42").unwrap_or_default(),
                str::parse("isom").unwrap_or_default(),
            ],
            timescale: spec.sample_rate,
        };
        let mut muxer = Mp4Writer::write_start(BufWriter::new(file), &config)?;

        muxer.add_track(&TrackConfig {
            track_type: TrackType::Audio,
            timescale: spec.sample_rate,
            language: "und".to_string(),
            media_conf: MediaConfig::AacConfig(AacConfig {
                bitrate,
                profile: AudioObjectType::AacLowComplexity,
                freq_index,
                chan_conf,
            }),
        })?;

        let channels = spec.channels as usize;
        Ok(Self {
            encoder,
            muxer,
            channels,
            pcm: Vec::with_capacity(AAC_FRAME_LEN * channels),
            out_buf: vec![0u8; MAX_AU_BYTES_PER_CHANNEL * channels],
            priming_frames,
            delay_units,
            frames_in: 0,
            units_written: 0,
        })
    }

    /// Leading frames of encoder delay at the start of the decoded output
    pub fn priming_frames(&self) -> u32 {
        self.priming_frames
    }

    /// Encode one full frame from `pcm` and mux the resulting unit, if any
    fn encode_frame(&mut self, frame: &[i16]) -> Result<()> {
        let info = self
            .encoder
            .encode(frame, &mut self.out_buf)
            .map_err(|e| Error::EncodeError(format!("fdk-aac encode failed: {:?}", e)))?;

        if info.input_consumed == 0 && !frame.is_empty() {
            return Err(Error::EncodeError("fdk-aac consumed no input".to_string()));
        }
        if info.output_size > 0 {
            self.write_unit(info.output_size)?;
        }
        Ok(())
    }

    fn write_unit(&mut self, len: usize) -> Result<()> {
        let limit = self.frames_in.div_ceil(AAC_FRAME_LEN as u64) + self.delay_units;
        if self.units_written >= limit {
            return Ok(());
        }
        let sample = Mp4Sample {
            start_time: self.units_written * AAC_FRAME_LEN as u64,
            duration: AAC_FRAME_LEN as u32,
            rendering_offset: 0,
            is_sync: true,
            bytes: Bytes::copy_from_slice(&self.out_buf[..len]),
        };
        self.muxer.write_sample(TRACK_ID, &sample)?;
        self.units_written += 1;
        Ok(())
    }
}

impl AudioEncoder for AacEncoder {
    fn write(&mut self, samples: &[f32]) -> Result<()> {
        self.frames_in += (samples.len() / self.channels) as u64;
        self.pcm.extend(to_i16(samples));

        let frame_samples = AAC_FRAME_LEN * self.channels;
        while self.pcm.len() >= frame_samples {
            let frame: Vec<i16> = self.pcm.drain(..frame_samples).collect();
            self.encode_frame(&frame)?;
        }
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        let frame_samples = AAC_FRAME_LEN * self.channels;

        // pad the last partial frame, then push silence through the encoder delay
        if !self.pcm.is_empty() {
            let mut frame = std::mem::take(&mut self.pcm);
            frame.resize(frame_samples, 0);
            self.encode_frame(&frame)?;
        }
        let silence = vec![0i16; frame_samples];
        for _ in 0..self.delay_units + 2 {
            self.encode_frame(&silence)?;
        }

        self.muxer.write_end()?;
        let units = self.units_written;
        self.muxer
            .into_writer()
            .flush()
            .map_err(|e| Error::WriteError(e.to_string()))?;

        debug!(
            "Finalized M4A with {} AAC units ({} priming frames)",
            units, self.priming_frames
        );
        Ok(())
    }
}

fn freq_index(sample_rate: u32) -> Result<SampleFreqIndex> {
    let index = match sample_rate {
        96000 => SampleFreqIndex::Freq96000,
        88200 => SampleFreqIndex::Freq88200,
        64000 => SampleFreqIndex::Freq64000,
        48000 => SampleFreqIndex::Freq48000,
        44100 => SampleFreqIndex::Freq44100,
        32000 => SampleFreqIndex::Freq32000,
        24000 => SampleFreqIndex::Freq24000,
        22050 => SampleFreqIndex::Freq22050,
        16000 => SampleFreqIndex::Freq16000,
        12000 => SampleFreqIndex::Freq12000,
        11025 => SampleFreqIndex::Freq11025,
        8000 => SampleFreqIndex::Freq8000,
        other => {
            return Err(Error::EncodeError(format!(
                "AAC does not support {} Hz",
                other
            )))
        }
    };
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freq_index() {
        assert!(matches!(
            freq_index(44100).unwrap(),
            SampleFreqIndex::Freq44100
        ));
        assert!(freq_index(44000).is_err());
    }

    #[test]
    fn test_encodes_playable_m4a() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.m4a");

        let mut encoder =
            Box::new(AacEncoder::create(&path, SourceSpec::new(44100, 2), 128_000).unwrap());
        let tone: Vec<f32> = (0..44100 * 2)
            .map(|i| ((i / 2) as f32 * 0.05).sin() * 0.3)
            .collect();
        for block in tone.chunks(4096) {
            encoder.write(block).unwrap();
        }
        let priming = encoder.priming_frames();
        let delay_units = encoder.delay_units as u32;
        encoder.finish().unwrap();

        let file = File::open(&path).unwrap();
        let size = file.metadata().unwrap().len();
        let reader = mp4::Mp4Reader::read_header(std::io::BufReader::new(file), size).unwrap();
        let count = reader.sample_count(TRACK_ID).unwrap();
        // one second at 44.1 kHz is 44 units, plus the priming allowance
        assert!(priming > 0 && priming < 4 * AAC_FRAME_LEN as u32, "{} priming", priming);
        assert!(count <= 44 + 1 + delay_units, "{} units", count);
        // the decoded stream must still hold the whole input after the priming
        assert!(
            count as u64 * AAC_FRAME_LEN as u64 >= 44100 + priming as u64,
            "{} units for {} priming frames",
            count,
            priming
        );
    }

    #[test]
    fn test_rejects_surround_input() {
        let dir = tempfile::tempdir().unwrap();
        let result = AacEncoder::create(&dir.path().join("x.m4a"), SourceSpec::new(48000, 6), 128_000);
        assert!(result.is_err());
    }
}
