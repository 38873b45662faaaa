//! MP3 export through LAME

use mp3lame_encoder::{Bitrate, Builder, Encoder, FlushNoGap, InterleavedPcm, Quality};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

use super::AudioEncoder;
use crate::asset::SourceSpec;
use crate::audio::convert::{mono_to_stereo, to_i16};
use crate::error::{Error, Result};

/// Bytes LAME may hold back on flush
const FLUSH_RESERVE: usize = 7200;

pub struct Mp3Encoder {
    encoder: Encoder,
    writer: BufWriter<File>,
    source_channels: u16,
    out_buf: Vec<u8>,
    bytes_written: u64,
}

impl Mp3Encoder {
    pub fn create(path: &Path, spec: SourceSpec, bitrate_kbps: u32, quality: u8) -> Result<Self> {
        if spec.channels == 0 || spec.channels > 2 {
            return Err(Error::EncodeError(format!(
                "MP3 export takes mono or stereo input, got {} channels",
                spec.channels
            )));
        }

        let mut builder = Builder::new()
            .ok_or_else(|| Error::EncodeError("cannot allocate LAME encoder".to_string()))?;
        // input is always fed as interleaved stereo
        builder
            .set_num_channels(2)
            .map_err(|e| lame_error("channels", e))?;
        builder
            .set_sample_rate(spec.sample_rate)
            .map_err(|e| lame_error("sample rate", e))?;
        builder
            .set_brate(bitrate(bitrate_kbps)?)
            .map_err(|e| lame_error("bitrate", e))?;
        builder
            .set_quality(quality_level(quality))
            .map_err(|e| lame_error("quality", e))?;
        let encoder = builder.build().map_err(|e| lame_error("init", e))?;

        let file = File::create(path)
            .map_err(|e| Error::WriteError(format!("cannot create {}: {}", path.display(), e)))?;

        Ok(Self {
            encoder,
            writer: BufWriter::new(file),
            source_channels: spec.channels,
            out_buf: Vec::new(),
            bytes_written: 0,
        })
    }

    fn drain_out_buf(&mut self) -> Result<()> {
        self.writer
            .write_all(&self.out_buf)
            .map_err(|e| Error::WriteError(e.to_string()))?;
        self.bytes_written += self.out_buf.len() as u64;
        self.out_buf.clear();
        Ok(())
    }
}

impl AudioEncoder for Mp3Encoder {
    fn write(&mut self, samples: &[f32]) -> Result<()> {
        let pcm = if self.source_channels == 1 {
            to_i16(&mono_to_stereo(samples))
        } else {
            to_i16(samples)
        };
        let frames = pcm.len() / 2;

        self.out_buf.clear();
        self.out_buf
            .reserve(mp3lame_encoder::max_required_buffer_size(frames));
        self.encoder
            .encode_to_vec(InterleavedPcm(&pcm), &mut self.out_buf)
            .map_err(|e| Error::EncodeError(format!("LAME encode failed: {:?}", e)))?;
        self.drain_out_buf()
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        self.out_buf.clear();
        self.out_buf.reserve(FLUSH_RESERVE);
        self.encoder
            .flush_to_vec::<FlushNoGap>(&mut self.out_buf)
            .map_err(|e| Error::EncodeError(format!("LAME flush failed: {:?}", e)))?;
        self.drain_out_buf()?;
        self.writer
            .flush()
            .map_err(|e| Error::WriteError(e.to_string()))?;

        debug!("Finalized MP3 with {} bytes", self.bytes_written);
        Ok(())
    }
}

fn lame_error(what: &str, e: impl std::fmt::Debug) -> Error {
    Error::EncodeError(format!("LAME {} setup failed: {:?}", what, e))
}

fn bitrate(kbps: u32) -> Result<Bitrate> {
    let rate = match kbps {
        8 => Bitrate::Kbps8,
        16 => Bitrate::Kbps16,
        24 => Bitrate::Kbps24,
        32 => Bitrate::Kbps32,
        40 => Bitrate::Kbps40,
        48 => Bitrate::Kbps48,
        64 => Bitrate::Kbps64,
        80 => Bitrate::Kbps80,
        96 => Bitrate::Kbps96,
        112 => Bitrate::Kbps112,
        128 => Bitrate::Kbps128,
        160 => Bitrate::Kbps160,
        192 => Bitrate::Kbps192,
        224 => Bitrate::Kbps224,
        256 => Bitrate::Kbps256,
        320 => Bitrate::Kbps320,
        other => {
            return Err(Error::EncodeError(format!(
                "unsupported MP3 bitrate {} kbps",
                other
            )))
        }
    };
    Ok(rate)
}

fn quality_level(level: u8) -> Quality {
    match level {
        0 => Quality::Best,
        1 => Quality::SecondBest,
        2 => Quality::NearBest,
        3 => Quality::VeryNice,
        4 => Quality::Nice,
        5 => Quality::Good,
        6 => Quality::Decent,
        7 => Quality::Ok,
        8 => Quality::SecondWorst,
        _ => Quality::Worst,
    }
}
