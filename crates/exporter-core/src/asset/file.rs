//! File-backed source decoded with Symphonia

use std::collections::VecDeque;
use std::fs::File;
use std::path::{Path, PathBuf};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info, warn};

use super::{AudioAsset, SourceSpec};
use crate::error::{Error, Result};

/// An audio file on disk (WAV, FLAC, MP3, AAC/M4A, ALAC, Ogg Vorbis)
pub struct FileAsset {
    path: PathBuf,
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    spec: SourceSpec,
    total_frames: Option<u64>,
    pending: VecDeque<f32>,
    finished: bool,
}

impl FileAsset {
    /// Open and probe a file. The first packet is decoded up front so the
    /// channel layout is known even for codecs that only report it on decode.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio asset {:?}", path);

        let file = File::open(path)
            .map_err(|e| Error::ReadError(format!("cannot open {}: {}", path.display(), e)))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe().format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::ReadError("no audio track found".to_string()))?;

        let track_id = track.id;
        let total_frames = track.codec_params.n_frames;
        let declared_rate = track.codec_params.sample_rate;
        let declared_channels = track.codec_params.channels.map(|c| c.count() as u16);

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())?;

        let mut asset = Self {
            path: path.to_path_buf(),
            format,
            decoder,
            track_id,
            spec: SourceSpec::new(declared_rate.unwrap_or(0), declared_channels.unwrap_or(0)),
            total_frames,
            pending: VecDeque::new(),
            finished: false,
        };

        asset.decode_next()?;
        if asset.spec.sample_rate == 0 || asset.spec.channels == 0 {
            return Err(Error::ReadError(format!(
                "{} contains no decodable audio",
                path.display()
            )));
        }

        debug!(
            "Asset {:?}: {} Hz, {} channels, {:?} frames",
            asset.path, asset.spec.sample_rate, asset.spec.channels, asset.total_frames
        );
        Ok(asset)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode one packet of the selected track into `pending`.
    /// Returns `false` at end of stream.
    fn decode_next(&mut self) -> Result<bool> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    self.finished = true;
                    return Ok(false);
                }
                Err(SymphoniaError::ResetRequired) => {
                    return Err(Error::ReadError(
                        "stream parameters changed mid-file".to_string(),
                    ));
                }
                Err(e) => return Err(e.into()),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(msg)) => {
                    warn!("Skipping corrupt packet in {:?}: {}", self.path, msg);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let signal = *decoded.spec();
            let channels = signal.channels.count() as u16;
            if self.spec.channels == 0 {
                self.spec = SourceSpec::new(signal.rate, channels);
            } else if channels != self.spec.channels || signal.rate != self.spec.sample_rate {
                return Err(Error::ReadError(format!(
                    "layout changed from {} Hz/{} ch to {} Hz/{} ch",
                    self.spec.sample_rate, self.spec.channels, signal.rate, channels
                )));
            }

            if decoded.frames() == 0 {
                continue;
            }

            let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, signal);
            buf.copy_interleaved_ref(decoded);
            self.pending.extend(buf.samples().iter().copied());
            return Ok(true);
        }
    }
}

impl AudioAsset for FileAsset {
    fn spec(&self) -> SourceSpec {
        self.spec
    }

    fn total_frames(&self) -> Option<u64> {
        self.total_frames
    }

    fn read_chunk(&mut self, max_frames: usize) -> Result<Option<Vec<f32>>> {
        let channels = self.spec.channels as usize;
        let wanted = max_frames.max(1) * channels;

        while self.pending.len() < wanted && !self.finished {
            if !self.decode_next()? {
                break;
            }
        }

        if self.pending.is_empty() {
            return Ok(None);
        }

        let len = wanted.min(self.pending.len());
        Ok(Some(self.pending.drain(..len).collect()))
    }
}
