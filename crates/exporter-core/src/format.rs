//! Export target formats and build-time capabilities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Target audio encoding and container of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// MPEG-4 AAC-LC in an `.m4a` container
    Aac,
    /// Uncompressed PCM in a RIFF WAVE container
    LinearPcm,
    /// 16-bit linear PCM in a Core Audio Format container
    Caf,
    /// MPEG-1 Layer III, available with the `lame` feature
    Mp3,
}

/// Whether the MP3 encoder library was compiled in
pub const MP3_AVAILABLE: bool = cfg!(feature = "lame");

impl ExportFormat {
    pub fn all() -> &'static [ExportFormat] {
        &[Self::Aac, Self::LinearPcm, Self::Caf, Self::Mp3]
    }

    /// Formats this build can produce
    pub fn supported() -> Vec<ExportFormat> {
        Self::all()
            .iter()
            .copied()
            .filter(|f| f.is_supported())
            .collect()
    }

    pub fn is_supported(&self) -> bool {
        match self {
            Self::Mp3 => MP3_AVAILABLE,
            _ => true,
        }
    }

    /// Fail with [`Error::UnsupportedFormat`] unless this build can produce the format
    pub fn ensure_supported(&self) -> Result<()> {
        if self.is_supported() {
            Ok(())
        } else {
            Err(Error::UnsupportedFormat(format!(
                "{} export is not available in this build",
                self
            )))
        }
    }

    /// File extension of the output container
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Aac => "m4a",
            Self::LinearPcm => "wav",
            Self::Caf => "caf",
            Self::Mp3 => "mp3",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Aac => "audio/mp4",
            Self::LinearPcm => "audio/wav",
            Self::Caf => "audio/x-caf",
            Self::Mp3 => "audio/mpeg",
        }
    }

    /// Core Audio four-character format id
    pub fn format_id(&self) -> u32 {
        let code: &[u8; 4] = match self {
            Self::Aac => b"aac ",
            Self::LinearPcm => b"lpcm",
            Self::Caf => b"caff",
            Self::Mp3 => b".mp3",
        };
        u32::from_be_bytes(*code)
    }

    /// Map a Core Audio four-character format id to an export format
    pub fn from_format_id(id: u32) -> Result<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|f| f.format_id() == id)
            .ok_or_else(|| {
                let bytes = id.to_be_bytes();
                let code = if bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
                    String::from_utf8_lossy(&bytes).into_owned()
                } else {
                    format!("{:#010x}", id)
                };
                Error::UnsupportedFormat(format!("unknown format id '{}'", code))
            })
    }

    /// Encoders that only accept standard MPEG sample rates
    pub(crate) fn accepts_sample_rate(&self, rate: u32) -> bool {
        match self {
            Self::Aac => matches!(
                rate,
                8000 | 11025 | 12000 | 16000 | 22050 | 24000 | 32000 | 44100 | 48000 | 64000
                    | 88200 | 96000
            ),
            Self::Mp3 => matches!(
                rate,
                8000 | 11025 | 12000 | 16000 | 22050 | 24000 | 32000 | 44100 | 48000
            ),
            Self::LinearPcm | Self::Caf => rate > 0,
        }
    }

    /// Largest channel count the encoder takes before folding to stereo
    pub(crate) fn max_channels(&self) -> u16 {
        match self {
            Self::Aac | Self::Mp3 => 2,
            Self::LinearPcm | Self::Caf => u16::MAX,
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Aac => "aac",
            Self::LinearPcm => "linear-pcm",
            Self::Caf => "caf",
            Self::Mp3 => "mp3",
        };
        f.write_str(name)
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aac" | "m4a" => Ok(Self::Aac),
            "pcm" | "lpcm" | "linear-pcm" | "linear_pcm" | "wav" | "wave" => Ok(Self::LinearPcm),
            "caf" | "caff" => Ok(Self::Caf),
            "mp3" => Ok(Self::Mp3),
            other => Err(Error::UnsupportedFormat(format!("unknown format '{}'", other))),
        }
    }
}
