//! Configuration types for the audio exporter

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable prefix used by [`ExporterConfig::load`]
pub const ENV_PREFIX: &str = "AUDIO_EXPORT";

/// Main exporter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Directory the exported files are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// File name (without extension) of every exported file
    #[serde(default = "default_file_stem")]
    pub file_stem: String,

    /// Number of frames pulled from the asset per pipeline step
    #[serde(default = "default_chunk_frames")]
    pub chunk_frames: usize,

    /// Bit depth of linear PCM exports (16, 24 or 32 for float)
    #[serde(default = "default_pcm_bit_depth")]
    pub pcm_bit_depth: u16,

    /// AAC bitrate in bits per second
    #[serde(default = "default_aac_bitrate")]
    pub aac_bitrate: u32,

    /// MP3 bitrate in kbps
    #[serde(default = "default_mp3_bitrate")]
    pub mp3_bitrate: u32,

    /// LAME quality, 0 (best) to 9 (fastest)
    #[serde(default = "default_mp3_quality")]
    pub mp3_quality: u8,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            file_stem: default_file_stem(),
            chunk_frames: default_chunk_frames(),
            pcm_bit_depth: default_pcm_bit_depth(),
            aac_bitrate: default_aac_bitrate(),
            mp3_bitrate: default_mp3_bitrate(),
            mp3_quality: default_mp3_quality(),
        }
    }
}

impl ExporterConfig {
    /// Default configuration writing into `dir`
    pub fn with_output_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: dir.into(),
            ..Self::default()
        }
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an optional file, overridden by
    /// `AUDIO_EXPORT__*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let config: Self = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no encoder can work with
    pub fn validate(&self) -> Result<()> {
        if self.file_stem.is_empty()
            || self.file_stem.contains(std::path::MAIN_SEPARATOR)
            || self.file_stem.contains('/')
        {
            return Err(Error::ConfigError(format!(
                "invalid file stem {:?}",
                self.file_stem
            )));
        }
        if self.chunk_frames == 0 {
            return Err(Error::ConfigError("chunk_frames must be positive".into()));
        }
        if !matches!(self.pcm_bit_depth, 16 | 24 | 32) {
            return Err(Error::ConfigError(format!(
                "unsupported PCM bit depth {}",
                self.pcm_bit_depth
            )));
        }
        if !(8_000..=320_000).contains(&self.aac_bitrate) {
            return Err(Error::ConfigError(format!(
                "AAC bitrate {} out of range",
                self.aac_bitrate
            )));
        }
        if !matches!(
            self.mp3_bitrate,
            8 | 16 | 24 | 32 | 40 | 48 | 64 | 80 | 96 | 112 | 128 | 160 | 192 | 224 | 256 | 320
        ) {
            return Err(Error::ConfigError(format!(
                "unsupported MP3 bitrate {}",
                self.mp3_bitrate
            )));
        }
        if self.mp3_quality > 9 {
            return Err(Error::ConfigError(format!(
                "MP3 quality {} out of range",
                self.mp3_quality
            )));
        }
        Ok(())
    }
}

fn default_output_dir() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("exports")
}

fn default_file_stem() -> String {
    "exported".to_string()
}

fn default_chunk_frames() -> usize {
    4096
}

fn default_pcm_bit_depth() -> u16 {
    16
}

fn default_aac_bitrate() -> u32 {
    128_000
}

fn default_mp3_bitrate() -> u32 {
    192
}

fn default_mp3_quality() -> u8 {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ExporterConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.output_dir.ends_with("exports"));
    }

    #[test]
    fn test_from_toml_fills_defaults() {
        let config = ExporterConfig::from_toml_str(
            r#"
            output_dir = "/tmp/out"
            pcm_bit_depth = 24
            "#,
        )
        .unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.pcm_bit_depth, 24);
        assert_eq!(config.file_stem, "exported");
        assert_eq!(config.chunk_frames, 4096);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(ExporterConfig::from_toml_str("pcm_bit_depth = 12").is_err());
        assert!(ExporterConfig::from_toml_str("mp3_bitrate = 100").is_err());
        assert!(ExporterConfig::from_toml_str("chunk_frames = 0").is_err());
        assert!(ExporterConfig::from_toml_str("file_stem = \"a/b\"").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exporter.toml");
        std::fs::write(&path, "file_stem = \"take\"\nmp3_bitrate = 128\n").unwrap();

        let config = ExporterConfig::load(Some(&path)).unwrap();
        assert_eq!(config.file_stem, "take");
        assert_eq!(config.mp3_bitrate, 128);
    }
}
