//! Error types for the audio exporter

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Output location error: {0}")]
    OutputLocation(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Read error: {0}")]
    ReadError(String),

    #[error("Encode error: {0}")]
    EncodeError(String),

    #[error("Write error: {0}")]
    WriteError(String),

    #[error("Export cancelled")]
    Cancelled,

    #[error("An export is already in progress")]
    ExportInProgress,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Coarse classification of an [`Error`], for callers that only care
/// about which stage of an export failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    OutputLocation,
    UnsupportedFormat,
    Read,
    Encode,
    Write,
    Cancelled,
    Busy,
    Config,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::OutputLocation(_) => ErrorKind::OutputLocation,
            Error::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Error::ReadError(_) => ErrorKind::Read,
            Error::EncodeError(_) => ErrorKind::Encode,
            Error::WriteError(_) | Error::IoError(_) => ErrorKind::Write,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::ExportInProgress => ErrorKind::Busy,
            Error::ConfigError(_) => ErrorKind::Config,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<hound::Error> for Error {
    fn from(e: hound::Error) -> Self {
        match e {
            hound::Error::IoError(io) => Error::WriteError(io.to_string()),
            other => Error::EncodeError(other.to_string()),
        }
    }
}

impl From<symphonia::core::errors::Error> for Error {
    fn from(e: symphonia::core::errors::Error) -> Self {
        use symphonia::core::errors::Error as SymphoniaError;
        match e {
            SymphoniaError::Unsupported(what) => {
                Error::ReadError(format!("unsupported source: {}", what))
            }
            other => Error::ReadError(other.to_string()),
        }
    }
}

impl From<mp4::Error> for Error {
    fn from(e: mp4::Error) -> Self {
        match e {
            mp4::Error::IoError(io) => Error::WriteError(io.to_string()),
            other => Error::EncodeError(other.to_string()),
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::ConfigError(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::ConfigError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hound_io_error_is_write_error() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err: Error = hound::Error::IoError(io).into();
        assert_eq!(err.kind(), ErrorKind::Write);
    }

    #[test]
    fn test_cancelled_kind() {
        assert!(Error::Cancelled.is_cancelled());
        assert_eq!(Error::Cancelled.kind(), ErrorKind::Cancelled);
        assert!(!Error::ExportInProgress.is_cancelled());
    }
}
