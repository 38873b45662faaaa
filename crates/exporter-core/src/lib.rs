//! Exporter Core - Asynchronous Audio Export
//!
//! This crate converts decodable audio assets into files of a chosen
//! format on a background thread, with progress reporting and cooperative
//! cancellation.
//!
//! # Formats
//!
//! - AAC-LC in `.m4a` (fdk-aac + mp4)
//! - Linear PCM in `.wav` (hound)
//! - 16-bit linear PCM in `.caf`
//! - MP3 (LAME), behind the `lame` feature
//!
//! # Example
//!
//! ```no_run
//! use exporter_core::{ExportFormat, Exporter, ExporterConfig, FileAsset};
//!
//! # async fn run() -> exporter_core::Result<()> {
//! let exporter = Exporter::new(ExporterConfig::with_output_dir("/tmp/exports"))?;
//! let asset = FileAsset::open("input.flac")?;
//!
//! let handle = exporter.export(asset, ExportFormat::Aac)?;
//! let path = handle.wait().await?;
//! println!("wrote {}", path.display());
//! # Ok(())
//! # }
//! ```

pub mod asset;
pub mod audio;
pub mod config;
pub mod encoder;
pub mod error;
pub mod export;
pub mod format;
pub mod output;

pub use asset::{AudioAsset, FileAsset, MemoryAsset, SourceSpec};
pub use config::ExporterConfig;
pub use error::{Error, ErrorKind, Result};
pub use export::{ExportHandle, ExportSnapshot, ExportStatus, Exporter};
pub use format::ExportFormat;
pub use output::resolve_output_location;
