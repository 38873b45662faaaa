//! Export lifecycle state and snapshots

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::format::ExportFormat;

/// Lifecycle of an export: Idle -> Exporting -> {Succeeded | Failed | Cancelled}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExportStatus {
    #[default]
    Idle,
    Exporting,
    Succeeded,
    Failed,
    Cancelled,
}

impl ExportStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

/// Point-in-time view of the exporter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSnapshot {
    pub id: Option<Uuid>,
    pub format: Option<ExportFormat>,
    pub status: ExportStatus,
    pub progress: f32,
    pub output_path: Option<PathBuf>,
}

impl ExportSnapshot {
    pub fn idle() -> Self {
        Self {
            id: None,
            format: None,
            status: ExportStatus::Idle,
            progress: 0.0,
            output_path: None,
        }
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> String {
        serde_json::json!({
            "id": self.id,
            "format": self.format,
            "status": self.status,
            "progress": self.progress,
            "output_path": self.output_path,
        })
        .to_string()
    }
}
