// Export and share boundaries.
//
// Rendering to PDF/PNG and publishing share links are host concerns; this
// module only defines the typed seams and the built-in JSON arm. Exported
// blobs are opaque to the core.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tabula_common::types::Dashboard;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Json,
    Pdf,
    Png,
}

/// Quality/dimension hints for renderer-backed formats; ignored for JSON.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExportOptions {
    /// Render quality in [0.0, 1.0].
    pub quality: f32,
    pub width_px: Option<u32>,
    pub height_px: Option<u32>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self { quality: 0.92, width_px: None, height_px: None }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export format {0:?} requires an external renderer")]
    UnsupportedFormat(ExportFormat),
    #[error("failed to serialize dashboard: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Renders a dashboard into an opaque blob in the requested format.
#[async_trait]
pub trait DashboardExporter: Send + Sync {
    async fn export(
        &self,
        dashboard: &Dashboard,
        format: ExportFormat,
        options: ExportOptions,
    ) -> Result<Vec<u8>, ExportError>;
}

/// Built-in exporter: handles `json` locally, rejects renderer formats.
#[derive(Debug, Default)]
pub struct JsonExporter;

#[async_trait]
impl DashboardExporter for JsonExporter {
    async fn export(
        &self,
        dashboard: &Dashboard,
        format: ExportFormat,
        _options: ExportOptions,
    ) -> Result<Vec<u8>, ExportError> {
        match format {
            ExportFormat::Json => Ok(serde_json::to_vec_pretty(dashboard)?),
            other => Err(ExportError::UnsupportedFormat(other)),
        }
    }
}

// ── Sharing ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ShareVisibility {
    Private,
    Workspace,
    Public,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShareSettings {
    pub visibility: ShareVisibility,
    /// Whether viewers may re-share the link.
    pub allow_reshare: bool,
}

impl Default for ShareSettings {
    fn default() -> Self {
        Self { visibility: ShareVisibility::Private, allow_reshare: false }
    }
}

/// A published share target returned by the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShareLink {
    pub id: String,
    pub url: String,
}

/// Publishes a dashboard and returns a shareable link. Opaque external
/// call; correctness is the host's concern.
#[async_trait]
pub trait DashboardPublisher: Send + Sync {
    async fn publish(&self, dashboard: &Dashboard, settings: &ShareSettings) -> Result<ShareLink>;
}
