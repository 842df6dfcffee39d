//! Orchestration settings: model tiers, timing delays and the capture target.
//!
//! Every field has a default, so a partial file (or none at all) loads.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::contract::{Color, SnapshotSpec};

/// Runtime configuration of the orchestration layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    pub models: ModelConfig,
    pub timing: TimingConfig,
    pub capture: CaptureConfig,
}

impl OrchestrationConfig {
    pub fn trace_loaded(&self) {
        info!(
            text_tiers = ?self.models.text_tiers,
            image_tiers = ?self.models.image_tiers,
            width = self.capture.width,
            height = self.capture.height,
            "Loaded OrchestrationConfig"
        );
        debug!(?self, "OrchestrationConfig loaded (full debug)");
    }
}

/// Model tiers, best first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub text_tiers: Vec<String>,
    pub image_tiers: Vec<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            text_tiers: vec![
                "gemini-2.5-pro".to_string(),
                "gemini-2.5-flash".to_string(),
                "gemini-2.5-flash-lite".to_string(),
            ],
            image_tiers: vec![
                "gemini-3-pro-image-preview".to_string(),
                "gemini-2.5-flash-image".to_string(),
            ],
        }
    }
}

/// Delays used by tracking and export. None of the defaults is load-bearing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// How long a terminal per-slide status stays visible before it is pruned.
    pub status_grace_ms: u64,
    /// Delay between a batch settling and its status being cleared.
    pub batch_settle_ms: u64,
    /// Ceiling on waiting for visual assets before a capture proceeds anyway.
    pub asset_timeout_ms: u64,
    /// Pause after switching the active slide, before capturing it.
    pub render_settle_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            status_grace_ms: 3_000,
            batch_settle_ms: 3_000,
            asset_timeout_ms: 3_000,
            render_settle_ms: 300,
        }
    }
}

impl TimingConfig {
    pub fn status_grace(&self) -> Duration {
        Duration::from_millis(self.status_grace_ms)
    }

    pub fn batch_settle(&self) -> Duration {
        Duration::from_millis(self.batch_settle_ms)
    }

    pub fn asset_timeout(&self) -> Duration {
        Duration::from_millis(self.asset_timeout_ms)
    }

    pub fn render_settle(&self) -> Duration {
        Duration::from_millis(self.render_settle_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    pub background: Color,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            background: Color::WHITE,
        }
    }
}

impl CaptureConfig {
    /// The background is always filled opaque; a configured alpha is dropped.
    pub fn snapshot_spec(&self) -> SnapshotSpec {
        SnapshotSpec {
            width: self.width,
            height: self.height,
            background: self.background.opaque(),
        }
    }
}
