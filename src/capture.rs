//! Snapshot of the currently active slide.
//!
//! One invocation walks `Idle → WaitingForAssets → Capturing → Done | Failed`.
//! The asset wait is bounded: every visible asset must settle (a load error
//! counts as settled) or the ceiling timeout must elapse, whichever comes
//! first. A renderer failure ends in `Failed` and yields no raster; it is never
//! propagated, the caller decides whether a missing capture matters.

use futures::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::OrchestrationConfig;
use crate::contract::{AssetLoad, Raster, Renderer, SnapshotSpec};
use crate::error::CaptureError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    WaitingForAssets,
    Capturing,
    Done,
    Failed,
}

/// Result of the asset wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AssetWait {
    pub total: usize,
    pub settled: usize,
    /// True when the ceiling elapsed before every asset settled.
    pub timed_out: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOutcome {
    pub raster: Option<Raster>,
    pub assets: AssetWait,
    pub error: Option<CaptureError>,
    /// Every state visited, in order.
    pub states: Vec<CaptureState>,
}

impl CaptureOutcome {
    pub fn state(&self) -> CaptureState {
        self.states.last().copied().unwrap_or(CaptureState::Idle)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CapturePipeline {
    spec: SnapshotSpec,
    asset_timeout: Duration,
}

impl CapturePipeline {
    pub fn new(spec: SnapshotSpec, asset_timeout: Duration) -> Self {
        Self {
            spec,
            asset_timeout,
        }
    }

    pub fn from_config(config: &OrchestrationConfig) -> Self {
        Self::new(config.capture.snapshot_spec(), config.timing.asset_timeout())
    }

    pub fn spec(&self) -> &SnapshotSpec {
        &self.spec
    }

    /// Capture the active view, returning `None` on failure.
    pub async fn capture(&self, renderer: &dyn Renderer) -> Option<Raster> {
        self.run(renderer).await.raster
    }

    pub async fn run(&self, renderer: &dyn Renderer) -> CaptureOutcome {
        let mut states = vec![CaptureState::Idle];

        states.push(CaptureState::WaitingForAssets);
        let assets = self.wait_for_assets(renderer).await;

        states.push(CaptureState::Capturing);
        let snapshot = match renderer.snapshot(&self.spec).await {
            Ok(raster) if raster.png.is_empty() => Err(CaptureError::EmptySnapshot),
            other => other,
        };

        match snapshot {
            Ok(raster) => {
                states.push(CaptureState::Done);
                debug!(
                    width = raster.width,
                    height = raster.height,
                    bytes = raster.png.len(),
                    "[CAPTURE] snapshot taken"
                );
                CaptureOutcome {
                    raster: Some(raster),
                    assets,
                    error: None,
                    states,
                }
            }
            Err(e) => {
                states.push(CaptureState::Failed);
                warn!(error = %e, "[CAPTURE] snapshot failed");
                CaptureOutcome {
                    raster: None,
                    assets,
                    error: Some(e),
                    states,
                }
            }
        }
    }

    async fn wait_for_assets(&self, renderer: &dyn Renderer) -> AssetWait {
        let assets = renderer.visible_assets();
        let total = assets.len();
        let settled = AtomicUsize::new(0);

        let waits = assets.iter().map(|asset| {
            let settled = &settled;
            async move {
                if let AssetLoad::Failed(reason) = renderer.await_asset(asset).await {
                    debug!(asset = %asset.0, reason = %reason, "[CAPTURE] asset failed to load, treating as settled");
                }
                settled.fetch_add(1, Ordering::SeqCst);
            }
        });

        let timed_out = tokio::time::timeout(self.asset_timeout, join_all(waits))
            .await
            .is_err();

        let wait = AssetWait {
            total,
            settled: settled.load(Ordering::SeqCst),
            timed_out,
        };
        if timed_out {
            info!(
                total = wait.total,
                settled = wait.settled,
                timeout_ms = self.asset_timeout.as_millis() as u64,
                "[CAPTURE] asset wait hit the ceiling, capturing anyway"
            );
        }
        wait
    }
}
