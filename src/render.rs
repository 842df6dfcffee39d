//! In-process renderer that draws a slide as its visual asset.
//!
//! The asset is scaled to fit the target resolution, keeping its aspect ratio,
//! and centred on the background fill. A slide without an asset, or with one
//! that does not decode, renders as the plain background.

use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use parking_lot::Mutex;
use std::io::Cursor;
use tracing::{debug, warn};

use crate::contract::{AssetKey, AssetLoad, Raster, Renderer, SnapshotSpec};
use crate::error::CaptureError;
use crate::slide::{SlideId, VisualAsset};
use crate::store::SlideStore;

pub struct AssetRenderer {
    store: SlideStore,
    active: Mutex<Option<SlideId>>,
}

impl AssetRenderer {
    /// Starts with the first slide active, if there is one.
    pub fn new(store: SlideStore) -> Self {
        let first = store.ids().first().copied();
        Self {
            store,
            active: Mutex::new(first),
        }
    }

    fn active_asset(&self) -> Result<Option<VisualAsset>, CaptureError> {
        let id = self.active_slide().ok_or(CaptureError::NoActiveSlide)?;
        let slide = self
            .store
            .get(&id)
            .map_err(|e| CaptureError::Renderer(e.to_string()))?;
        Ok(slide.visual_asset)
    }
}

fn decode(asset: &VisualAsset) -> Result<DynamicImage, String> {
    image::load_from_memory(&asset.data).map_err(|e| e.to_string())
}

/// Background is filled opaque whatever alpha the spec carries.
fn compose(spec: &SnapshotSpec, asset: Option<&DynamicImage>) -> RgbaImage {
    let background = Rgba(spec.background.opaque().to_rgba());
    let mut canvas = RgbaImage::from_pixel(spec.width, spec.height, background);
    if let Some(img) = asset {
        let fitted = img.resize(spec.width, spec.height, FilterType::Triangle).to_rgba8();
        let x = (spec.width.saturating_sub(fitted.width()) / 2) as i64;
        let y = (spec.height.saturating_sub(fitted.height()) / 2) as i64;
        imageops::overlay(&mut canvas, &fitted, x, y);
    }
    canvas
}

#[async_trait]
impl Renderer for AssetRenderer {
    fn active_slide(&self) -> Option<SlideId> {
        *self.active.lock()
    }

    async fn set_active_slide(&self, id: &SlideId) {
        *self.active.lock() = Some(*id);
    }

    fn visible_assets(&self) -> Vec<AssetKey> {
        match self.active_asset() {
            Ok(Some(_)) => self
                .active_slide()
                .map(|id| vec![AssetKey(id.to_string())])
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    async fn await_asset(&self, asset: &AssetKey) -> AssetLoad {
        let Ok(id) = asset.0.parse::<SlideId>() else {
            return AssetLoad::Failed(format!("unknown asset '{}'", asset.0));
        };
        match self.store.get(&id).map(|s| s.visual_asset) {
            Ok(Some(visual)) => match decode(&visual) {
                Ok(_) => AssetLoad::Loaded,
                Err(e) => AssetLoad::Failed(e),
            },
            Ok(None) => AssetLoad::Failed("slide has no visual asset".into()),
            Err(e) => AssetLoad::Failed(e.to_string()),
        }
    }

    async fn snapshot(&self, spec: &SnapshotSpec) -> Result<Raster, CaptureError> {
        let asset = self.active_asset()?;
        let decoded = match asset.as_ref().map(decode) {
            Some(Ok(img)) => Some(img),
            Some(Err(e)) => {
                warn!(error = %e, "[CAPTURE] visual asset did not decode, rendering background only");
                None
            }
            None => None,
        };

        let canvas = compose(spec, decoded.as_ref());
        let mut png = Vec::new();
        DynamicImage::ImageRgba8(canvas)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| CaptureError::Renderer(e.to_string()))?;
        debug!(width = spec.width, height = spec.height, bytes = png.len(), "[CAPTURE] slide rendered");

        Ok(Raster {
            width: spec.width,
            height: spec.height,
            png,
        })
    }
}
