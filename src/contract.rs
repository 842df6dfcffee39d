//! # contract: interfaces to the collaborators outside the orchestration core
//!
//! The orchestration layer talks to three external parties:
//! - a generative backend ([`GenerationClient`]) producing text and images,
//! - a renderer ([`Renderer`]) that shows one slide at a time and can snapshot it,
//! - a packager and a download target ([`ArchivePackager`], [`DownloadSink`]).
//!
//! All of them are traits so production clients, in-process defaults and test
//! mocks plug in the same way.
//!
//! ## Mocking & Testing
//! - Every trait is annotated for `mockall`; the mocks are exported behind the
//!   `test-export-mocks` feature so integration tests can use them.
//!
//! ## Typed boundary
//! - Backend responses are converted to [`GeneratedText`] / [`GeneratedImage`]
//!   inside the client implementation. Nothing untyped crosses this module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{CaptureError, ExportError, RequestError};
use crate::slide::{SlideId, VisualAsset};

/// Aspect ratio requested from the image backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Widescreen,
    #[serde(rename = "4:3")]
    Standard,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Widescreen => "16:9",
            AspectRatio::Standard => "4:3",
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait => "9:16",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedText {
    pub text: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub mime_type: String,
    pub data: Vec<u8>,
    pub model: String,
}

/// Trait for calling the external generation backend.
///
/// Calls are idempotent from the orchestrator's point of view and may be
/// retried on another model. Implementations hold no orchestration state.
#[cfg_attr(any(test, feature = "test-export-mocks"), mockall::automock)]
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate_text(&self, prompt: &str, model: &str) -> Result<GeneratedText, RequestError>;

    async fn generate_image(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
        model: &str,
    ) -> Result<GeneratedImage, RequestError>;

    /// Edit an existing image following a natural-language instruction.
    async fn edit_image(
        &self,
        asset: &VisualAsset,
        instruction: &str,
        aspect_ratio: AspectRatio,
        model: &str,
    ) -> Result<GeneratedImage, RequestError>;
}

/// RGB(A) fill colour, parsed from `#rrggbb` or `#rrggbbaa`.
///
/// Capture backgrounds are always filled with [`Color::opaque`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color {
        r: 255,
        g: 255,
        b: 255,
        a: 255,
    };

    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// The same colour with full alpha.
    pub fn opaque(self) -> Color {
        Color { a: 255, ..self }
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if !(hex.len() == 6 || hex.len() == 8) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("invalid colour '{s}', expected #rrggbb or #rrggbbaa"));
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|e| e.to_string());
        Ok(Color {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
            a: if hex.len() == 8 { channel(6)? } else { 255 },
        })
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)?;
        if self.a != 255 {
            write!(f, "{:02x}", self.a)?;
        }
        Ok(())
    }
}

impl Serialize for Color {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// What the renderer is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotSpec {
    pub width: u32,
    pub height: u32,
    pub background: Color,
}

/// Encoded raster snapshot (PNG).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

/// Handle for one visual asset inside the currently rendered view.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetKey(pub String);

/// How an asset settled. Both variants count as settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetLoad {
    Loaded,
    Failed(String),
}

/// Trait for the renderer that shows exactly one slide at a time.
#[cfg_attr(any(test, feature = "test-export-mocks"), mockall::automock)]
#[async_trait]
pub trait Renderer: Send + Sync {
    fn active_slide(&self) -> Option<SlideId>;

    async fn set_active_slide(&self, id: &SlideId);

    /// Enumerate the visual assets present in the active view.
    fn visible_assets(&self) -> Vec<AssetKey>;

    /// Resolves once the asset has finished loading, successfully or not.
    /// May never resolve for a pathological asset; callers bound the wait.
    async fn await_asset(&self, asset: &AssetKey) -> AssetLoad;

    async fn snapshot(&self, spec: &SnapshotSpec) -> Result<Raster, CaptureError>;
}

/// Named blob inside an export archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Trait for turning an ordered list of blobs into one downloadable package.
#[cfg_attr(any(test, feature = "test-export-mocks"), mockall::automock)]
pub trait ArchivePackager: Send + Sync {
    /// File extension of the produced package, without the dot.
    fn extension(&self) -> &'static str;

    fn package(&self, entries: &[ArchiveEntry]) -> Result<Vec<u8>, ExportError>;
}

/// Trait for handing a finished file to the user.
#[cfg_attr(any(test, feature = "test-export-mocks"), mockall::automock)]
#[async_trait]
pub trait DownloadSink: Send + Sync {
    /// Deliver `bytes` under `file_name`, returning where it ended up.
    async fn deliver(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, ExportError>;
}
