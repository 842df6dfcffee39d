//! Slide records and project-level settings.
//!
//! A slide's identity is its [`SlideId`]; every other field is freely mutable
//! by the user or by completed generation tasks. Positions in the deck are not
//! stable references and are never used to address a slide.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::contract::AspectRatio;

/// Stable identifier of a slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlideId(Uuid);

impl SlideId {
    pub fn new() -> Self {
        SlideId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SlideId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SlideId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SlideId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(SlideId)
    }
}

impl From<Uuid> for SlideId {
    fn from(id: Uuid) -> Self {
        SlideId(id)
    }
}

/// Where a visual asset came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssetOrigin {
    Generated { model: String },
    Uploaded,
}

impl Default for AssetOrigin {
    fn default() -> Self {
        AssetOrigin::Uploaded
    }
}

/// Image attached to a slide. Bytes are stored inline and serialised as base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualAsset {
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    #[serde(default)]
    pub origin: AssetOrigin,
}

fn default_mime_type() -> String {
    "image/png".to_string()
}

impl VisualAsset {
    pub fn generated(mime_type: impl Into<String>, data: Vec<u8>, model: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
            origin: AssetOrigin::Generated {
                model: model.into(),
            },
        }
    }

    pub fn uploaded(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
            origin: AssetOrigin::Uploaded,
        }
    }
}

mod base64_bytes {
    use base64::prelude::*;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&BASE64_STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        BASE64_STANDARD
            .decode(&s)
            .map_err(serde::de::Error::custom)
    }
}

/// One slide of the deck.
///
/// Every field tolerates being absent in a persisted snapshot; a slide saved
/// without an id is assigned a fresh one on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideRecord {
    #[serde(default)]
    pub id: SlideId,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_asset: Option<VisualAsset>,
    /// Name of the layout template used by the presentation layer.
    #[serde(default = "default_layout")]
    pub layout: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_notes: Option<String>,
}

fn default_layout() -> String {
    "default".to_string()
}

impl SlideRecord {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: SlideId::new(),
            content: content.into(),
            generation_prompt: None,
            visual_asset: None,
            layout: default_layout(),
            speaker_notes: None,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.generation_prompt = Some(prompt.into());
        self
    }

    pub fn with_visual(mut self, asset: VisualAsset) -> Self {
        self.visual_asset = Some(asset);
        self
    }
}

/// Project-wide settings persisted alongside the slides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    pub title: String,
    pub aspect_ratio: AspectRatio,
    /// Free-text style description used by the stylize operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            title: "Presentation".to_string(),
            aspect_ratio: AspectRatio::default(),
            style: None,
        }
    }
}
