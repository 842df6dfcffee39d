//! Project snapshots: the slide collection plus settings as self-describing JSON.
//!
//! Loading is tolerant. Missing optional fields take their defaults, unknown
//! fields are ignored, and slides saved without an id get a fresh one.
//! A snapshot written by a newer format version is rejected rather than
//! partially understood, as is one where two slides share an id. Restoring
//! replaces slides and settings in one store operation.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

use crate::error::PersistenceError;
use crate::slide::{ProjectSettings, SlideRecord};
use crate::store::{ProjectState, SlideStore};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Milliseconds since the Unix epoch; 0 when unknown.
    #[serde(default)]
    pub saved_at_ms: u64,
    #[serde(default)]
    pub settings: ProjectSettings,
    #[serde(default)]
    pub slides: Vec<SlideRecord>,
}

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

impl ProjectSnapshot {
    /// Checks the invariants a store relies on: a supported version and
    /// unique slide ids.
    pub fn validate(&self) -> Result<(), PersistenceError> {
        if self.version > SNAPSHOT_VERSION {
            return Err(PersistenceError::UnsupportedVersion {
                found: self.version,
                supported: SNAPSHOT_VERSION,
            });
        }
        let mut seen = HashSet::with_capacity(self.slides.len());
        match self.slides.iter().find(|s| !seen.insert(s.id)) {
            Some(dup) => Err(PersistenceError::DuplicateSlideId(dup.id)),
            None => Ok(()),
        }
    }

    pub fn into_state(self) -> ProjectState {
        ProjectState {
            slides: self.slides,
            settings: self.settings,
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Capture the current store contents.
pub fn snapshot(store: &SlideStore) -> ProjectSnapshot {
    let state = store.state();
    ProjectSnapshot {
        version: SNAPSHOT_VERSION,
        saved_at_ms: now_ms(),
        settings: state.settings,
        slides: state.slides,
    }
}

pub fn to_json(snapshot: &ProjectSnapshot) -> Result<String, PersistenceError> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

pub fn from_json(json: &str) -> Result<ProjectSnapshot, PersistenceError> {
    let snapshot: ProjectSnapshot = serde_json::from_str(json)?;
    snapshot.validate()?;
    Ok(snapshot)
}

/// Replace the store contents with `snapshot`. An invalid snapshot leaves the
/// store untouched.
pub fn restore(store: &SlideStore, snapshot: ProjectSnapshot) -> Result<(), PersistenceError> {
    snapshot.validate()?;
    info!(
        slides = snapshot.slides.len(),
        version = snapshot.version,
        "[PERSIST] restoring project"
    );
    store.restore(snapshot.into_state());
    Ok(())
}

pub async fn save_to_path(store: &SlideStore, path: &Path) -> Result<(), PersistenceError> {
    let json = to_json(&snapshot(store))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| PersistenceError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    tokio::fs::write(path, json)
        .await
        .map_err(|source| PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    info!(path = %path.display(), slides = store.len(), "[PERSIST] project saved");
    Ok(())
}

pub async fn load_from_path(path: &Path) -> Result<ProjectSnapshot, PersistenceError> {
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let snapshot = from_json(&json)?;
    debug!(path = %path.display(), slides = snapshot.slides.len(), "[PERSIST] project loaded");
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::AspectRatio;
    use crate::slide::VisualAsset;

    #[test]
    fn tolerates_missing_and_unknown_fields() {
        let snapshot = from_json(
            r#"{
                "slides": [
                    {"content": "Intro", "theme": "dark"},
                    {"id": "6f1c1d7e-3a43-4a3e-9d8b-7f0f2b9e1a11", "content": "Body", "speaker_notes": "say hi"}
                ],
                "legacy_flag": true
            }"#,
        )
        .unwrap();

        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
        assert_eq!(snapshot.saved_at_ms, 0);
        assert_eq!(snapshot.settings, ProjectSettings::default());
        assert_eq!(snapshot.slides.len(), 2);
        assert_eq!(
            snapshot.slides[1].id.to_string(),
            "6f1c1d7e-3a43-4a3e-9d8b-7f0f2b9e1a11"
        );
        assert_eq!(snapshot.slides[1].speaker_notes.as_deref(), Some("say hi"));
    }

    #[test]
    fn rejects_newer_versions() {
        let err = from_json(r#"{"version": 7, "slides": []}"#).unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::UnsupportedVersion {
                found: 7,
                supported: SNAPSHOT_VERSION
            }
        ));
    }

    #[test]
    fn restore_replaces_store_contents() {
        let store = SlideStore::new();
        store.push(SlideRecord::new("old"));

        let mut settings = ProjectSettings::default();
        settings.aspect_ratio = AspectRatio::Square;
        let snapshot = ProjectSnapshot {
            version: SNAPSHOT_VERSION,
            saved_at_ms: 1,
            settings: settings.clone(),
            slides: vec![
                SlideRecord::new("new")
                    .with_visual(VisualAsset::uploaded("image/png", vec![9, 9])),
            ],
        };
        restore(&store, snapshot.clone()).unwrap();

        assert_eq!(store.slides(), snapshot.slides);
        assert_eq!(store.settings(), settings);
    }

    #[test]
    fn rejects_slides_sharing_an_id() {
        let json = r#"{
            "slides": [
                {"id": "6f1c1d7e-3a43-4a3e-9d8b-7f0f2b9e1a11", "content": "first"},
                {"content": "unnamed"},
                {"id": "6f1c1d7e-3a43-4a3e-9d8b-7f0f2b9e1a11", "content": "second"}
            ]
        }"#;
        match from_json(json) {
            Err(PersistenceError::DuplicateSlideId(id)) => {
                assert_eq!(id.to_string(), "6f1c1d7e-3a43-4a3e-9d8b-7f0f2b9e1a11")
            }
            other => panic!("expected DuplicateSlideId, got {other:?}"),
        }
    }

    #[test]
    fn restore_with_shared_ids_leaves_the_store_alone() {
        let store = SlideStore::new();
        let kept = store.push(SlideRecord::new("kept"));

        let first = SlideRecord::new("first");
        let second = SlideRecord {
            content: "second".into(),
            ..first.clone()
        };
        let snapshot = ProjectSnapshot {
            version: SNAPSHOT_VERSION,
            saved_at_ms: 0,
            settings: ProjectSettings::default(),
            slides: vec![first.clone(), second],
        };

        let err = restore(&store, snapshot).unwrap_err();
        assert!(matches!(err, PersistenceError::DuplicateSlideId(id) if id == first.id));
        assert_eq!(store.ids(), vec![kept]);
    }

    #[tokio::test]
    async fn save_then_load_through_the_filesystem() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("projects/deck.json");

        let store = SlideStore::new();
        store.push(SlideRecord::new("One").with_prompt("a lighthouse"));
        store.update_settings(|s| ProjectSettings {
            title: "Harbour".into(),
            ..s.clone()
        });
        save_to_path(&store, &path).await.unwrap();

        let loaded = load_from_path(&path).await.unwrap();
        assert!(loaded.saved_at_ms > 0);
        assert_eq!(loaded.settings.title, "Harbour");
        assert_eq!(loaded.slides, store.slides());
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error_naming_the_path() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("absent.json");
        match load_from_path(&path).await {
            Err(PersistenceError::Io { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected Io error, got {other:?}"),
        }
    }
}
