//! Export of rendered slides as raster files.
//!
//! Only one slide can be on screen, so a full export drives the renderer
//! through the deck one slide at a time: activate, let the render settle,
//! capture, move on. A failed capture skips that slide and the sequence keeps
//! going. Afterwards the slide that was active before the export is restored
//! and the archive is packaged into one download.
//!
//! Archive order is the deck order at the moment the export began; captures
//! are strictly sequential, so no sorting is involved.

use async_trait::async_trait;
use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::capture::CapturePipeline;
use crate::config::OrchestrationConfig;
use crate::contract::{ArchiveEntry, ArchivePackager, DownloadSink, Raster, Renderer};
use crate::error::ExportError;
use crate::slide::SlideId;
use crate::store::SlideStore;

/// One captured slide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedSlide {
    pub slide_id: SlideId,
    /// Zero-based position in the deck when the export began.
    pub position: usize,
    pub raster: Raster,
}

/// Captures collected by a full-sequence export, in deck order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportArchive {
    entries: Vec<ExportedSlide>,
    deck_len: usize,
}

impl ExportArchive {
    pub fn new(deck_len: usize) -> Self {
        Self {
            entries: Vec::new(),
            deck_len,
        }
    }

    pub fn push(&mut self, slide_id: SlideId, position: usize, raster: Raster) {
        self.entries.push(ExportedSlide {
            slide_id,
            position,
            raster,
        });
    }

    pub fn entries(&self) -> &[ExportedSlide] {
        &self.entries
    }

    pub fn slide_ids(&self) -> Vec<SlideId> {
        self.entries.iter().map(|e| e.slide_id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Named blobs ready for packaging: `slide-01.png`, `slide-02.png`, ...
    pub fn named_entries(&self) -> Vec<ArchiveEntry> {
        self.entries
            .iter()
            .map(|e| ArchiveEntry {
                name: slide_file_name(e.position, self.deck_len),
                bytes: e.raster.png.clone(),
            })
            .collect()
    }
}

fn slide_file_name(position: usize, deck_len: usize) -> String {
    let width = deck_len.max(1).to_string().len().max(2);
    format!("slide-{:0width$}.png", position + 1, width = width)
}

/// Result of [`ExportCoordinator::capture_sequence`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceCapture {
    pub archive: ExportArchive,
    pub skipped: Vec<SlideId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub file: PathBuf,
    pub captured: Vec<SlideId>,
    pub skipped: Vec<SlideId>,
}

pub struct ExportCoordinator {
    store: SlideStore,
    renderer: Arc<dyn Renderer>,
    pipeline: CapturePipeline,
    render_settle: Duration,
    packager: Arc<dyn ArchivePackager>,
    sink: Arc<dyn DownloadSink>,
}

impl ExportCoordinator {
    pub fn new(
        store: SlideStore,
        renderer: Arc<dyn Renderer>,
        packager: Arc<dyn ArchivePackager>,
        sink: Arc<dyn DownloadSink>,
        config: &OrchestrationConfig,
    ) -> Self {
        Self {
            store,
            renderer,
            pipeline: CapturePipeline::from_config(config),
            render_settle: config.timing.render_settle(),
            packager,
            sink,
        }
    }

    /// Capture the active slide and deliver it as a single PNG.
    pub async fn export_current(&self) -> Result<ExportReport, ExportError> {
        let active = self
            .renderer
            .active_slide()
            .ok_or(ExportError::NoActiveSlide)?;
        info!(slide_id = %active, "[EXPORT] capturing active slide");

        let raster = self
            .pipeline
            .capture(self.renderer.as_ref())
            .await
            .ok_or(ExportError::CaptureFailed(active))?;

        let position = self.store.position(&active).unwrap_or(0);
        let file_name = slide_file_name(position, self.store.len());
        let file = self.sink.deliver(&file_name, &raster.png).await?;
        info!(slide_id = %active, file = %file.display(), "[EXPORT] single slide exported");

        Ok(ExportReport {
            file,
            captured: vec![active],
            skipped: Vec::new(),
        })
    }

    /// Capture every slide in deck order, then package and deliver the archive.
    pub async fn export_all(&self) -> Result<ExportReport, ExportError> {
        let SequenceCapture { archive, skipped } = self.capture_sequence().await;

        if archive.is_empty() {
            error!(skipped = skipped.len(), "[EXPORT][ERROR] no slide could be captured");
            return Err(ExportError::EmptyArchive);
        }

        let package = self.packager.package(&archive.named_entries())?;
        let file_name = format!(
            "{}.{}",
            slugify(&self.store.settings().title),
            self.packager.extension()
        );
        let file = self.sink.deliver(&file_name, &package).await?;
        info!(
            file = %file.display(),
            captured = archive.len(),
            skipped = skipped.len(),
            "[EXPORT] archive exported"
        );

        Ok(ExportReport {
            file,
            captured: archive.slide_ids(),
            skipped,
        })
    }

    /// Drive the renderer through the deck and collect one capture per slide.
    ///
    /// The slide active beforehand is re-activated afterwards; if it was
    /// deleted during the export, the first remaining slide is activated.
    pub async fn capture_sequence(&self) -> SequenceCapture {
        let order = self.store.ids();
        let previous = self.renderer.active_slide();
        info!(slides = order.len(), "[EXPORT] starting full-sequence capture");

        let mut archive = ExportArchive::new(order.len());
        let mut skipped = Vec::new();

        for (position, id) in order.iter().enumerate() {
            self.renderer.set_active_slide(id).await;
            tokio::time::sleep(self.render_settle).await;

            match self.pipeline.capture(self.renderer.as_ref()).await {
                Some(raster) => {
                    info!(slide_id = %id, position, "[EXPORT] slide captured");
                    archive.push(*id, position, raster);
                }
                None => {
                    warn!(slide_id = %id, position, "[EXPORT] capture failed, skipping slide");
                    skipped.push(*id);
                }
            }
        }

        let restore = previous
            .filter(|prev| self.store.contains(prev))
            .or_else(|| self.store.ids().first().copied());
        if let Some(restore) = restore {
            self.renderer.set_active_slide(&restore).await;
        }

        SequenceCapture { archive, skipped }
    }
}

fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "slides".to_string()
    } else {
        slug
    }
}

/// Packages entries into a zip file, uncompressed (PNGs are already compressed).
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipPackager;

impl ArchivePackager for ZipPackager {
    fn extension(&self) -> &'static str {
        "zip"
    }

    fn package(&self, entries: &[ArchiveEntry]) -> Result<Vec<u8>, ExportError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Stored);

        for entry in entries {
            zip.start_file(entry.name.as_str(), options)?;
            zip.write_all(&entry.bytes)
                .map_err(|e| ExportError::Package(format!("writing {}: {e}", entry.name)))?;
        }

        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }
}

/// Writes delivered files into a directory, creating it if needed.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl DownloadSink for DirectorySink {
    async fn deliver(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, ExportError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| ExportError::Io {
                path: self.dir.clone(),
                source,
            })?;
        let path = self.dir.join(file_name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| ExportError::Io {
                path: path.clone(),
                source,
            })?;
        debug!(path = %path.display(), bytes = bytes.len(), "[EXPORT] file written");
        Ok(path)
    }
}
