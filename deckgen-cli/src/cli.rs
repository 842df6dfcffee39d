///
/// This module implements the CLI interface for deckgen: command parsing,
/// argument validation and the async entrypoint used by `main` and the tests.
///
/// All orchestration logic (store, generation, fallback, capture, export) lives
/// in the [`deckgen`] core crate. This module only wires collaborators together:
/// the YAML config, the project file, the HTTP backend and the output directory.
///
/// ## How To Use
/// - For command-line users: run the installed `deckgen` binary with `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
use crate::backend::GeminiClient;
use crate::load_config::{load_config, CliConfig};
use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use deckgen::contract::Renderer;
use deckgen::export::{DirectorySink, ExportCoordinator, ZipPackager};
use deckgen::generation::{GenerationRequest, GenerationService, Reconciled};
use deckgen::persistence;
use deckgen::render::AssetRenderer;
use deckgen::{SlideId, SlideStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// CLI for deckgen: generate slide content and export decks as images.
#[derive(Parser)]
#[clap(
    name = "deckgen",
    version,
    about = "Generate slide text and visuals with model fallback, and export decks as PNG archives"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a generation operation for one slide, several slides, or the whole deck
    Generate {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Path to the project JSON file; updated in place
        #[clap(long)]
        project: PathBuf,
        /// Operation to run
        #[clap(long, value_enum)]
        kind: OperationKind,
        /// Instruction for `refine` and `edit`
        #[clap(long)]
        instruction: Option<String>,
        /// Slide id to target; repeat for a batch, omit for every slide
        #[clap(long = "slide")]
        slides: Vec<SlideId>,
    },
    /// Export one slide as PNG, or every slide as a zip archive
    Export {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Path to the project JSON file
        #[clap(long)]
        project: PathBuf,
        /// Directory the export is written to
        #[clap(long)]
        out_dir: PathBuf,
        /// Export only this slide
        #[clap(long)]
        slide: Option<SlideId>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OperationKind {
    Text,
    Refine,
    Image,
    Edit,
    Stylize,
}

impl OperationKind {
    pub fn into_request(self, instruction: Option<String>) -> Result<GenerationRequest> {
        let instruction = instruction.filter(|i| !i.trim().is_empty());
        Ok(match (self, instruction) {
            (OperationKind::Text, _) => GenerationRequest::Text,
            (OperationKind::Image, _) => GenerationRequest::Image,
            (OperationKind::Stylize, _) => GenerationRequest::Stylize,
            (OperationKind::Refine, Some(instruction)) => GenerationRequest::Refine { instruction },
            (OperationKind::Edit, Some(instruction)) => GenerationRequest::EditImage { instruction },
            (kind, None) => bail!("--instruction is required for --kind {kind:?}"),
        })
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Generate {
            config,
            project,
            kind,
            instruction,
            slides,
        } => {
            let request = kind.into_request(instruction)?;
            let config = load_config(config)?;
            tracing::info!(command = "generate", ?kind, slides = slides.len(), "Starting generation");
            generate(&config, &project, request, slides).await
        }
        Commands::Export {
            config,
            project,
            out_dir,
            slide,
        } => {
            let config = load_config(config)?;
            tracing::info!(command = "export", out_dir = %out_dir.display(), "Starting export");
            export(&config, &project, out_dir, slide).await
        }
    }
}

async fn open_project(path: &Path) -> Result<SlideStore> {
    let snapshot = persistence::load_from_path(path).await?;
    let store = SlideStore::new();
    persistence::restore(&store, snapshot)?;
    Ok(store)
}

async fn generate(
    config: &CliConfig,
    project: &Path,
    request: GenerationRequest,
    slides: Vec<SlideId>,
) -> Result<()> {
    let api_key = config.require_api_key()?;
    let store = open_project(project).await?;
    let client = GeminiClient::new(api_key, config.backend.base_url.clone());
    let service = GenerationService::new(store.clone(), Arc::new(client), &config.orchestration);

    if slides.len() == 1 {
        let id = &slides[0];
        if !store.contains(id) {
            bail!("slide {id} is not in project {}", project.display());
        }
        match service.run(*id, request).await {
            Ok(Reconciled::Applied) => {
                persistence::save_to_path(&store, project).await?;
                tracing::info!(command = "generate", slide_id = %id, "Generation complete");
                println!("Updated slide {id}");
                Ok(())
            }
            Ok(Reconciled::Discarded) => bail!("slide {id} was removed before its result arrived"),
            Err(e) => {
                tracing::error!(command = "generate", slide_id = %id, error = %e, "Generation failed");
                Err(e.into())
            }
        }
    } else {
        let ids = if slides.is_empty() { store.ids() } else { slides };
        if let Some(missing) = ids.iter().find(|id| !store.contains(id)) {
            bail!("slide {missing} is not in project {}", project.display());
        }
        let report = service.run_batch(&ids, request).await;
        persistence::save_to_path(&store, project).await?;

        println!(
            "Batch finished: {} succeeded, {} failed, {} discarded",
            report.succeeded.len(),
            report.failure_count(),
            report.discarded.len()
        );
        for (id, e) in &report.failed {
            eprintln!("  {id}: {e}");
        }
        tracing::info!(command = "generate", ?report, "Batch generation complete");
        if report.failure_count() > 0 {
            bail!("{} of {} slides failed", report.failure_count(), report.total());
        }
        Ok(())
    }
}

async fn export(
    config: &CliConfig,
    project: &Path,
    out_dir: PathBuf,
    slide: Option<SlideId>,
) -> Result<()> {
    let store = open_project(project).await?;
    let renderer = Arc::new(AssetRenderer::new(store.clone()));
    let coordinator = ExportCoordinator::new(
        store.clone(),
        renderer.clone(),
        Arc::new(ZipPackager),
        Arc::new(DirectorySink::new(out_dir)),
        &config.orchestration,
    );

    let report = match slide {
        Some(id) => {
            if !store.contains(&id) {
                bail!("slide {id} is not in project {}", project.display());
            }
            renderer.set_active_slide(&id).await;
            coordinator.export_current().await?
        }
        None => coordinator.export_all().await?,
    };

    tracing::info!(command = "export", file = %report.file.display(), captured = report.captured.len(), skipped = report.skipped.len(), "Export complete");
    println!("Exported {} slide(s) to {}", report.captured.len(), report.file.display());
    for id in &report.skipped {
        eprintln!("  skipped {id}: capture failed");
    }
    Ok(())
}
