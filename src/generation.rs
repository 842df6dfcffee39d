//! Generation orchestration: runs backend requests for slides and reconciles
//! their results into the [`SlideStore`].
//!
//! This module provides the entry points the editor calls when the user asks
//! for generated content, either for one slide or for a batch of slides:
//!   - Resolves the slide's inputs against the store when the task starts
//!   - Tracks the task in the [`TaskTracker`] (running, then succeeded/failed)
//!   - Calls the backend through a [`ClientHandle`], walking model tiers with
//!     the [`FallbackPolicy`] matching the operation
//!   - Writes the result back by slide id through [`SlideStore::replace`]
//!
//! # Reconciliation
//! A task never holds on to the slide collection it started with. When the
//! backend answers, the result is applied to whatever slide currently carries
//! the id; if the slide was deleted in the meantime the result is dropped and
//! logged. Two tasks for the same slide both write, and the one that finishes
//! last wins.
//!
//! # Batches
//! [`GenerationService::run_batch`] runs one task per slide and waits for all
//! of them to settle. A failing member never cancels its siblings.

use futures::future::join_all;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::{ModelConfig, OrchestrationConfig};
use crate::contract::{GeneratedImage, GeneratedText, GenerationClient};
use crate::error::{GenerationError, NotFound, RequestError};
use crate::fallback::{run_with_fallback, FallbackPolicy};
use crate::slide::{SlideId, SlideRecord, VisualAsset};
use crate::store::SlideStore;
use crate::tracker::{TaskKind, TaskOutcome, TaskTracker};

/// What to generate for a slide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationRequest {
    /// Write the slide content from its generation prompt.
    Text,
    /// Rewrite the existing content following an instruction.
    Refine { instruction: String },
    /// Generate the slide visual from its generation prompt.
    Image,
    /// Edit the existing visual following an instruction.
    EditImage { instruction: String },
    /// Restyle the existing visual with the project style.
    Stylize,
}

impl GenerationRequest {
    pub fn kind(&self) -> TaskKind {
        match self {
            GenerationRequest::Text | GenerationRequest::Refine { .. } => TaskKind::Content,
            GenerationRequest::Image
            | GenerationRequest::EditImage { .. }
            | GenerationRequest::Stylize => TaskKind::Visual,
        }
    }

    pub fn policy(&self) -> FallbackPolicy {
        match self.kind() {
            TaskKind::Content => FallbackPolicy::Unconditional,
            TaskKind::Visual => FallbackPolicy::PermissionGated,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            GenerationRequest::Text => "text",
            GenerationRequest::Refine { .. } => "refine",
            GenerationRequest::Image => "image",
            GenerationRequest::EditImage { .. } => "edit",
            GenerationRequest::Stylize => "stylize",
        }
    }
}

/// What happened to a completed result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// Written into the store.
    Applied,
    /// Target slide no longer exists; result dropped.
    Discarded,
}

/// Reconfigurable handle to the backend client.
///
/// Each call takes the client current at its start and keeps it until it
/// finishes; [`ClientHandle::replace`] only affects calls started afterwards.
#[derive(Clone)]
pub struct ClientHandle {
    inner: Arc<RwLock<Arc<dyn GenerationClient>>>,
}

impl ClientHandle {
    pub fn new(client: Arc<dyn GenerationClient>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(client)),
        }
    }

    pub fn current(&self) -> Arc<dyn GenerationClient> {
        self.inner.read().clone()
    }

    pub fn replace(&self, client: Arc<dyn GenerationClient>) {
        *self.inner.write() = client;
        info!("[GEN] generation client replaced");
    }
}

/// Outcome of a batch run; every member appears in exactly one list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub succeeded: Vec<SlideId>,
    pub discarded: Vec<SlideId>,
    pub failed: Vec<(SlideId, GenerationError)>,
}

impl BatchReport {
    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.discarded.len() + self.failed.len()
    }
}

pub struct GenerationService {
    store: SlideStore,
    tracker: TaskTracker,
    client: ClientHandle,
    models: ModelConfig,
}

impl GenerationService {
    pub fn new(
        store: SlideStore,
        client: Arc<dyn GenerationClient>,
        config: &OrchestrationConfig,
    ) -> Self {
        Self {
            store,
            tracker: TaskTracker::new(config.timing.status_grace(), config.timing.batch_settle()),
            client: ClientHandle::new(client),
            models: config.models.clone(),
        }
    }

    pub fn store(&self) -> &SlideStore {
        &self.store
    }

    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    pub fn client(&self) -> &ClientHandle {
        &self.client
    }

    /// Swap the backend client, e.g. after a credential change.
    pub fn reconfigure_client(&self, client: Arc<dyn GenerationClient>) {
        self.client.replace(client);
    }

    /// Run one generation task for one slide.
    pub async fn run(
        &self,
        id: SlideId,
        request: GenerationRequest,
    ) -> Result<Reconciled, GenerationError> {
        let slide = match self.store.get(&id) {
            Ok(slide) => slide,
            Err(NotFound(_)) => {
                info!(slide_id = %id, op = request.label(), "[GEN] slide not in store, nothing to generate");
                return Ok(Reconciled::Discarded);
            }
        };

        let ticket = self.tracker.start(id, request.kind());
        info!(slide_id = %id, op = request.label(), "[GEN] task started");

        let result = self.execute(slide, &request).await;

        match &result {
            Ok(reconciled) => {
                info!(slide_id = %id, op = request.label(), ?reconciled, "[GEN] task succeeded");
                self.tracker.complete(ticket, TaskOutcome::Succeeded);
            }
            Err(e) => {
                error!(slide_id = %id, op = request.label(), error = %e, "[GEN][ERROR] task failed");
                self.tracker
                    .complete(ticket, TaskOutcome::Failed(e.to_string()));
            }
        }
        result
    }

    /// Run `request` for every slide in `ids` concurrently and wait for all of them.
    pub async fn run_batch(&self, ids: &[SlideId], request: GenerationRequest) -> BatchReport {
        let batch_id = self.tracker.begin_batch(request.kind(), ids);

        let runs = ids.iter().map(|id| self.run(*id, request.clone()));
        let results = join_all(runs).await;

        let mut report = BatchReport {
            batch_id,
            succeeded: Vec::new(),
            discarded: Vec::new(),
            failed: Vec::new(),
        };
        for (id, result) in ids.iter().zip(results) {
            match result {
                Ok(Reconciled::Applied) => report.succeeded.push(*id),
                Ok(Reconciled::Discarded) => report.discarded.push(*id),
                Err(e) => report.failed.push((*id, e)),
            }
        }

        info!(
            batch_id = %batch_id,
            op = request.label(),
            succeeded = report.succeeded.len(),
            discarded = report.discarded.len(),
            failed = report.failed.len(),
            "[BATCH] settled"
        );
        self.tracker.finish_batch(batch_id);
        report
    }

    async fn execute(
        &self,
        slide: SlideRecord,
        request: &GenerationRequest,
    ) -> Result<Reconciled, GenerationError> {
        let id = slide.id;
        let settings = self.store.settings();

        match request {
            GenerationRequest::Text => {
                let prompt = text_prompt(&slide)?;
                let generated = self.text(&prompt).await?;
                Ok(self.apply_content(id, generated))
            }
            GenerationRequest::Refine { instruction } => {
                let prompt = refine_prompt(&slide.content, instruction);
                let generated = self.text(&prompt).await?;
                Ok(self.apply_content(id, generated))
            }
            GenerationRequest::Image => {
                let prompt = slide
                    .generation_prompt
                    .as_deref()
                    .filter(|p| !p.trim().is_empty())
                    .ok_or(GenerationError::MissingPrompt(id))?;
                let client = self.client.current();
                let ratio = settings.aspect_ratio;
                let image = self
                    .image(|model| {
                        let client = client.clone();
                        let prompt = prompt.to_string();
                        async move { client.generate_image(&prompt, ratio, &model).await }
                    })
                    .await?;
                Ok(self.apply_visual(id, image))
            }
            GenerationRequest::EditImage { instruction } => {
                let asset = slide.visual_asset.ok_or(GenerationError::MissingImage(id))?;
                let image = self.edit(asset, instruction.clone(), settings.aspect_ratio).await?;
                Ok(self.apply_visual(id, image))
            }
            GenerationRequest::Stylize => {
                let style = settings
                    .style
                    .as_deref()
                    .filter(|s| !s.trim().is_empty())
                    .ok_or(GenerationError::MissingStyle)?;
                let asset = slide.visual_asset.ok_or(GenerationError::MissingImage(id))?;
                let instruction = stylize_instruction(style);
                let image = self.edit(asset, instruction, settings.aspect_ratio).await?;
                Ok(self.apply_visual(id, image))
            }
        }
    }

    async fn text(&self, prompt: &str) -> Result<GeneratedText, RequestError> {
        if self.models.text_tiers.is_empty() {
            return Err(RequestError::unconfigured("text generation"));
        }
        let client = self.client.current();
        run_with_fallback(FallbackPolicy::Unconditional, &self.models.text_tiers, |model| {
            let client = client.clone();
            let prompt = prompt.to_string();
            async move { client.generate_text(&prompt, &model).await }
        })
        .await
    }

    async fn image<F, Fut>(&self, attempt: F) -> Result<GeneratedImage, RequestError>
    where
        F: FnMut(String) -> Fut,
        Fut: std::future::Future<Output = Result<GeneratedImage, RequestError>>,
    {
        if self.models.image_tiers.is_empty() {
            return Err(RequestError::unconfigured("image generation"));
        }
        run_with_fallback(FallbackPolicy::PermissionGated, &self.models.image_tiers, attempt).await
    }

    async fn edit(
        &self,
        asset: VisualAsset,
        instruction: String,
        ratio: crate::contract::AspectRatio,
    ) -> Result<GeneratedImage, RequestError> {
        let client = self.client.current();
        let asset = Arc::new(asset);
        self.image(|model| {
            let client = client.clone();
            let asset = asset.clone();
            let instruction = instruction.clone();
            async move { client.edit_image(&asset, &instruction, ratio, &model).await }
        })
        .await
    }

    fn apply_content(&self, id: SlideId, generated: GeneratedText) -> Reconciled {
        let text = generated.text.trim().to_string();
        self.reconcile(id, &generated.model, move |slide| SlideRecord {
            content: text,
            ..slide.clone()
        })
    }

    fn apply_visual(&self, id: SlideId, image: GeneratedImage) -> Reconciled {
        let model = image.model.clone();
        let asset = VisualAsset::generated(image.mime_type, image.data, image.model);
        self.reconcile(id, &model, move |slide| SlideRecord {
            visual_asset: Some(asset),
            ..slide.clone()
        })
    }

    fn reconcile<F>(&self, id: SlideId, model: &str, updater: F) -> Reconciled
    where
        F: FnOnce(&SlideRecord) -> SlideRecord,
    {
        match self.store.replace(&id, updater) {
            Ok(_) => {
                info!(slide_id = %id, model = %model, "[GEN] result applied to slide");
                Reconciled::Applied
            }
            Err(NotFound(_)) => {
                info!(slide_id = %id, model = %model, "[GEN] slide was removed while generating, result discarded");
                Reconciled::Discarded
            }
        }
    }
}

fn text_prompt(slide: &SlideRecord) -> Result<String, GenerationError> {
    if let Some(prompt) = slide
        .generation_prompt
        .as_deref()
        .filter(|p| !p.trim().is_empty())
    {
        return Ok(format!(
            "Write the content of one presentation slide in markdown: a short title followed by concise bullet points.\n\nTopic: {prompt}"
        ));
    }
    if !slide.content.trim().is_empty() {
        return Ok(format!(
            "Expand the following slide draft into finished slide content in markdown, keeping its structure.\n\n{}",
            slide.content
        ));
    }
    Err(GenerationError::MissingPrompt(slide.id))
}

fn refine_prompt(content: &str, instruction: &str) -> String {
    format!(
        "Rewrite the following slide content according to the instruction. Reply with the rewritten markdown only.\n\nInstruction: {instruction}\n\nContent:\n{content}"
    )
}

fn stylize_instruction(style: &str) -> String {
    format!("Redraw this image in the following visual style, keeping its subject and composition: {style}")
}
