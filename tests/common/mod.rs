#![allow(dead_code)]

//! Scripted collaborators with controllable latency for integration tests.

use async_trait::async_trait;
use deckgen::contract::{
    AspectRatio, AssetKey, AssetLoad, GeneratedImage, GeneratedText, GenerationClient, Raster,
    Renderer, SnapshotSpec,
};
use deckgen::contract::DownloadSink;
use deckgen::error::{CaptureError, ExportError, RequestError};
use deckgen::slide::{SlideId, VisualAsset};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Image(Vec<u8>),
    Fail(RequestError),
}

#[derive(Debug, Clone)]
struct Rule {
    prompt_contains: Option<String>,
    model: Option<String>,
    delay: Duration,
    reply: Reply,
    once: bool,
}

/// Generation client answering from a list of rules.
///
/// The first rule matching the call's prompt (or edit instruction) and model
/// wins; `once` rules are consumed by their first match.
#[derive(Default)]
pub struct ScriptedClient {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_any(self, delay_ms: u64, reply: Reply) -> Self {
        self.push(None, None, delay_ms, reply, false)
    }

    pub fn on_prompt(self, needle: &str, delay_ms: u64, reply: Reply) -> Self {
        self.push(Some(needle), None, delay_ms, reply, false)
    }

    pub fn on_model(self, model: &str, delay_ms: u64, reply: Reply) -> Self {
        self.push(None, Some(model), delay_ms, reply, false)
    }

    pub fn once(self, delay_ms: u64, reply: Reply) -> Self {
        self.push(None, None, delay_ms, reply, true)
    }

    fn push(
        self,
        needle: Option<&str>,
        model: Option<&str>,
        delay_ms: u64,
        reply: Reply,
        once: bool,
    ) -> Self {
        self.rules.lock().push(Rule {
            prompt_contains: needle.map(str::to_string),
            model: model.map(str::to_string),
            delay: Duration::from_millis(delay_ms),
            reply,
            once,
        });
        self
    }

    /// Models called so far, in call order.
    pub fn models_called(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(m, _)| m.clone()).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    async fn answer(&self, prompt: &str, model: &str) -> Reply {
        let (delay, reply) = {
            self.calls.lock().push((model.to_string(), prompt.to_string()));
            let mut rules = self.rules.lock();
            let index = rules
                .iter()
                .position(|r| {
                    r.prompt_contains.as_deref().map_or(true, |n| prompt.contains(n))
                        && r.model.as_deref().map_or(true, |m| m == model)
                })
                .unwrap_or_else(|| panic!("no scripted reply for model {model}, prompt {prompt:?}"));
            let rule = if rules[index].once {
                rules.remove(index)
            } else {
                rules[index].clone()
            };
            (rule.delay, rule.reply)
        };
        tokio::time::sleep(delay).await;
        reply
    }

    async fn image_reply(&self, prompt: &str, model: &str) -> Result<GeneratedImage, RequestError> {
        match self.answer(prompt, model).await {
            Reply::Image(data) => Ok(GeneratedImage {
                mime_type: "image/png".into(),
                data,
                model: model.to_string(),
            }),
            Reply::Fail(e) => Err(e),
            Reply::Text(_) => panic!("text reply scripted for an image call"),
        }
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn generate_text(&self, prompt: &str, model: &str) -> Result<GeneratedText, RequestError> {
        match self.answer(prompt, model).await {
            Reply::Text(text) => Ok(GeneratedText {
                text,
                model: model.to_string(),
            }),
            Reply::Fail(e) => Err(e),
            Reply::Image(_) => panic!("image reply scripted for a text call"),
        }
    }

    async fn generate_image(
        &self,
        prompt: &str,
        _aspect_ratio: AspectRatio,
        model: &str,
    ) -> Result<GeneratedImage, RequestError> {
        self.image_reply(prompt, model).await
    }

    async fn edit_image(
        &self,
        _asset: &VisualAsset,
        instruction: &str,
        _aspect_ratio: AspectRatio,
        model: &str,
    ) -> Result<GeneratedImage, RequestError> {
        self.image_reply(instruction, model).await
    }
}

/// Renderer whose snapshots encode the active slide id, with per-slide
/// latency, failures and assets that never settle.
#[derive(Default)]
pub struct FakeRenderer {
    active: Mutex<Option<SlideId>>,
    latency: HashMap<SlideId, Duration>,
    failing: HashSet<SlideId>,
    stuck_assets: HashSet<SlideId>,
    activations: Mutex<Vec<SlideId>>,
}

impl FakeRenderer {
    pub fn new(active: Option<SlideId>) -> Self {
        Self {
            active: Mutex::new(active),
            ..Self::default()
        }
    }

    pub fn with_latency(mut self, id: SlideId, ms: u64) -> Self {
        self.latency.insert(id, Duration::from_millis(ms));
        self
    }

    pub fn failing(mut self, id: SlideId) -> Self {
        self.failing.insert(id);
        self
    }

    pub fn with_stuck_asset(mut self, id: SlideId) -> Self {
        self.stuck_assets.insert(id);
        self
    }

    pub fn activations(&self) -> Vec<SlideId> {
        self.activations.lock().clone()
    }
}

/// Bytes [`FakeRenderer`] puts in the snapshot of `id`.
pub fn raster_bytes(id: &SlideId) -> Vec<u8> {
    id.as_uuid().as_bytes().to_vec()
}

#[async_trait]
impl Renderer for FakeRenderer {
    fn active_slide(&self) -> Option<SlideId> {
        *self.active.lock()
    }

    async fn set_active_slide(&self, id: &SlideId) {
        *self.active.lock() = Some(*id);
        self.activations.lock().push(*id);
    }

    fn visible_assets(&self) -> Vec<AssetKey> {
        match self.active_slide() {
            Some(id) if self.stuck_assets.contains(&id) => {
                vec![AssetKey("loaded".into()), AssetKey("stuck".into())]
            }
            Some(_) => vec![AssetKey("loaded".into())],
            None => Vec::new(),
        }
    }

    async fn await_asset(&self, asset: &AssetKey) -> AssetLoad {
        if asset.0 == "stuck" {
            futures::future::pending::<()>().await;
        }
        AssetLoad::Loaded
    }

    async fn snapshot(&self, spec: &SnapshotSpec) -> Result<Raster, CaptureError> {
        let id = self.active_slide().ok_or(CaptureError::NoActiveSlide)?;
        if let Some(latency) = self.latency.get(&id) {
            tokio::time::sleep(*latency).await;
        }
        if self.failing.contains(&id) {
            return Err(CaptureError::Renderer(format!("slide {id} failed to render")));
        }
        Ok(Raster {
            width: spec.width,
            height: spec.height,
            png: raster_bytes(&id),
        })
    }
}

/// Download sink keeping every delivered file in memory.
#[derive(Default)]
pub struct RecordingSink {
    files: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingSink {
    pub fn files(&self) -> Vec<(String, Vec<u8>)> {
        self.files.lock().clone()
    }
}

#[async_trait]
impl DownloadSink for RecordingSink {
    async fn deliver(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, ExportError> {
        self.files.lock().push((file_name.to_string(), bytes.to_vec()));
        Ok(PathBuf::from(file_name))
    }
}

/// Entry names and contents of a zip archive, in archive order.
pub fn unzip(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    use std::io::Read;
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).expect("valid zip");
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).expect("entry");
            let mut content = Vec::new();
            file.read_to_end(&mut content).expect("read entry");
            (file.name().to_string(), content)
        })
        .collect()
}
