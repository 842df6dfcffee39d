/// `load_config` module: reads the static YAML config and injects the backend secret from the environment.
///
/// This is the only place where user-supplied YAML is parsed. Every section is
/// optional and falls back to the orchestration defaults, so an empty file is a
/// valid config.
///
/// # Environment
/// - `GEMINI_API_KEY`: API key for the generation backend. Only `generate`
///   needs it; an empty value counts as unset.
///
/// # Errors
/// All errors use `anyhow::Error` with the config path in the message.
use anyhow::Result;
use deckgen::config::{CaptureConfig, ModelConfig, TimingConfig};
use deckgen::OrchestrationConfig;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use tracing::{error, info};

pub const API_KEY_VAR: &str = "GEMINI_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub orchestration: OrchestrationConfig,
    pub backend: BackendSection,
    pub api_key: Option<String>,
}

impl CliConfig {
    /// The API key, or an error explaining how to provide one.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            anyhow::anyhow!("{API_KEY_VAR} is not set; export it or add it to a .env file")
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BackendSection {
    pub base_url: String,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    backend: BackendSection,
    models: ModelConfig,
    timing: TimingConfig,
    capture: CaptureConfig,
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = fs::read_to_string(path_ref).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
        anyhow::anyhow!("Failed to read config file {:?}: {}", path_ref, e)
    })?;

    let raw: RawConfig = if config_content.trim().is_empty() {
        RawConfig::default()
    } else {
        serde_yaml::from_str(&config_content).map_err(|e| {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            anyhow::anyhow!("Failed to parse config YAML {:?}: {e}", path_ref)
        })?
    };

    let api_key = env::var(API_KEY_VAR).ok().filter(|k| !k.trim().is_empty());
    info!(
        config_path = ?path_ref,
        api_key_set = api_key.is_some(),
        base_url = %raw.backend.base_url,
        "Parsed config YAML successfully"
    );

    let orchestration = OrchestrationConfig {
        models: raw.models,
        timing: raw.timing,
        capture: raw.capture,
    };
    orchestration.trace_loaded();

    Ok(CliConfig {
        orchestration,
        backend: raw.backend,
        api_key,
    })
}
