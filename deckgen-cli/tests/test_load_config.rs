use deckgen::contract::Color;
use deckgen_cli::load_config::{load_config, DEFAULT_BASE_URL};
use serial_test::serial;
use std::env;
use std::fs::write;
use std::time::Duration;
use tempfile::NamedTempFile;

#[test]
#[serial]
fn partial_yaml_keeps_defaults_and_reads_api_key_from_env() {
    let config_yaml = r##"
models:
  image_tiers: ["custom-image-pro", "custom-image-flash"]
timing:
  batch_settle_ms: 1500
capture:
  background: "#000000"
"##;
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), config_yaml).unwrap();
    env::set_var("GEMINI_API_KEY", "test-key");

    let config = load_config(config_file.path()).expect("Config should load");

    assert_eq!(config.api_key.as_deref(), Some("test-key"));
    assert_eq!(config.backend.base_url, DEFAULT_BASE_URL);
    let orchestration = &config.orchestration;
    assert_eq!(
        orchestration.models.image_tiers,
        vec!["custom-image-pro", "custom-image-flash"]
    );
    assert_eq!(orchestration.models.text_tiers.len(), 3);
    assert_eq!(orchestration.timing.batch_settle(), Duration::from_millis(1_500));
    assert_eq!(orchestration.timing.status_grace(), Duration::from_secs(3));
    assert_eq!(orchestration.capture.background, "#000000".parse::<Color>().unwrap());
    assert_eq!(orchestration.capture.width, 1920);

    env::remove_var("GEMINI_API_KEY");
}

#[test]
#[serial]
fn empty_file_and_empty_key_are_accepted() {
    let config_file = NamedTempFile::new().expect("temp file");
    env::set_var("GEMINI_API_KEY", "   ");

    let config = load_config(config_file.path()).expect("Empty config should load");

    assert!(config.api_key.is_none());
    assert!(config.require_api_key().is_err());
    assert_eq!(config.orchestration, deckgen::OrchestrationConfig::default());

    env::remove_var("GEMINI_API_KEY");
}

#[test]
#[serial]
fn invalid_yaml_reports_the_path() {
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), "timing: [not, a, map]").unwrap();

    let err = load_config(config_file.path()).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("Failed to parse config YAML"), "{message}");
}

#[test]
#[serial]
fn missing_file_is_an_error() {
    let err = load_config("/definitely/not/here.yaml").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}
