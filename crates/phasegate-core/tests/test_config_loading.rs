//! Integration tests for configuration loading.

use phasegate_core::{PhasegateConfig, PhasegateError, WorkflowType};
use std::fs;
use tempfile::TempDir;

fn write_config(temp_dir: &TempDir, content: &str) {
    let dir = temp_dir.path().join(".phasegate");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("config.toml"), content).unwrap();
}

#[test]
fn test_config_load_defaults_when_missing() {
    let temp_dir = TempDir::new().unwrap();

    let config = PhasegateConfig::load(temp_dir.path().to_path_buf()).unwrap();

    assert_eq!(config.root, temp_dir.path().to_path_buf());
    assert_eq!(config.data_dir, temp_dir.path().join(".phasegate/entities"));
    assert!(!config.capa.include_preventive_action);
    assert_eq!(config.notices.templates_dir, None);
    assert_eq!(config.engine.default_actor, "system");
}

#[test]
fn test_config_load_from_file() {
    let temp_dir = TempDir::new().unwrap();
    write_config(
        &temp_dir,
        r#"
[capa]
include_preventive_action = true

[notices]
templates_dir = "/etc/phasegate/templates"

[engine]
default_actor = "qa-bot"
"#,
    );

    let config = PhasegateConfig::load(temp_dir.path().to_path_buf()).unwrap();

    assert!(config.capa.include_preventive_action);
    assert_eq!(config.capa_workflow_type(), WorkflowType::CapaPreventive);
    assert_eq!(
        config.notices.templates_dir.as_deref(),
        Some(std::path::Path::new("/etc/phasegate/templates"))
    );
    assert_eq!(config.engine.default_actor, "qa-bot");
}

#[test]
fn test_config_partial_overrides() {
    let temp_dir = TempDir::new().unwrap();
    write_config(&temp_dir, "[engine]\ndefault_actor = \"alice\"\n");

    let config = PhasegateConfig::load(temp_dir.path().to_path_buf()).unwrap();

    assert_eq!(config.engine.default_actor, "alice");
    assert!(!config.capa.include_preventive_action);
}

#[test]
fn test_config_invalid_toml_fails() {
    let temp_dir = TempDir::new().unwrap();
    write_config(&temp_dir, "invalid { toml");

    let result = PhasegateConfig::load(temp_dir.path().to_path_buf());
    assert!(matches!(result, Err(PhasegateError::ConfigParseError(_))));
}

#[test]
fn test_config_unknown_key_fails() {
    let temp_dir = TempDir::new().unwrap();
    write_config(&temp_dir, "[capa]\nphases = 7\n");

    let result = PhasegateConfig::load(temp_dir.path().to_path_buf());
    assert!(matches!(result, Err(PhasegateError::ConfigParseError(_))));
}

#[test]
fn test_written_default_round_trips() {
    let temp_dir = TempDir::new().unwrap();
    let config = PhasegateConfig::new(temp_dir.path().to_path_buf());
    config.write_default().unwrap();

    let loaded = PhasegateConfig::load(temp_dir.path().to_path_buf()).unwrap();
    assert_eq!(loaded, config);
}
