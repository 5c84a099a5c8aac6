//! Configuration for phasegate.
//!
//! Settings live in `<root>/.phasegate/config.toml`. Every key is optional;
//! missing keys keep their defaults and paths are always derived from the
//! root directory.

use crate::catalog::{CatalogRegistry, WorkflowType};
use crate::error::{PhasegateError, Result};
use anyhow::Context;
use serde::Deserialize;
use std::path::PathBuf;

/// Name of the per-project directory.
pub const PHASEGATE_DIR: &str = ".phasegate";

/// Main phasegate configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhasegateConfig {
    /// Project root directory (the one holding `.phasegate`).
    pub root: PathBuf,

    /// Path to the configuration file (`.phasegate/config.toml`).
    pub config_file: PathBuf,

    /// Directory holding one TOML file per entity.
    pub data_dir: PathBuf,

    /// CAPA workflow settings.
    pub capa: CapaConfig,

    /// Notice rendering settings.
    pub notices: NoticeConfig,

    /// Engine defaults.
    pub engine: EngineConfig,
}

/// CAPA workflow settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapaConfig {
    /// Whether new CAPA records get the five-phase catalog with a separate
    /// Preventive Action phase.
    pub include_preventive_action: bool,
}

/// Notice rendering settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoticeConfig {
    /// Directory with user templates; built-in templates are used when unset.
    /// Relative paths are resolved against the root.
    pub templates_dir: Option<PathBuf>,
}

/// Engine defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// User recorded when a command does not name one.
    pub default_actor: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_actor: "system".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    capa: CapaSection,
    #[serde(default)]
    notices: NoticesSection,
    #[serde(default)]
    engine: EngineSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CapaSection {
    include_preventive_action: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct NoticesSection {
    templates_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct EngineSection {
    default_actor: Option<String>,
}

impl PhasegateConfig {
    /// Creates a configuration with defaults, deriving paths from `root`.
    pub fn new(root: PathBuf) -> Self {
        let dir = root.join(PHASEGATE_DIR);
        Self {
            config_file: dir.join("config.toml"),
            data_dir: dir.join("entities"),
            root,
            capa: CapaConfig::default(),
            notices: NoticeConfig::default(),
            engine: EngineConfig::default(),
        }
    }

    /// Loads `<root>/.phasegate/config.toml`, falling back to defaults when
    /// the file does not exist.
    ///
    /// # Errors
    ///
    /// - `PhasegateError::FileReadError` if the file exists but cannot be read
    /// - `PhasegateError::ConfigParseError` if the TOML is invalid
    /// - `PhasegateError::InvalidConfig` if a value is out of range
    pub fn load(root: PathBuf) -> Result<Self> {
        let mut config = Self::new(root);
        if !config.config_file.is_file() {
            tracing::debug!(path = %config.config_file.display(), "no config file, using defaults");
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config.config_file).map_err(|e| {
            PhasegateError::FileReadError(format!("{}: {e}", config.config_file.display()))
        })?;
        let file: ConfigFile = toml::from_str(&content).map_err(|e| {
            PhasegateError::ConfigParseError(format!("{}: {e}", config.config_file.display()))
        })?;
        config.apply(file)?;
        Ok(config)
    }

    fn apply(&mut self, file: ConfigFile) -> Result<()> {
        if let Some(include) = file.capa.include_preventive_action {
            self.capa.include_preventive_action = include;
        }
        if let Some(dir) = file.notices.templates_dir {
            self.notices.templates_dir = Some(if dir.is_absolute() {
                dir
            } else {
                self.root.join(dir)
            });
        }
        if let Some(actor) = file.engine.default_actor {
            if actor.trim().is_empty() {
                return Err(PhasegateError::InvalidConfig(
                    "engine.default_actor must not be empty".to_string(),
                ));
            }
            self.engine.default_actor = actor;
        }
        Ok(())
    }

    /// Workflow type created for "capa" records.
    pub fn capa_workflow_type(&self) -> WorkflowType {
        if self.capa.include_preventive_action {
            WorkflowType::CapaPreventive
        } else {
            WorkflowType::Capa
        }
    }

    /// Resolves a user-facing workflow name, mapping "capa" through
    /// [`capa_workflow_type`](Self::capa_workflow_type).
    ///
    /// # Errors
    ///
    /// Returns `PhasegateError::UnknownWorkflowType` for unknown names.
    pub fn resolve_workflow_type(&self, name: &str) -> Result<WorkflowType> {
        match name.parse::<WorkflowType>()? {
            WorkflowType::Capa => Ok(self.capa_workflow_type()),
            other => Ok(other),
        }
    }

    /// Catalog registry with the built-in catalogs.
    pub fn catalog_registry(&self) -> CatalogRegistry {
        CatalogRegistry::builtin()
    }

    /// Content written by `phasegate init`.
    pub fn render_default() -> String {
        let defaults = EngineConfig::default();
        format!(
            r#"# phasegate configuration

[capa]
# Use the five-phase CAPA catalog with a separate Preventive Action phase.
include_preventive_action = false

[notices]
# Directory with transition.j2, gate_review.j2 and progress.j2 overrides.
# templates_dir = "templates"

[engine]
# User recorded when a command does not name one.
default_actor = "{}"
"#,
            defaults.default_actor
        )
    }

    /// Writes the default configuration file, creating `.phasegate/`.
    ///
    /// # Errors
    ///
    /// Returns `PhasegateError::Anyhow` with context if the directory or file
    /// cannot be written.
    pub fn write_default(&self) -> Result<()> {
        if let Some(parent) = self.config_file.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(&self.config_file, Self::render_default())
            .with_context(|| format!("failed to write {}", self.config_file.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_derived_from_root() {
        let config = PhasegateConfig::new(PathBuf::from("/proj"));
        assert_eq!(config.config_file, PathBuf::from("/proj/.phasegate/config.toml"));
        assert_eq!(config.data_dir, PathBuf::from("/proj/.phasegate/entities"));
        assert_eq!(config.engine.default_actor, "system");
        assert_eq!(config.capa_workflow_type(), WorkflowType::Capa);
    }

    #[test]
    fn test_render_default_parses_to_defaults() {
        let file: ConfigFile = toml::from_str(&PhasegateConfig::render_default()).unwrap();
        let mut config = PhasegateConfig::new(PathBuf::from("/proj"));
        config.apply(file).unwrap();
        assert_eq!(config, PhasegateConfig::new(PathBuf::from("/proj")));
    }

    #[test]
    fn test_resolve_workflow_type_follows_capa_setting() {
        let mut config = PhasegateConfig::new(PathBuf::from("/proj"));
        assert_eq!(config.resolve_workflow_type("capa").unwrap(), WorkflowType::Capa);

        config.capa.include_preventive_action = true;
        assert_eq!(
            config.resolve_workflow_type("capa").unwrap(),
            WorkflowType::CapaPreventive
        );
        assert_eq!(
            config.resolve_workflow_type("design-control").unwrap(),
            WorkflowType::DesignControl
        );
        assert!(matches!(
            config.resolve_workflow_type("audit"),
            Err(PhasegateError::UnknownWorkflowType(_))
        ));
    }

    #[test]
    fn test_relative_templates_dir_resolved_against_root() {
        let file: ConfigFile = toml::from_str("[notices]\ntemplates_dir = \"tpl\"").unwrap();
        let mut config = PhasegateConfig::new(PathBuf::from("/proj"));
        config.apply(file).unwrap();
        assert_eq!(config.notices.templates_dir, Some(PathBuf::from("/proj/tpl")));
    }

    #[test]
    fn test_empty_default_actor_rejected() {
        let file: ConfigFile = toml::from_str("[engine]\ndefault_actor = \" \"").unwrap();
        let mut config = PhasegateConfig::new(PathBuf::from("/proj"));
        assert!(matches!(config.apply(file), Err(PhasegateError::InvalidConfig(_))));
    }
}
