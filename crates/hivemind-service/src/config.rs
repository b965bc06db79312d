//! Configuration discovery and the template merge.
//!
//! `hivemind.config.json` is looked up in the working directory, then
//! next to the executable. A standalone `hivemind.template.json` beside
//! the config merges into the template list by id and, when the
//! configured active template is still the default, becomes active.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use hivemind_error::FatalError;
use hivemind_template::{Template, TemplateRegistry, TemplateSource};

pub const CONFIG_FILE: &str = "hivemind.config.json";
pub const TEMPLATE_FILE: &str = "hivemind.template.json";
pub const DEFAULT_TEMPLATE: &str = "worldbuilding";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub vault: VaultConfig,
    #[serde(default)]
    pub template: TemplateConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultConfig {
    pub path: PathBuf,
    #[serde(default = "default_true")]
    pub watch_for_changes: bool,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Extra exclusion globs on top of the built-in set.
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateConfig {
    #[serde(default = "default_template")]
    pub active_template: String,
    /// Inline user templates, full definitions.
    #[serde(default)]
    pub templates: Vec<Template>,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            active_template: DEFAULT_TEMPLATE.to_string(),
            templates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexingStrategy {
    Full,
    Incremental,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexingConfig {
    #[serde(default = "default_strategy")]
    pub strategy: IndexingStrategy,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_true")]
    pub enable_full_text_search: bool,
    #[serde(default)]
    pub enable_vector_search: bool,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            strategy: IndexingStrategy::Incremental,
            batch_size: default_batch_size(),
            enable_full_text_search: true,
            enable_vector_search: false,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_debounce_ms() -> u64 {
    100
}
fn default_template() -> String {
    DEFAULT_TEMPLATE.to_string()
}
fn default_strategy() -> IndexingStrategy {
    IndexingStrategy::Incremental
}
fn default_batch_size() -> usize {
    100
}

impl Config {
    /// A minimal config for a vault path, used when no file is found and
    /// the caller supplied the path directly.
    pub fn for_vault(path: impl Into<PathBuf>) -> Self {
        Self {
            vault: VaultConfig {
                path: path.into(),
                watch_for_changes: true,
                debounce_ms: default_debounce_ms(),
                exclude: Vec::new(),
            },
            template: TemplateConfig::default(),
            indexing: IndexingConfig::default(),
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self, FatalError> {
        let text = std::fs::read_to_string(path).map_err(|e| FatalError::Config {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        serde_json::from_str(&text).map_err(|e| FatalError::Config {
            message: format!("malformed {}: {e}", path.display()),
        })
    }

    /// Search the working directory, then the executable directory.
    /// Returns the config and the directory it was found in.
    pub fn discover() -> Result<(Self, PathBuf), FatalError> {
        let mut candidates = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            candidates.push(cwd);
        }
        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
        {
            candidates.push(exe_dir);
        }
        for dir in candidates {
            let path = dir.join(CONFIG_FILE);
            if path.is_file() {
                let config = Self::load_from_path(&path)?;
                info!("loaded config from {}", path.display());
                return Ok((config, dir));
            }
        }
        Err(FatalError::Config {
            message: format!("no {CONFIG_FILE} found in the working or executable directory"),
        })
    }

    /// Load the standalone template file next to the config, if present.
    pub fn standalone_template(config_dir: &Path) -> Result<Option<Template>, FatalError> {
        let path = config_dir.join(TEMPLATE_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path).map_err(|e| FatalError::Config {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        let template = serde_json::from_str(&text).map_err(|e| FatalError::Config {
            message: format!("malformed {}: {e}", path.display()),
        })?;
        Ok(Some(template))
    }
}

/// Build the registry: built-in catalog, inline templates, standalone
/// override, then activation.
pub fn build_registry(
    config: &Config,
    standalone: Option<Template>,
) -> Result<TemplateRegistry, hivemind_error::Error> {
    let mut registry = TemplateRegistry::new();
    registry.register(
        hivemind_template::worldbuilding_template(),
        TemplateSource::Builtin,
    )?;

    for template in &config.template.templates {
        registry.register_override(template.clone(), TemplateSource::Inline)?;
    }

    let mut active = config.template.active_template.clone();
    if let Some(template) = standalone {
        let standalone_id = template.id.clone();
        registry.register_override(template, TemplateSource::File(PathBuf::from(TEMPLATE_FILE)))?;
        if active == DEFAULT_TEMPLATE {
            active = standalone_id;
        }
    }

    if !registry.is_registered(&active) {
        return Err(FatalError::Config {
            message: format!("active template '{active}' is not registered"),
        }
        .into());
    }
    registry.activate(&active)?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_sections() {
        let config: Config =
            serde_json::from_str(r#"{ "vault": { "path": "/tmp/vault" } }"#).unwrap();
        assert!(config.vault.watch_for_changes);
        assert_eq!(config.vault.debounce_ms, 100);
        assert_eq!(config.template.active_template, "worldbuilding");
        assert_eq!(config.indexing.batch_size, 100);
        assert_eq!(config.indexing.strategy, IndexingStrategy::Incremental);
        assert!(config.indexing.enable_full_text_search);
        assert!(!config.indexing.enable_vector_search);
    }

    #[test]
    fn missing_vault_path_is_a_config_error() {
        let err = serde_json::from_str::<Config>(r#"{ "vault": {} }"#);
        assert!(err.is_err());
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            Config::load_from_path(&path),
            Err(FatalError::Config { .. })
        ));
    }

    #[test]
    fn standalone_template_merges_and_becomes_active() {
        let config = Config::for_vault("/tmp/vault");
        let standalone: Template = serde_json::from_value(serde_json::json!({
            "id": "notebook",
            "name": "Notebook",
            "version": "1.0.0",
            "entityTypes": [
                { "name": "note", "fields": [{ "name": "name", "type": "string", "required": true }] }
            ],
            "relationshipTypes": []
        }))
        .unwrap();

        let registry = build_registry(&config, Some(standalone)).unwrap();
        assert_eq!(registry.active_template().unwrap().id, "notebook");
        // The builtin stays registered alongside.
        assert!(registry.is_registered("worldbuilding"));
    }

    #[test]
    fn explicit_active_template_wins_over_standalone() {
        let mut config = Config::for_vault("/tmp/vault");
        // A non-default active template pins activation even when a
        // standalone template file is present.
        config.template.active_template = "custom".to_string();
        config.template.templates = vec![serde_json::from_value(serde_json::json!({
            "id": "custom",
            "name": "Custom",
            "version": "0.1.0",
            "entityTypes": [{ "name": "widget", "fields": [] }],
            "relationshipTypes": []
        }))
        .unwrap()];

        let standalone: Template = serde_json::from_value(serde_json::json!({
            "id": "notebook",
            "name": "Notebook",
            "version": "1.0.0",
            "entityTypes": [{ "name": "note", "fields": [] }],
            "relationshipTypes": []
        }))
        .unwrap();

        let registry = build_registry(&config, Some(standalone)).unwrap();
        assert_eq!(registry.active_template().unwrap().id, "custom");
    }

    #[test]
    fn unknown_active_template_fails() {
        let mut config = Config::for_vault("/tmp/vault");
        config.template.active_template = "nope".to_string();
        assert!(build_registry(&config, None).is_err());
    }
}
