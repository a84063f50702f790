//! Process settings, loaded from a TOML file.
//!
//! Search order: `MODELSWEEP_CONFIG` env var, then `modelsweep.toml` in the
//! working directory. Missing file means defaults; a file that exists but
//! does not parse is an error.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// HTTP bind address for `serve`.
    pub bind: String,
    /// SQLite database path. Set to "memory" for the in-memory store.
    pub db_path: String,
    /// Directory holding saved sweep configs.
    pub config_dir: String,
    /// Optional model catalog file; the built-in catalog is used when unset.
    pub catalog_path: Option<String>,
    /// Base URL of the inference service cases are executed against.
    pub inference_url: String,
    pub dispatcher: DispatcherSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherSettings {
    /// "workflow" or "tasks".
    pub kind: String,
    /// Base URL of the dispatch backend.
    pub base_url: String,
    /// Workflow name or queue name, depending on `kind`.
    pub name: String,
    /// Public URL of this service's worker API, for task callbacks.
    pub worker_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            db_path: "modelsweep.db".to_string(),
            config_dir: "sweep_configs".to_string(),
            catalog_path: None,
            inference_url: "http://127.0.0.1:5000".to_string(),
            dispatcher: DispatcherSettings::default(),
        }
    }
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            kind: "workflow".to_string(),
            base_url: "http://127.0.0.1:9090".to_string(),
            name: "modelsweep".to_string(),
            worker_url: "http://127.0.0.1:8080".to_string(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings: {}", path.display()))?;
        let settings: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse settings: {}", path.display()))?;
        Ok(settings)
    }

    /// Resolve settings from the environment, falling back to defaults when
    /// no file is present.
    pub fn load_or_default() -> Result<Self> {
        if let Ok(path) = std::env::var("MODELSWEEP_CONFIG") {
            return Self::load(Path::new(&path));
        }
        let default_path = Path::new("modelsweep.toml");
        if default_path.exists() {
            return Self::load(default_path);
        }
        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.bind, "127.0.0.1:8080");
        assert_eq!(settings.dispatcher.kind, "workflow");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            bind = "0.0.0.0:9000"

            [dispatcher]
            kind = "tasks"
            name = "sweep-queue"
            "#,
        )
        .unwrap();
        assert_eq!(settings.bind, "0.0.0.0:9000");
        assert_eq!(settings.db_path, "modelsweep.db");
        assert_eq!(settings.dispatcher.kind, "tasks");
        assert_eq!(settings.dispatcher.name, "sweep-queue");
        assert_eq!(settings.dispatcher.base_url, "http://127.0.0.1:9090");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "inference_url = \"http://inference:5000\"\n").unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.inference_url, "http://inference:5000");

        assert!(Settings::load(&dir.path().join("missing.toml")).is_err());
    }
}
