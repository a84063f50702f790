//! Sweep configuration -- declarative campaign specs and the model catalog.

pub mod catalog;

pub use self::catalog::{ModelCatalog, ModelSpec};

use crate::error::Error;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A declarative test campaign: which models, user modes, think options and
/// questions to sweep, and how to pace the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub models: Vec<String>,
    #[serde(default = "default_user_types")]
    pub user_types: Vec<String>,
    #[serde(default = "default_think_modes")]
    pub think_mode_options: Vec<bool>,
    pub questions: Vec<String>,
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Inter-case delay in seconds. Zero disables pacing.
    #[serde(default = "default_delay")]
    pub delay_between_cases_secs: f64,
    /// Per-case timeout for the remote inference call.
    #[serde(default = "default_timeout")]
    pub case_timeout_secs: u64,
    /// Cap the number of questions used per combination (large sweeps sample
    /// down instead of running every question).
    #[serde(default)]
    pub questions_per_combination: Option<usize>,
    /// Shuffle the expanded case list. Deterministic when `seed` is set.
    #[serde(default)]
    pub shuffle: bool,
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_user_types() -> Vec<String> {
    vec!["business".to_string()]
}

fn default_think_modes() -> Vec<bool> {
    vec![false]
}

fn default_iterations() -> u32 {
    1
}

fn default_delay() -> f64 {
    5.0
}

fn default_timeout() -> u64 {
    60
}

impl SweepConfig {
    /// Reject configs that cannot produce any work.
    pub fn validate(&self) -> std::result::Result<(), Error> {
        if self.models.is_empty() {
            return Err(Error::InvalidConfiguration(
                "at least one model is required".to_string(),
            ));
        }
        if self.questions.is_empty() {
            return Err(Error::InvalidConfiguration(
                "at least one question is required".to_string(),
            ));
        }
        if self.iterations == 0 {
            return Err(Error::InvalidConfiguration(
                "iterations must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// One row in a config listing.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub filename: String,
    pub name: String,
    pub description: String,
    pub models_count: usize,
    pub questions_count: usize,
    pub iterations: u32,
}

/// Directory of JSON sweep configs, loaded by name.
#[derive(Debug, Clone)]
pub struct ConfigLibrary {
    dir: PathBuf,
}

impl ConfigLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        if name.ends_with(".json") {
            self.dir.join(name)
        } else {
            self.dir.join(format!("{}.json", name))
        }
    }

    /// Load a sweep config by name or filename.
    pub fn load(&self, name: &str) -> Result<SweepConfig> {
        let path = self.path_for(name);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read sweep config: {}", path.display()))?;
        let config: SweepConfig = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse sweep config: {}", path.display()))?;
        Ok(config)
    }

    /// Save a config as `<name>.json`, creating the directory if needed.
    pub fn save(&self, config: &SweepConfig) -> Result<String> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create config dir: {}", self.dir.display()))?;
        let filename = format!("{}.json", sanitize_name(&config.name));
        let path = self.dir.join(&filename);
        let json = serde_json::to_string_pretty(config)?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write sweep config: {}", path.display()))?;
        Ok(filename)
    }

    /// List all configs in the directory with summary rows.
    /// Unreadable files are logged and skipped.
    pub fn list(&self) -> Vec<ConfigSummary> {
        let mut summaries = Vec::new();
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(_) => return summaries,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match self.load_path(&path) {
                Ok(config) => summaries.push(ConfigSummary {
                    filename: entry.file_name().to_string_lossy().to_string(),
                    name: config.name,
                    description: config.description,
                    models_count: config.models.len(),
                    questions_count: config.questions.len(),
                    iterations: config.iterations,
                }),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable config");
                }
            }
        }

        summaries.sort_by(|a, b| a.filename.cmp(&b.filename));
        summaries
    }

    pub fn delete(&self, name: &str) -> bool {
        std::fs::remove_file(self.path_for(name)).is_ok()
    }

    fn load_path(&self, path: &Path) -> Result<SweepConfig> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> SweepConfig {
        SweepConfig {
            name: "sample".to_string(),
            description: "sample sweep".to_string(),
            models: vec!["gemini-2.5-pro".to_string()],
            user_types: vec!["business".to_string()],
            think_mode_options: vec![false],
            questions: vec!["q1".to_string()],
            iterations: 1,
            delay_between_cases_secs: 5.0,
            case_timeout_secs: 60,
            questions_per_combination: None,
            shuffle: false,
            seed: None,
        }
    }

    #[test]
    fn test_validate_rejects_empty_models() {
        let mut config = sample_config();
        config.models.clear();
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_questions() {
        let mut config = sample_config();
        config.questions.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_iterations() {
        let mut config = sample_config();
        config.iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_library_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let library = ConfigLibrary::new(dir.path());

        let config = sample_config();
        let filename = library.save(&config).unwrap();
        assert_eq!(filename, "sample.json");

        let loaded = library.load("sample").unwrap();
        assert_eq!(loaded.name, "sample");
        assert_eq!(loaded.models, config.models);

        let list = library.list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].models_count, 1);

        assert!(library.delete("sample"));
        assert!(library.load("sample").is_err());
    }

    #[test]
    fn test_defaults_fill_in_missing_fields() {
        let json = r#"{"name":"minimal","models":["m1"],"questions":["q1"]}"#;
        let config: SweepConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.user_types, vec!["business"]);
        assert_eq!(config.think_mode_options, vec![false]);
        assert_eq!(config.iterations, 1);
        assert_eq!(config.case_timeout_secs, 60);
        assert!(config.validate().is_ok());
    }
}
