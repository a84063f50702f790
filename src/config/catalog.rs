//! Model catalog -- capability flags for the models a sweep can target.
//!
//! Think-mode support is a catalog attribute supplied by configuration, not a
//! name-matching rule inside orchestration logic.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One model entry with its capability flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub supports_think_mode: bool,
}

/// The set of models available to sweep configs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCatalog {
    pub models: Vec<ModelSpec>,
}

impl ModelCatalog {
    /// Load a catalog from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read model catalog: {}", path.display()))?;
        let catalog: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse model catalog: {}", path.display()))?;
        Ok(catalog)
    }

    /// Whether the model may run think-mode cases. Unknown models get no
    /// capabilities.
    pub fn supports_think_mode(&self, model_id: &str) -> bool {
        self.models
            .iter()
            .any(|m| m.id == model_id && m.supports_think_mode)
    }

    pub fn contains(&self, model_id: &str) -> bool {
        self.models.iter().any(|m| m.id == model_id)
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        let entry = |id: &str, name: &str, think: bool| ModelSpec {
            id: id.to_string(),
            display_name: name.to_string(),
            supports_think_mode: think,
        };

        Self {
            models: vec![
                entry("gemini-2.5-pro", "Gemini 2.5 Pro", true),
                entry("gemini-2.5-flash", "Gemini 2.5 Flash", true),
                entry("gemini-2.5-flash-lite", "Gemini 2.5 Flash Lite", true),
                entry("gemini-2.0-flash", "Gemini 2.0 Flash", false),
                entry("gemini-2.0-flash-lite", "Gemini 2.0 Flash Lite", false),
                entry("gemini-1.5-flash", "Gemini 1.5 Flash", false),
                entry("gemini-1.5-pro", "Gemini 1.5 Pro", false),
            ],
        }
    }
}
