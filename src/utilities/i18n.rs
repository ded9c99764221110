//! Prompt and message catalogue.
//!
//! Every piece of text the engine shows a model (role-playing preamble, tool
//! format instructions, error observations, delegation tool descriptions) is
//! looked up here by `kind` and `key`, so a deployment can swap wording with a
//! custom JSON prompt file.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::utilities::errors::ConfigurationError;

const EMBEDDED_EN_JSON: &str = include_str!("../translations/en.json");

type Catalogue = HashMap<String, HashMap<String, String>>;

static EMBEDDED: Lazy<Catalogue> =
    Lazy::new(|| serde_json::from_str(EMBEDDED_EN_JSON).unwrap_or_default());

/// Loaded prompts, `kind -> key -> text`.
#[derive(Debug, Clone)]
pub struct I18N {
    prompts: Catalogue,
    /// Path of the custom prompt file, if one was loaded.
    pub prompt_file: Option<String>,
}

impl Default for I18N {
    fn default() -> Self {
        Self {
            prompts: EMBEDDED.clone(),
            prompt_file: None,
        }
    }
}

impl I18N {
    /// Load the embedded English prompts, overlaid with `prompt_file` when
    /// given.
    ///
    /// A custom file only needs the keys it changes; anything it leaves out
    /// falls back to the embedded text.
    pub fn new(prompt_file: Option<&str>) -> Result<Self, ConfigurationError> {
        let mut i18n = Self::default();
        let Some(path) = prompt_file else {
            return Ok(i18n);
        };

        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigurationError::PromptFile {
                path: path.to_string(),
                message: e.to_string(),
            })?;
        let custom: Catalogue =
            serde_json::from_str(&content).map_err(|e| ConfigurationError::PromptFile {
                path: path.to_string(),
                message: e.to_string(),
            })?;

        for (kind, entries) in custom {
            i18n.prompts.entry(kind).or_default().extend(entries);
        }
        i18n.prompt_file = Some(path.to_string());
        log::debug!("Loaded custom prompts from {}", path);
        Ok(i18n)
    }

    pub fn slice(&self, slice: &str) -> String {
        self.retrieve("slices", slice)
    }

    pub fn errors(&self, error: &str) -> String {
        self.retrieve("errors", error)
    }

    pub fn tools(&self, tool: &str) -> String {
        self.retrieve("tools", tool)
    }

    /// Look up a prompt by `kind` and `key`.
    ///
    /// Missing entries yield an empty string and a warning rather than a
    /// failure mid-run.
    pub fn retrieve(&self, kind: &str, key: &str) -> String {
        match self.prompts.get(kind).and_then(|section| section.get(key)) {
            Some(text) => text.clone(),
            None => {
                log::warn!("Prompt for '{}':'{}' not found", kind, key);
                String::new()
            }
        }
    }
}
