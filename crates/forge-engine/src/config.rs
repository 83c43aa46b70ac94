use std::env;
use std::fmt;

use forge_contracts::store::ProviderSettings;

use crate::error::AiError;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Environment defaults, captured once and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderEnv {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

impl ProviderEnv {
    pub fn from_env() -> Self {
        Self {
            api_key: first_non_empty_env(&["OPENAI_API_KEY"]),
            base_url: first_non_empty_env(&["OPENAI_BASE_URL", "OPENAI_API_BASE"]),
            model: first_non_empty_env(&["OPENAI_MODEL"]),
        }
    }
}

/// Effective provider configuration for one call.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl ProviderConfig {
    pub fn chat_endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    pub fn masked_api_key(&self) -> String {
        mask_secret(&self.api_key)
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.masked_api_key())
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

/// Merges provider sources with fixed precedence, per field:
/// override, stored settings, environment, then the hardcoded default.
#[derive(Debug, Clone, Default)]
pub struct ProviderResolver {
    stored: ProviderSettings,
    env: ProviderEnv,
}

impl ProviderResolver {
    pub fn new(stored: ProviderSettings, env: ProviderEnv) -> Self {
        Self { stored, env }
    }

    pub fn stored(&self) -> &ProviderSettings {
        &self.stored
    }

    pub fn set_stored(&mut self, stored: ProviderSettings) {
        self.stored = stored;
    }

    pub fn resolve(&self, overrides: Option<&ProviderSettings>) -> Result<ProviderConfig, AiError> {
        let api_key = overrides
            .and_then(ProviderSettings::api_key)
            .or_else(|| self.stored.api_key())
            .or_else(|| non_blank(self.env.api_key.as_deref()))
            .ok_or(AiError::MissingCredential)?;

        let base_url = overrides
            .and_then(ProviderSettings::base_url)
            .or_else(|| self.stored.base_url())
            .or_else(|| non_blank(self.env.base_url.as_deref()))
            .unwrap_or(DEFAULT_BASE_URL);

        let model = overrides
            .and_then(ProviderSettings::model)
            .or_else(|| self.stored.model())
            .or_else(|| non_blank(self.env.model.as_deref()))
            .unwrap_or(DEFAULT_MODEL);

        Ok(ProviderConfig {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }
}

fn first_non_empty_env(keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Ok(value) = env::var(key) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 8 {
        return "*".repeat(count);
    }
    let head: String = secret.chars().take(4).collect();
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("{head}…{tail}")
}
