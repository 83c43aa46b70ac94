use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{KeyValueStore, ACTIVE_IDEAS_KEY, LANGUAGE_KEY, PROVIDER_SETTINGS_KEY};
use crate::ideas::{Idea, Language};

/// User-supplied provider overrides. Every field is optional; blanks are
/// treated as absent when resolving the effective configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ProviderSettings {
    pub fn is_empty(&self) -> bool {
        [&self.api_key, &self.base_url, &self.model]
            .iter()
            .all(|field| non_blank(field.as_deref()).is_none())
    }

    pub fn api_key(&self) -> Option<&str> {
        non_blank(self.api_key.as_deref())
    }

    pub fn base_url(&self) -> Option<&str> {
        non_blank(self.base_url.as_deref())
    }

    pub fn model(&self) -> Option<&str> {
        non_blank(self.model.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// A bare string is accepted as an API key, the shape older settings used.
pub fn load_provider_settings(store: &mut dyn KeyValueStore) -> ProviderSettings {
    match store.get(PROVIDER_SETTINGS_KEY) {
        Some(Value::String(key)) => ProviderSettings {
            api_key: Some(key),
            ..ProviderSettings::default()
        },
        Some(value) => serde_json::from_value(value).unwrap_or_default(),
        None => ProviderSettings::default(),
    }
}

pub fn save_provider_settings(
    store: &mut dyn KeyValueStore,
    settings: &ProviderSettings,
) -> anyhow::Result<()> {
    if settings.is_empty() {
        return store.remove(PROVIDER_SETTINGS_KEY);
    }
    store.set(PROVIDER_SETTINGS_KEY, serde_json::to_value(settings)?)
}

pub fn load_language(store: &mut dyn KeyValueStore) -> Language {
    store
        .get(LANGUAGE_KEY)
        .and_then(|value| value.as_str().map(Language::from_tag_or_default))
        .unwrap_or_default()
}

pub fn save_language(store: &mut dyn KeyValueStore, language: Language) -> anyhow::Result<()> {
    store.set(LANGUAGE_KEY, Value::String(language.tag().to_string()))
}

pub fn load_active_ideas(store: &mut dyn KeyValueStore) -> Vec<Idea> {
    let Some(Value::Array(rows)) = store.get(ACTIVE_IDEAS_KEY) else {
        return Vec::new();
    };
    rows.into_iter()
        .filter_map(|row| serde_json::from_value::<Idea>(row).ok())
        .collect()
}

pub fn save_active_ideas(store: &mut dyn KeyValueStore, ideas: &[Idea]) -> anyhow::Result<()> {
    store.set(ACTIVE_IDEAS_KEY, serde_json::to_value(ideas)?)
}
