use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const ECOSYSTEMS: &[&str] = &[
    "Solana", "BSC", "Base", "Monad", "TON", "Ethereum", "Arbitrum",
];

pub const SECTORS: &[&str] = &["DeFi", "SocialFi", "GameFi", "Infra", "DePin", "NFT", "DAO"];

pub const MIN_QUANTITY: u8 = 1;
pub const MAX_QUANTITY: u8 = 5;
pub const MAX_DEGEN_LEVEL: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ForgeMode {
    Targeted,
    Random,
}

impl ForgeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Targeted => "TARGETED",
            Self::Random => "RANDOM",
        }
    }

    /// Label shown next to a batch timestamp.
    pub fn batch_label(self) -> &'static str {
        match self {
            Self::Targeted => "TARGETED",
            Self::Random => "CHAOS",
        }
    }
}

impl FromStr for ForgeMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "targeted" => Ok(Self::Targeted),
            "random" | "chaos" => Ok(Self::Random),
            other => Err(format!("unknown forge mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    En,
    #[serde(rename = "zh-CN")]
    ZhCn,
    #[serde(rename = "zh-TW")]
    ZhTw,
    #[serde(rename = "ru")]
    Ru,
}

impl Language {
    pub const ALL: [Language; 4] = [Self::En, Self::ZhCn, Self::ZhTw, Self::Ru];

    pub fn tag(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::ZhCn => "zh-CN",
            Self::ZhTw => "zh-TW",
            Self::Ru => "ru",
        }
    }

    /// Name embedded in prompts so the model answers in this language.
    pub fn prompt_name(self) -> &'static str {
        match self {
            Self::En => "English",
            Self::ZhCn => "Simplified Chinese",
            Self::ZhTw => "Traditional Chinese",
            Self::Ru => "Russian",
        }
    }

    /// Lenient lookup for stored preferences; unknown tags resolve to English.
    pub fn from_tag_or_default(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        Self::ALL
            .into_iter()
            .find(|lang| lang.tag().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| format!("unsupported language '{trimmed}'"))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Parameters for one generation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgeConfig {
    pub mode: ForgeMode,
    pub ecosystems: Vec<String>,
    pub sectors: Vec<String>,
    pub quantity: u8,
    pub degen_level: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_context: Option<String>,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            mode: ForgeMode::Targeted,
            ecosystems: vec!["Solana".to_string(), "Base".to_string()],
            sectors: vec!["DeFi".to_string(), "Infra".to_string()],
            quantity: 3,
            degen_level: 20,
            user_context: None,
        }
    }
}

impl ForgeConfig {
    /// Returns a copy with quantity and degen level clamped into range, tag
    /// lists trimmed and de-duplicated, and blank context dropped.
    pub fn normalized(&self) -> Self {
        Self {
            mode: self.mode,
            ecosystems: dedup_tags(&self.ecosystems),
            sectors: dedup_tags(&self.sectors),
            quantity: self.quantity.clamp(MIN_QUANTITY, MAX_QUANTITY),
            degen_level: self.degen_level.min(MAX_DEGEN_LEVEL),
            user_context: self
                .user_context
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
        }
    }
}

pub fn degen_label(score: u8) -> &'static str {
    match score {
        0..=33 => "Institutional (Safe)",
        34..=66 => "Innovative (Balanced)",
        _ => "Ponzi / Degen (Chaos)",
    }
}

fn dedup_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let trimmed = tag.trim();
        if trimmed.is_empty() || out.iter().any(|existing| existing == trimmed) {
            continue;
        }
        out.push(trimmed.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_clamps_quantity_and_degen() {
        let config = ForgeConfig {
            quantity: 9,
            degen_level: 140,
            ..ForgeConfig::default()
        };
        let normalized = config.normalized();
        assert_eq!(normalized.quantity, MAX_QUANTITY);
        assert_eq!(normalized.degen_level, MAX_DEGEN_LEVEL);

        let zero = ForgeConfig {
            quantity: 0,
            ..ForgeConfig::default()
        };
        assert_eq!(zero.normalized().quantity, MIN_QUANTITY);
    }

    #[test]
    fn normalized_dedups_tags_and_drops_blank_context() {
        let config = ForgeConfig {
            ecosystems: vec![
                " Solana ".to_string(),
                "Solana".to_string(),
                "".to_string(),
                "TON".to_string(),
            ],
            user_context: Some("   ".to_string()),
            ..ForgeConfig::default()
        };
        let normalized = config.normalized();
        assert_eq!(normalized.ecosystems, vec!["Solana", "TON"]);
        assert_eq!(normalized.user_context, None);
    }

    #[test]
    fn language_tags_round_trip_through_serde() -> anyhow::Result<()> {
        assert_eq!(serde_json::to_string(&Language::ZhTw)?, "\"zh-TW\"");
        let parsed: Language = serde_json::from_str("\"ru\"")?;
        assert_eq!(parsed, Language::Ru);
        Ok(())
    }

    #[test]
    fn language_parse_is_case_insensitive_and_lenient_lookup_defaults() {
        assert_eq!("ZH-cn".parse::<Language>(), Ok(Language::ZhCn));
        assert!("klingon".parse::<Language>().is_err());
        assert_eq!(Language::from_tag_or_default("klingon"), Language::En);
    }

    #[test]
    fn forge_mode_accepts_chaos_alias() {
        assert_eq!("chaos".parse::<ForgeMode>(), Ok(ForgeMode::Random));
        assert_eq!(ForgeMode::Random.batch_label(), "CHAOS");
        assert_eq!(ForgeMode::Targeted.as_str(), "TARGETED");
    }

    #[test]
    fn degen_label_bands() {
        assert_eq!(degen_label(0), "Institutional (Safe)");
        assert_eq!(degen_label(50), "Innovative (Balanced)");
        assert_eq!(degen_label(100), "Ponzi / Degen (Chaos)");
    }
}
