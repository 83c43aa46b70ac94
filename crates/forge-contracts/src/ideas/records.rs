use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::config::Language;

pub const DEFAULT_DEGEN_SCORE: u8 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IdeaStatus {
    #[default]
    Generated,
    Verifying,
    Verified,
    Failed,
}

/// Inputs that drive the verification state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    BeginVerification,
    VerificationSucceeded,
    VerificationFailed,
}

impl IdeaStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generated => "GENERATED",
            Self::Verifying => "VERIFYING",
            Self::Verified => "VERIFIED",
            Self::Failed => "FAILED",
        }
    }

    /// Applies `event`, returning the next status or `None` when the
    /// transition is not allowed.
    ///
    /// Verification begins from `GENERATED` or `FAILED`, or from `VERIFYING`
    /// when a second request races the first; a `VERIFIED` idea stays put. A
    /// completion is accepted from any status reached through `VERIFYING`, so
    /// the last resolved verification wins. A completion landing on a
    /// `GENERATED` record is stale (the record was replaced after the request
    /// went out) and is rejected.
    pub fn next(self, event: StatusEvent) -> Option<Self> {
        match (self, event) {
            (
                Self::Generated | Self::Failed | Self::Verifying,
                StatusEvent::BeginVerification,
            ) => Some(Self::Verifying),
            (Self::Verified, StatusEvent::BeginVerification) => None,
            (Self::Generated, _) => None,
            (_, StatusEvent::VerificationSucceeded) => Some(Self::Verified),
            (_, StatusEvent::VerificationFailed) => Some(Self::Failed),
        }
    }
}

impl fmt::Display for IdeaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarProject {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub is_unique: bool,
    #[serde(default)]
    pub similar_projects: Vec<SimilarProject>,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pivot_suggestion: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blueprint {
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub tokenomics: String,
    #[serde(default)]
    pub roadmap: String,
    #[serde(default)]
    pub technical_architecture: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontend_snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Idea {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub tagline: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ecosystem: String,
    #[serde(default)]
    pub sector: String,
    #[serde(default = "default_degen_score")]
    pub degen_score: u8,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub status: IdeaStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_result: Option<VerificationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blueprint: Option<Blueprint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
}

fn default_degen_score() -> u8 {
    DEFAULT_DEGEN_SCORE
}

/// Fields a translation is allowed to replace on an idea.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedFields {
    pub title: String,
    pub tagline: String,
    pub description: String,
    pub features: Vec<String>,
    pub language: Language,
}

impl Idea {
    /// Text fields of this idea, tagged as written in `language`.
    pub fn translated_fields(&self, language: Language) -> TranslatedFields {
        TranslatedFields {
            title: self.title.clone(),
            tagline: self.tagline.clone(),
            description: self.description.clone(),
            features: self.features.clone(),
            language,
        }
    }

    /// Overlays translated text onto this idea, leaving status and
    /// enrichments untouched.
    pub fn apply_translation(&mut self, fields: TranslatedFields) {
        self.title = fields.title;
        self.tagline = fields.tagline;
        self.description = fields.description;
        self.features = fields.features;
        self.language = Some(fields.language);
    }
}

/// Snapshot of one generation run. Ideas are owned copies, so later edits to
/// the working set never reach a stored batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdeaBatch {
    pub id: String,
    pub label: String,
    pub created_at: i64,
    pub ideas: Vec<Idea>,
}

impl IdeaBatch {
    pub fn new(label: impl Into<String>, ideas: &[Idea]) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            label: label.into(),
            created_at: Utc::now().timestamp_millis(),
            ideas: ideas.to_vec(),
        }
    }

    /// Copy of the batch ideas suitable for use as a fresh working set.
    pub fn restore(&self) -> Vec<Idea> {
        self.ideas.clone()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    fn sample_idea() -> Idea {
        Idea {
            id: "idea-1".to_string(),
            title: "Moon Vault".to_string(),
            tagline: "Yield on the dark side".to_string(),
            description: "Restaking vault".to_string(),
            ecosystem: "Solana".to_string(),
            sector: "DeFi".to_string(),
            degen_score: 72,
            features: vec!["auto-compound".to_string()],
            status: IdeaStatus::Generated,
            verification_result: None,
            blueprint: None,
            language: Some(Language::En),
        }
    }

    #[test]
    fn status_machine_allows_retry_from_failed() {
        let failed = IdeaStatus::Generated
            .next(StatusEvent::BeginVerification)
            .and_then(|status| status.next(StatusEvent::VerificationFailed));
        assert_eq!(failed, Some(IdeaStatus::Failed));
        assert_eq!(
            IdeaStatus::Failed.next(StatusEvent::BeginVerification),
            Some(IdeaStatus::Verifying)
        );
        assert_eq!(
            IdeaStatus::Verifying.next(StatusEvent::VerificationSucceeded),
            Some(IdeaStatus::Verified)
        );
    }

    #[test]
    fn status_machine_rejects_completion_on_generated() {
        assert_eq!(
            IdeaStatus::Generated.next(StatusEvent::VerificationSucceeded),
            None
        );
        assert_eq!(
            IdeaStatus::Generated.next(StatusEvent::VerificationFailed),
            None
        );
    }

    #[test]
    fn status_machine_rejects_reverification_of_verified() {
        assert_eq!(
            IdeaStatus::Verified.next(StatusEvent::BeginVerification),
            None
        );
        for status in [
            IdeaStatus::Generated,
            IdeaStatus::Failed,
            IdeaStatus::Verifying,
        ] {
            assert_eq!(
                status.next(StatusEvent::BeginVerification),
                Some(IdeaStatus::Verifying),
                "{status}"
            );
        }
    }

    #[test]
    fn translated_fields_are_tagged_with_target_language() {
        let mut translated = sample_idea();
        translated.language = None;
        translated.title = "Лунный сейф".to_string();

        let fields = translated.translated_fields(Language::Ru);
        assert_eq!(fields.language, Language::Ru);
        assert_eq!(fields.title, "Лунный сейф");
        assert_eq!(fields.features, vec!["auto-compound".to_string()]);
    }

    #[test]
    fn idea_serializes_with_camel_case_keys() -> anyhow::Result<()> {
        let value = serde_json::to_value(sample_idea())?;
        assert_eq!(value["degenScore"], json!(72));
        assert_eq!(value["status"], json!("GENERATED"));
        assert_eq!(value["language"], json!("en"));
        assert!(value.get("verificationResult").is_none());
        Ok(())
    }

    #[test]
    fn idea_deserializes_with_defaults_for_missing_fields() -> anyhow::Result<()> {
        let idea: Idea = serde_json::from_value(json!({"id": "x", "title": "Bare"}))?;
        assert_eq!(idea.degen_score, DEFAULT_DEGEN_SCORE);
        assert_eq!(idea.status, IdeaStatus::Generated);
        assert!(idea.features.is_empty());
        assert_eq!(idea.language, None);
        Ok(())
    }

    #[test]
    fn apply_translation_keeps_status_and_enrichments() {
        let mut idea = sample_idea();
        idea.status = IdeaStatus::Verified;
        idea.blueprint = Some(Blueprint {
            overview: "o".to_string(),
            ..Blueprint::default()
        });
        idea.apply_translation(TranslatedFields {
            title: "Лунный сейф".to_string(),
            tagline: "t".to_string(),
            description: "d".to_string(),
            features: vec!["f".to_string()],
            language: Language::Ru,
        });
        assert_eq!(idea.title, "Лунный сейф");
        assert_eq!(idea.status, IdeaStatus::Verified);
        assert!(idea.blueprint.is_some());
        assert_eq!(idea.language, Some(Language::Ru));
    }

    #[test]
    fn batch_restore_is_isolated_from_stored_ideas() {
        let batch = IdeaBatch::new("2026-01-01 00:00:00 • TARGETED", &[sample_idea()]);
        let mut restored = batch.restore();
        restored[0].status = IdeaStatus::Verifying;
        restored[0].features.push("mutated".to_string());

        assert_eq!(batch.ideas[0].status, IdeaStatus::Generated);
        assert_eq!(batch.ideas[0].features, vec!["auto-compound".to_string()]);
        assert!(!batch.id.is_empty());
        assert!(batch.created_at > 0);
    }

    #[test]
    fn verification_result_round_trips_wire_names() -> anyhow::Result<()> {
        let value = json!({
            "isUnique": false,
            "similarProjects": [{"name": "Jito", "url": "https://jito.network"}],
            "notes": "close match",
            "pivotSuggestion": "target LSTs"
        });
        let parsed: VerificationResult = serde_json::from_value(value.clone())?;
        assert!(!parsed.is_unique);
        assert_eq!(parsed.similar_projects[0].description, None);
        let back: Value = serde_json::to_value(&parsed)?;
        assert_eq!(back, value);
        Ok(())
    }
}
