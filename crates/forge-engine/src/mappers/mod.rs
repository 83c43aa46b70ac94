//! Domain mappers: one user intent in, one typed record out.
//!
//! Every mapper resolves the provider configuration before touching the
//! transport, so a missing credential never costs a network call.

mod normalize;
mod prompts;

use forge_contracts::ideas::{
    Blueprint, ForgeConfig, Idea, IdeaStatus, Language, VerificationResult,
};
use forge_contracts::store::ProviderSettings;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::{ProviderConfig, ProviderResolver};
use crate::error::AiError;
use crate::recovery::recover_json;
use crate::transport::{ChatMessage, ChatTransport, CompletionParams};

use normalize::{
    bool_or, degen_score, display_string, optional_display, similar_projects, string_list,
    text_or, value_as_non_empty_string,
};

pub const UNTITLED_IDEA: &str = "Untitled Idea";
pub const UNKNOWN_ECOSYSTEM: &str = "Unknown";
pub const UNSPECIFIED_SECTOR: &str = "Unspecified";
pub const VERIFICATION_UNAVAILABLE_NOTES: &str =
    "Verification unavailable due to network or rate limit.";

const IDEAS_PARAMS: CompletionParams = CompletionParams {
    temperature: 0.8,
    max_tokens: 1400,
};
const VERIFY_PARAMS: CompletionParams = CompletionParams {
    temperature: 0.2,
    max_tokens: 800,
};
const BLUEPRINT_PARAMS: CompletionParams = CompletionParams {
    temperature: 0.3,
    max_tokens: 1200,
};
const TRANSLATE_PARAMS: CompletionParams = CompletionParams {
    temperature: 0.6,
    max_tokens: 800,
};
const CONTRACT_PARAMS: CompletionParams = CompletionParams {
    temperature: 0.2,
    max_tokens: 400,
};

/// How `verify_idea` treats a failed provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerificationPolicy {
    /// Every failure propagates.
    #[default]
    Strict,
    /// Transport and parse failures become a "unique, unverified" result.
    /// A missing credential still propagates.
    BestEffort,
}

impl VerificationPolicy {
    pub fn fallback_result() -> VerificationResult {
        VerificationResult {
            is_unique: true,
            similar_projects: Vec::new(),
            notes: VERIFICATION_UNAVAILABLE_NOTES.to_string(),
            pivot_suggestion: None,
        }
    }
}

/// Stateless AI client. Holds the transport and the provider resolver; all
/// mapper calls take `&self` and may run concurrently.
pub struct ForgeClient<T: ChatTransport> {
    transport: T,
    resolver: ProviderResolver,
    verification_policy: VerificationPolicy,
}

impl<T: ChatTransport> ForgeClient<T> {
    pub fn new(transport: T, resolver: ProviderResolver) -> Self {
        Self {
            transport,
            resolver,
            verification_policy: VerificationPolicy::default(),
        }
    }

    pub fn with_verification_policy(mut self, policy: VerificationPolicy) -> Self {
        self.verification_policy = policy;
        self
    }

    pub fn verification_policy(&self) -> VerificationPolicy {
        self.verification_policy
    }

    pub fn resolver(&self) -> &ProviderResolver {
        &self.resolver
    }

    pub fn resolver_mut(&mut self) -> &mut ProviderResolver {
        &mut self.resolver
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn generate_ideas(
        &self,
        config: &ForgeConfig,
        language: Language,
        overrides: Option<&ProviderSettings>,
    ) -> Result<Vec<Idea>, AiError> {
        let config = config.normalized();
        let raw = self.call(
            &prompts::generate_ideas(&config, language),
            overrides,
            IDEAS_PARAMS,
        )?;
        let Value::Array(rows) = recover_json(&raw)? else {
            return Err(AiError::InvalidResponseShape {
                operation: "generate_ideas",
                expected: "array of ideas",
            });
        };

        let empty = Map::new();
        Ok(rows
            .iter()
            .take(usize::from(config.quantity))
            .map(|row| idea_from_row(row.as_object().unwrap_or(&empty), language))
            .collect())
    }

    pub fn verify_idea(
        &self,
        idea: &Idea,
        language: Language,
        overrides: Option<&ProviderSettings>,
    ) -> Result<VerificationResult, AiError> {
        let provider = self.resolver.resolve(overrides)?;
        let outcome = self
            .transport
            .complete(&prompts::verify_idea(idea, language), &provider, VERIFY_PARAMS)
            .and_then(|raw| recover_json(&raw))
            .and_then(|value| verification_from_value(&value));

        match (outcome, self.verification_policy) {
            (Ok(result), _) => Ok(result),
            (Err(_), VerificationPolicy::BestEffort) => Ok(VerificationPolicy::fallback_result()),
            (Err(err), VerificationPolicy::Strict) => Err(err),
        }
    }

    pub fn generate_blueprint(
        &self,
        idea: &Idea,
        language: Language,
        overrides: Option<&ProviderSettings>,
    ) -> Result<Blueprint, AiError> {
        let raw = self.call(
            &prompts::generate_blueprint(idea, language),
            overrides,
            BLUEPRINT_PARAMS,
        )?;
        let value = recover_json(&raw)?;
        let obj = value.as_object().ok_or(AiError::InvalidResponseShape {
            operation: "generate_blueprint",
            expected: "blueprint object",
        })?;
        Ok(Blueprint {
            overview: display_string(obj.get("overview")),
            tokenomics: display_string(obj.get("tokenomics")),
            roadmap: display_string(obj.get("roadmap")),
            technical_architecture: display_string(obj.get("technicalArchitecture")),
            contract_code: optional_display(obj.get("contractCode")),
            frontend_snippet: optional_display(obj.get("frontendSnippet")),
            deployment_url: optional_display(obj.get("deploymentUrl")),
        })
    }

    /// Returns `idea` with translated text overlaid. Fields the model leaves
    /// out keep their original values.
    pub fn translate_idea(
        &self,
        idea: &Idea,
        target: Language,
        overrides: Option<&ProviderSettings>,
    ) -> Result<Idea, AiError> {
        let raw = self.call(
            &prompts::translate_idea(idea, target),
            overrides,
            TRANSLATE_PARAMS,
        )?;
        let value = recover_json(&raw)?;
        let obj = value.as_object().ok_or(AiError::InvalidResponseShape {
            operation: "translate_idea",
            expected: "translation object",
        })?;

        let mut translated = idea.clone();
        translated.title =
            value_as_non_empty_string(obj.get("title")).unwrap_or_else(|| idea.title.clone());
        translated.tagline =
            value_as_non_empty_string(obj.get("tagline")).unwrap_or_else(|| idea.tagline.clone());
        translated.description = value_as_non_empty_string(obj.get("description"))
            .unwrap_or_else(|| idea.description.clone());
        translated.features = string_list(obj.get("features"))
            .filter(|features| !features.is_empty())
            .unwrap_or_else(|| idea.features.clone());
        translated.language = Some(target);
        Ok(translated)
    }

    /// Raw completion text. No JSON recovery is attempted.
    pub fn generate_contract_code(
        &self,
        idea: &Idea,
        overrides: Option<&ProviderSettings>,
    ) -> Result<String, AiError> {
        self.call(&prompts::generate_contract_code(idea), overrides, CONTRACT_PARAMS)
    }

    /// Effective provider configuration, for display.
    pub fn effective_config(
        &self,
        overrides: Option<&ProviderSettings>,
    ) -> Result<ProviderConfig, AiError> {
        self.resolver.resolve(overrides)
    }

    fn call(
        &self,
        messages: &[ChatMessage],
        overrides: Option<&ProviderSettings>,
        params: CompletionParams,
    ) -> Result<String, AiError> {
        let provider = self.resolver.resolve(overrides)?;
        self.transport.complete(messages, &provider, params)
    }
}

fn idea_from_row(row: &Map<String, Value>, language: Language) -> Idea {
    Idea {
        id: Uuid::new_v4().to_string(),
        title: text_or(row, "title", UNTITLED_IDEA),
        tagline: text_or(row, "tagline", ""),
        description: text_or(row, "description", ""),
        ecosystem: text_or(row, "ecosystem", UNKNOWN_ECOSYSTEM),
        sector: text_or(row, "sector", UNSPECIFIED_SECTOR),
        degen_score: degen_score(row.get("degenScore")),
        features: string_list(row.get("features")).unwrap_or_default(),
        status: IdeaStatus::Generated,
        verification_result: None,
        blueprint: None,
        language: Some(language),
    }
}

fn verification_from_value(value: &Value) -> Result<VerificationResult, AiError> {
    let obj = value.as_object().ok_or(AiError::InvalidResponseShape {
        operation: "verify_idea",
        expected: "verification object",
    })?;
    Ok(VerificationResult {
        is_unique: bool_or(obj.get("isUnique"), true),
        similar_projects: similar_projects(obj.get("similarProjects")),
        notes: value_as_non_empty_string(obj.get("notes")).unwrap_or_default(),
        pivot_suggestion: value_as_non_empty_string(obj.get("pivotSuggestion")),
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::config::ProviderConfig;
    use crate::error::AiError;
    use crate::transport::{ChatMessage, ChatTransport, CompletionParams};

    /// Replays queued replies in order and records every request.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        replies: Mutex<VecDeque<Result<String, AiError>>>,
        requests: Mutex<Vec<(Vec<ChatMessage>, CompletionParams)>>,
    }

    impl ScriptedTransport {
        pub(crate) fn with_replies<I>(replies: I) -> Self
        where
            I: IntoIterator<Item = Result<String, AiError>>,
        {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn push(&self, reply: Result<String, AiError>) {
            self.replies
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push_back(reply);
        }

        pub(crate) fn calls(&self) -> usize {
            self.requests
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .len()
        }

        pub(crate) fn last_params(&self) -> Option<CompletionParams> {
            self.requests
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .last()
                .map(|(_, params)| *params)
        }
    }

    impl ChatTransport for ScriptedTransport {
        fn complete(
            &self,
            messages: &[ChatMessage],
            _config: &ProviderConfig,
            params: CompletionParams,
        ) -> Result<String, AiError> {
            self.requests
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push((messages.to_vec(), params));
            self.replies
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .pop_front()
                .unwrap_or(Err(AiError::NoContent))
        }
    }
}
