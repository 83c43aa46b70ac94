//! Owns the active working set and drives the idea lifecycle.
//!
//! Locks are only held for keyed in-memory updates and persistence, never
//! across a transport call. Lock order is ideas, archive, language, store.

use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use forge_contracts::events::{EventLevel, EventPayload, EventWriter};
use forge_contracts::ideas::{
    Blueprint, ForgeConfig, Idea, IdeaBatch, IdeaStatus, Language, StatusEvent,
    VerificationResult,
};
use forge_contracts::store::{
    load_active_ideas, load_language, load_provider_settings, save_active_ideas, save_language,
    save_provider_settings, BatchArchive, KeyValueStore, ProviderSettings,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::error::AiError;
use crate::mappers::ForgeClient;
use crate::transport::ChatTransport;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Ai(#[from] AiError),

    #[error("no idea with id `{0}` in the working set")]
    UnknownIdea(String),

    #[error("no archived batch with id `{0}`")]
    UnknownBatch(String),

    #[error("idea `{id}` cannot apply {event:?} while {from}")]
    InvalidTransition {
        id: String,
        from: IdeaStatus,
        event: StatusEvent,
    },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl SessionError {
    pub fn code(&self) -> String {
        match self {
            Self::Ai(err) => err.code(),
            Self::UnknownIdea(_) => "UNKNOWN_IDEA".to_string(),
            Self::UnknownBatch(_) => "UNKNOWN_BATCH".to_string(),
            Self::InvalidTransition { .. } => "INVALID_TRANSITION".to_string(),
            Self::Storage(_) => "STORAGE_ERROR".to_string(),
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::Ai(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}

pub struct ForgeSession<T: ChatTransport> {
    client: ForgeClient<T>,
    ideas: Mutex<Vec<Idea>>,
    archive: Mutex<BatchArchive>,
    language: Mutex<Language>,
    store: Mutex<Box<dyn KeyValueStore>>,
    events: EventWriter,
}

impl<T: ChatTransport> ForgeSession<T> {
    /// Restores archived batches, the working set, the language preference
    /// and stored provider settings from `store`. Corrupt entries fall back
    /// to defaults.
    pub fn open(
        mut client: ForgeClient<T>,
        mut store: Box<dyn KeyValueStore>,
        events: EventWriter,
    ) -> Self {
        let archive = BatchArchive::load(store.as_mut());
        let ideas = load_active_ideas(store.as_mut());
        let language = load_language(store.as_mut());
        client
            .resolver_mut()
            .set_stored(load_provider_settings(store.as_mut()));
        Self {
            client,
            ideas: Mutex::new(ideas),
            archive: Mutex::new(archive),
            language: Mutex::new(language),
            store: Mutex::new(store),
            events,
        }
    }

    pub fn client(&self) -> &ForgeClient<T> {
        &self.client
    }

    pub fn events(&self) -> &EventWriter {
        &self.events
    }

    pub fn language(&self) -> Language {
        *lock(&self.language)
    }

    pub fn set_language(&self, language: Language) -> Result<(), SessionError> {
        let mut current = lock(&self.language);
        save_language(lock(&self.store).as_mut(), language)?;
        *current = language;
        Ok(())
    }

    pub fn provider_settings(&self) -> &ProviderSettings {
        self.client.resolver().stored()
    }

    pub fn set_provider_settings(&mut self, settings: ProviderSettings) -> Result<(), SessionError> {
        save_provider_settings(lock(&self.store).as_mut(), &settings)?;
        self.client.resolver_mut().set_stored(settings);
        Ok(())
    }

    /// Snapshot of the working set.
    pub fn ideas(&self) -> Vec<Idea> {
        lock(&self.ideas).clone()
    }

    pub fn idea(&self, idea_id: &str) -> Option<Idea> {
        lock(&self.ideas)
            .iter()
            .find(|idea| idea.id == idea_id)
            .cloned()
    }

    /// Archived batches, newest first.
    pub fn batches(&self) -> Vec<IdeaBatch> {
        lock(&self.archive).batches().to_vec()
    }

    /// Runs one generation. On success the result replaces the working set
    /// and a copy is archived as a new batch.
    pub fn generate(
        &self,
        config: &ForgeConfig,
        overrides: Option<&ProviderSettings>,
    ) -> Result<IdeaBatch, SessionError> {
        let config = config.normalized();
        let language = self.language();
        self.log(
            "generation_started",
            EventLevel::Info,
            format!(
                "Initializing {} sequence for {} ideas",
                config.mode.as_str(),
                config.quantity
            ),
            json!({
                "mode": config.mode.as_str(),
                "quantity": config.quantity,
                "language": language.tag(),
            }),
        );

        let generated = match self.client.generate_ideas(&config, language, overrides) {
            Ok(ideas) => ideas,
            Err(err) => {
                self.log_failure("generation_failed", None, &err);
                return Err(err.into());
            }
        };

        for idea in &generated {
            self.log(
                "idea_synthesized",
                EventLevel::Success,
                format!("Synthesized: {}", idea.title),
                json!({"idea_id": idea.id, "title": idea.title}),
            );
        }

        let label = format!(
            "{} • {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
            config.mode.batch_label()
        );
        let batch = IdeaBatch::new(label, &generated);
        {
            let mut ideas = lock(&self.ideas);
            let mut archive = lock(&self.archive);
            let mut store = lock(&self.store);
            archive.record(batch.clone());
            archive.persist(store.as_mut())?;
            save_active_ideas(store.as_mut(), &generated)?;
            *ideas = generated;
        }

        self.log(
            "batch_saved",
            EventLevel::Success,
            "Batch saved to archive",
            json!({
                "batch_id": batch.id,
                "label": batch.label,
                "count": batch.ideas.len(),
            }),
        );
        Ok(batch)
    }

    /// Makes a fresh copy of an archived batch the working set.
    pub fn restore_batch(&self, batch_id: &str) -> Result<Vec<Idea>, SessionError> {
        let (restored, label) = {
            let mut ideas = lock(&self.ideas);
            let archive = lock(&self.archive);
            let batch = archive
                .get(batch_id)
                .ok_or_else(|| SessionError::UnknownBatch(batch_id.to_string()))?;
            let restored = batch.restore();
            save_active_ideas(lock(&self.store).as_mut(), &restored)?;
            *ideas = restored.clone();
            (restored, batch.label.clone())
        };

        self.log(
            "batch_restored",
            EventLevel::Info,
            format!("Restored batch: {label}"),
            json!({"batch_id": batch_id, "count": restored.len()}),
        );
        Ok(restored)
    }

    /// GENERATED or FAILED to VERIFYING, then VERIFIED or FAILED once the
    /// provider answers. A VERIFIED idea is rejected before any provider call.
    /// A completion for an idea that left the working set meanwhile is dropped.
    pub fn verify(
        &self,
        idea_id: &str,
        overrides: Option<&ProviderSettings>,
    ) -> Result<VerificationResult, SessionError> {
        let idea = self.transition(idea_id, StatusEvent::BeginVerification, |_| {})?;
        self.log(
            "verification_started",
            EventLevel::Warning,
            format!("Verifying uniqueness: {}", idea.title),
            json!({"idea_id": idea.id}),
        );

        let outcome = self.client.verify_idea(&idea, self.language(), overrides);
        match outcome {
            Ok(result) => {
                let attached = result.clone();
                let applied = self.complete(idea_id, StatusEvent::VerificationSucceeded, |idea| {
                    idea.verification_result = Some(attached);
                })?;
                if applied {
                    if result.is_unique {
                        self.log(
                            "verification_succeeded",
                            EventLevel::Success,
                            format!("Verified unique: {}", idea.title),
                            json!({"idea_id": idea.id}),
                        );
                    } else {
                        self.log(
                            "verification_collision",
                            EventLevel::Warning,
                            format!(
                                "Collision detected: {} similar projects",
                                result.similar_projects.len()
                            ),
                            json!({
                                "idea_id": idea.id,
                                "count": result.similar_projects.len(),
                            }),
                        );
                    }
                }
                Ok(result)
            }
            Err(err) => {
                if self.complete(idea_id, StatusEvent::VerificationFailed, |_| {})? {
                    self.log_failure("verification_failed", Some(idea_id), &err);
                }
                Err(err.into())
            }
        }
    }

    /// Cached blueprint if present; otherwise generates one and caches it.
    /// A cached blueprint is never replaced here.
    pub fn view_blueprint(
        &self,
        idea_id: &str,
        overrides: Option<&ProviderSettings>,
    ) -> Result<Blueprint, SessionError> {
        let idea = self
            .idea(idea_id)
            .ok_or_else(|| SessionError::UnknownIdea(idea_id.to_string()))?;
        if let Some(cached) = idea.blueprint {
            return Ok(cached);
        }

        let generated = self.fetch_blueprint(&idea, overrides)?;
        let attached = self.update_idea(idea_id, |idea| {
            if let Some(existing) = &idea.blueprint {
                return (existing.clone(), false);
            }
            idea.blueprint = Some(generated.clone());
            (generated.clone(), true)
        })?;

        match attached {
            Some((blueprint, true)) => {
                self.log_blueprint_cached(idea_id);
                Ok(blueprint)
            }
            Some((blueprint, false)) => Ok(blueprint),
            None => Ok(generated),
        }
    }

    /// Regenerates the blueprint and replaces any cached one.
    pub fn refresh_blueprint(
        &self,
        idea_id: &str,
        overrides: Option<&ProviderSettings>,
    ) -> Result<Blueprint, SessionError> {
        let idea = self
            .idea(idea_id)
            .ok_or_else(|| SessionError::UnknownIdea(idea_id.to_string()))?;
        let generated = self.fetch_blueprint(&idea, overrides)?;
        let applied = self.update_idea(idea_id, |idea| {
            idea.blueprint = Some(generated.clone());
        })?;
        if applied.is_some() {
            self.log_blueprint_cached(idea_id);
        }
        Ok(generated)
    }

    /// Overlays translated text on the current record. Status and
    /// enrichments that landed while the call was in flight are kept.
    pub fn translate(
        &self,
        idea_id: &str,
        target: Language,
        overrides: Option<&ProviderSettings>,
    ) -> Result<Idea, SessionError> {
        let idea = self
            .idea(idea_id)
            .ok_or_else(|| SessionError::UnknownIdea(idea_id.to_string()))?;

        let translated = match self.client.translate_idea(&idea, target, overrides) {
            Ok(translated) => translated,
            Err(err) => {
                self.log_failure("translation_failed", Some(idea_id), &err);
                return Err(err.into());
            }
        };

        let fields = translated.translated_fields(target);
        let updated = self.update_idea(idea_id, |current| {
            current.apply_translation(fields);
            current.clone()
        })?;

        let Some(updated) = updated else {
            return Ok(translated);
        };
        self.log(
            "translation_completed",
            EventLevel::Success,
            format!("Translated to {}", target.prompt_name()),
            json!({"idea_id": idea_id, "language": target.tag()}),
        );
        Ok(updated)
    }

    /// Contract skeleton for an idea. The idea record is not modified.
    pub fn contract_code(
        &self,
        idea_id: &str,
        overrides: Option<&ProviderSettings>,
    ) -> Result<String, SessionError> {
        let idea = self
            .idea(idea_id)
            .ok_or_else(|| SessionError::UnknownIdea(idea_id.to_string()))?;
        let code = self.client.generate_contract_code(&idea, overrides)?;
        self.log(
            "contract_generated",
            EventLevel::Success,
            format!("Contract skeleton ready: {}", idea.title),
            json!({"idea_id": idea_id, "chars": code.chars().count()}),
        );
        Ok(code)
    }

    /// Applies `apply` to the idea whose id matches, leaving every other
    /// element and the order untouched, then persists the working set.
    /// `None` when no idea has that id.
    pub fn update_idea<R>(
        &self,
        idea_id: &str,
        apply: impl FnOnce(&mut Idea) -> R,
    ) -> Result<Option<R>, SessionError> {
        let mut ideas = lock(&self.ideas);
        let Some(idea) = ideas.iter_mut().find(|idea| idea.id == idea_id) else {
            return Ok(None);
        };
        let out = apply(idea);
        save_active_ideas(lock(&self.store).as_mut(), &ideas)?;
        Ok(Some(out))
    }

    fn fetch_blueprint(
        &self,
        idea: &Idea,
        overrides: Option<&ProviderSettings>,
    ) -> Result<Blueprint, SessionError> {
        self.client
            .generate_blueprint(idea, self.language(), overrides)
            .map_err(|err| {
                self.log_failure("blueprint_failed", Some(&idea.id), &err);
                err.into()
            })
    }

    /// Applies a status event to an idea that must exist.
    fn transition(
        &self,
        idea_id: &str,
        event: StatusEvent,
        apply: impl FnOnce(&mut Idea),
    ) -> Result<Idea, SessionError> {
        self.update_idea(idea_id, |idea| -> Result<Idea, SessionError> {
            let next = idea
                .status
                .next(event)
                .ok_or_else(|| SessionError::InvalidTransition {
                    id: idea.id.clone(),
                    from: idea.status,
                    event,
                })?;
            idea.status = next;
            apply(idea);
            Ok(idea.clone())
        })?
        .ok_or_else(|| SessionError::UnknownIdea(idea_id.to_string()))?
    }

    /// Completion of an in-flight operation. Returns `false` when the idea
    /// is gone or the record was replaced by a fresh one.
    fn complete(
        &self,
        idea_id: &str,
        event: StatusEvent,
        apply: impl FnOnce(&mut Idea),
    ) -> Result<bool, SessionError> {
        match self.transition(idea_id, event, apply) {
            Ok(_) => Ok(true),
            Err(SessionError::UnknownIdea(_) | SessionError::InvalidTransition { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Best-effort: a state change that already committed is not reported
    /// as failed because its event could not be appended.
    fn log(
        &self,
        event_type: &str,
        level: EventLevel,
        message: impl Into<String>,
        payload: Value,
    ) {
        let payload = match payload {
            Value::Object(map) => map,
            _ => EventPayload::new(),
        };
        let _ = self.events.log(event_type, level, message, payload);
    }

    fn log_failure(&self, event_type: &str, idea_id: Option<&str>, err: &AiError) {
        self.log(
            event_type,
            EventLevel::Error,
            err.user_message(),
            json!({"idea_id": idea_id, "code": err.code()}),
        )
    }

    fn log_blueprint_cached(&self, idea_id: &str) {
        self.log(
            "blueprint_cached",
            EventLevel::Success,
            "Blueprint cached",
            json!({"idea_id": idea_id}),
        )
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
