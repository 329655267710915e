use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::agents::idempotency::provisioning_key;
use crate::agents::{
    chat_link, create_with_deadline, AgentError, AgentHandle, AgentProvider, AgentSpec,
};
use crate::errors::AppError;
use crate::extraction::{extract_with_deadline, Document, DocumentExtractor, Extraction};
use crate::profiles::models::{ProfileRow, ProfileView};
use crate::profiles::names::{default_avatar_url, generate_persona_name};
use crate::profiles::store::ProfileStore;
use crate::profiles::writer::{persist_persona, PersistOutcome, ProjectionOutcome};
use crate::provisioning::state::{ProvisioningState, StateTrail};
use crate::provisioning::validation::{
    check_avatar_url, check_first_name, has_text, require_credential, validate_request,
    FieldErrors, CREDENTIAL_REQUIRED,
};
use crate::provisioning::{AgentFailurePolicy, PersonaRequest, ProfileUpdate};
use crate::secrets::{CredentialKind, SecretStore};
use crate::session::SessionContext;
use crate::storage::ResumeArchive;

const WARN_UNREADABLE: &str =
    "The document appears to be empty or could not be read; paste your resume text instead";
const WARN_EXTRACTION_FAILED: &str =
    "We could not read the uploaded document; paste your resume text instead";
const WARN_ARCHIVE_FAILED: &str = "Your resume file could not be saved";
const WARN_AGENT_PENDING: &str =
    "Failed to create agent; your profile was saved and you can retry from your account page";
const WARN_LISTING_LAGGING: &str = "Your public listing will update shortly";
const NO_GROUNDING: &str = "No usable resume or biography text";

/// External collaborators the workflow talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn DocumentExtractor>,
    pub agents: Arc<dyn AgentProvider>,
    pub profiles: Arc<dyn ProfileStore>,
    pub secrets: Arc<dyn SecretStore>,
    pub archive: Arc<dyn ResumeArchive>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub policy: AgentFailurePolicy,
    pub extraction_timeout: Duration,
    pub agent_timeout: Duration,
    pub agent_app_url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AgentStatus {
    Ready {
        agent_id: String,
        chat_link: String,
        /// True when an agent recorded earlier was used instead of creating one.
        reused: bool,
    },
    Pending {
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ProvisioningReport {
    pub state: ProvisioningState,
    pub trail: Vec<ProvisioningState>,
    pub profile: ProfileView,
    pub agent: AgentStatus,
    pub projection: ProjectionOutcome,
    pub warnings: Vec<String>,
    pub notice: String,
}

/// Result of the agent step: the agent to store on the profile and how we got it.
enum AgentStep {
    Created(AgentHandle),
    Reused(AgentHandle),
    Failed(String),
}

pub struct Provisioner {
    deps: Collaborators,
    settings: Settings,
}

impl Provisioner {
    pub fn new(deps: Collaborators, settings: Settings) -> Self {
        Self { deps, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Creates or replaces the caller's persona.
    pub async fn provision(
        &self,
        session: &SessionContext,
        request: PersonaRequest,
    ) -> Result<ProvisioningReport, AppError> {
        let user_id = session.user_id;
        let mut trail = StateTrail::new(user_id);
        let mut warnings = Vec::new();

        trail.advance(ProvisioningState::Validating);
        // Request-local checks come first so an invalid form touches no store.
        let document = match validate_request(&request) {
            Ok(document) => document,
            Err(fields) => {
                trail.fail();
                return Err(AppError::Validation(fields));
            }
        };
        let supplied = request.has_credential();
        let stored = !supplied && self.has_stored_credential(user_id, &mut trail).await?;
        if let Err(fields) = require_credential(supplied, stored) {
            trail.fail();
            return Err(AppError::Validation(fields));
        }
        let existing = self.load_profile(user_id, &mut trail).await?;

        if let Some(credential) = request.credential.as_ref().filter(|_| supplied) {
            self.store_credential_inner(user_id, credential, &mut trail)
                .await?;
        }

        let mut extracted = None;
        if let (Some(document), Some(upload)) = (document.as_ref(), request.resume.as_ref()) {
            if has_text(request.resume_text.as_deref()) {
                info!(
                    "Manual resume text supplied; skipping extraction of {}",
                    upload.file_name.as_deref().unwrap_or("upload")
                );
            } else {
                trail.advance(ProvisioningState::ExtractingText);
                extracted = self.extract(user_id, document, &mut warnings).await;
            }
        }

        let resume_text = trimmed(request.resume_text.as_deref())
            .or(extracted)
            .or_else(|| existing.as_ref().and_then(|p| p.resume_text.clone()));
        let bio = trimmed(request.bio.as_deref());
        let grounding = resume_text.clone().or_else(|| bio.clone());

        trail.advance(ProvisioningState::CreatingAgent);
        let first_name = request.first_name.trim().to_string();
        let step = match grounding {
            Some(text) => {
                self.create_agent(user_id, &first_name, &text, request.credential.as_ref())
                    .await
            }
            None => AgentStep::Failed(NO_GROUNDING.to_string()),
        };

        let (agent, created_now, pending_reason) = match step {
            AgentStep::Created(agent) => (Some(agent), true, None),
            AgentStep::Reused(agent) => (Some(agent), false, None),
            AgentStep::Failed(reason) => match self.settings.policy {
                AgentFailurePolicy::Abort => {
                    trail.fail();
                    return Err(AppError::AgentCreation(reason));
                }
                AgentFailurePolicy::PersistPending => {
                    if let Some(previous) = existing.as_ref().and_then(ProfileRow::agent) {
                        // The old agent is grounded in text that is being replaced.
                        warn!("Unlinking agent {previous} from user {user_id}: no agent matches the new profile");
                    }
                    warnings.push(WARN_AGENT_PENDING.to_string());
                    (None, false, Some(reason))
                }
            },
        };

        trail.advance(ProvisioningState::PersistingProfile);
        // Archived only once the profile is going to be written.
        let mut resume_key = existing.as_ref().and_then(|p| p.resume_key.clone());
        if let (Some(document), Some(upload)) = (document.as_ref(), request.resume.as_ref()) {
            match self
                .deps
                .archive
                .store(user_id, document.media_type, upload.content.clone())
                .await
            {
                Ok(key) => resume_key = Some(key),
                Err(e) => {
                    warn!("Resume upload failed for user {user_id}: {e:#}");
                    warnings.push(WARN_ARCHIVE_FAILED.to_string());
                }
            }
        }

        let persona_name = existing
            .as_ref()
            .map(|p| p.random_persona_name.clone())
            .unwrap_or_else(|| generate_persona_name(&mut rand::thread_rng()));
        let avatar_url = trimmed(request.avatar_url.as_deref())
            .or_else(|| existing.as_ref().map(|p| p.avatar_url.clone()))
            .unwrap_or_else(|| default_avatar_url(&persona_name));
        let now = Utc::now();

        let profile = ProfileRow {
            user_id,
            first_name,
            last_name: trimmed(request.last_name.as_deref()),
            bio,
            resume_text,
            resume_key,
            avatar_url,
            is_public: request.is_public,
            agent_id: agent.as_ref().map(|a| a.0.clone()),
            random_persona_name: persona_name,
            created_at: existing.as_ref().map(|p| p.created_at).unwrap_or(now),
            updated_at: now,
        };

        let outcome = match persist_persona(self.deps.profiles.as_ref(), &profile).await {
            Ok(outcome) => outcome,
            Err(e) => {
                trail.fail();
                if created_now {
                    if let Some(agent) = &agent {
                        // No compensating delete exists on the provider side.
                        warn!("Agent {agent} for user {user_id} is orphaned: profile write failed");
                    }
                }
                return Err(AppError::Persistence(e.to_string()));
            }
        };

        trail.advance(ProvisioningState::Done);
        let agent_status = self.agent_status(agent.as_ref(), !created_now, pending_reason);
        self.report(trail, outcome, agent_status, warnings, true).await
    }

    /// Re-runs agent creation for an existing profile, e.g. after a pending setup.
    pub async fn retry_agent(
        &self,
        session: &SessionContext,
        credential: Option<SecretString>,
    ) -> Result<ProvisioningReport, AppError> {
        let user_id = session.user_id;
        let mut trail = StateTrail::new(user_id);

        trail.advance(ProvisioningState::Validating);
        let mut profile = self
            .load_profile(user_id, &mut trail)
            .await?
            .ok_or_else(|| {
                AppError::NotFound("Create your profile before setting up an agent".to_string())
            })?;
        let credential = credential.filter(|c| has_text(Some(c.expose_secret())));
        let has_stored =
            credential.is_none() && self.has_stored_credential(user_id, &mut trail).await?;

        let mut errors = FieldErrors::default();
        check_first_name(&mut errors, &profile.first_name);
        if credential.is_none() && !has_stored {
            errors.insert("credential", CREDENTIAL_REQUIRED);
        }
        let grounding = profile
            .resume_text
            .clone()
            .filter(|t| has_text(Some(t)))
            .or_else(|| profile.bio.clone().filter(|t| has_text(Some(t))));
        if grounding.is_none() {
            errors.insert(
                "grounding",
                "Add resume text or a biography before creating an agent",
            );
        }
        if let Err(fields) = errors.into_result(()) {
            trail.fail();
            return Err(AppError::Validation(fields));
        }

        if let Some(credential) = credential.as_ref() {
            self.store_credential_inner(user_id, credential, &mut trail)
                .await?;
        }

        trail.advance(ProvisioningState::CreatingAgent);
        let grounding = grounding.unwrap_or_default();
        let (agent, reused) = match self
            .create_agent(user_id, &profile.first_name, &grounding, credential.as_ref())
            .await
        {
            AgentStep::Created(agent) => (agent, false),
            AgentStep::Reused(agent) => (agent, true),
            AgentStep::Failed(reason) => {
                trail.fail();
                return Err(AppError::AgentCreation(reason));
            }
        };

        profile.agent_id = Some(agent.0.clone());
        trail.advance(ProvisioningState::PersistingProfile);
        let outcome = match persist_persona(self.deps.profiles.as_ref(), &profile).await {
            Ok(outcome) => outcome,
            Err(e) => {
                trail.fail();
                if !reused {
                    warn!("Agent {agent} for user {user_id} is orphaned: profile write failed");
                }
                return Err(AppError::Persistence(e.to_string()));
            }
        };

        trail.advance(ProvisioningState::Done);
        let agent_status = self.agent_status(Some(&agent), reused, None);
        self.report(trail, outcome, agent_status, Vec::new(), false)
            .await
    }

    /// Applies owner edits and keeps the public listing in step with visibility.
    pub async fn update_profile(
        &self,
        session: &SessionContext,
        update: ProfileUpdate,
    ) -> Result<(ProfileView, ProjectionOutcome), AppError> {
        let user_id = session.user_id;
        let mut profile = self
            .deps
            .profiles
            .get_profile(user_id)
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?
            .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

        let mut errors = FieldErrors::default();
        if let Some(first_name) = update.first_name.as_deref() {
            check_first_name(&mut errors, first_name);
        }
        check_avatar_url(&mut errors, update.avatar_url.as_deref());
        errors.into_result(()).map_err(AppError::Validation)?;

        if let Some(first_name) = update.first_name {
            profile.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = update.last_name {
            profile.last_name = trimmed(Some(&last_name));
        }
        if let Some(bio) = update.bio {
            profile.bio = trimmed(Some(&bio));
        }
        if let Some(resume_text) = update.resume_text {
            profile.resume_text = trimmed(Some(&resume_text));
        }
        if let Some(is_public) = update.is_public {
            profile.is_public = is_public;
        }
        if let Some(avatar_url) = update.avatar_url {
            profile.avatar_url = trimmed(Some(&avatar_url))
                .unwrap_or_else(|| default_avatar_url(&profile.random_persona_name));
        }

        let outcome = persist_persona(self.deps.profiles.as_ref(), &profile)
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?;
        let has_credential = self.has_credential_flag(user_id).await;

        Ok((
            ProfileView::new(outcome.profile, has_credential, &self.settings.agent_app_url),
            outcome.projection,
        ))
    }

    /// The caller's own profile.
    pub async fn account(&self, session: &SessionContext) -> Result<ProfileView, AppError> {
        let profile = self
            .deps
            .profiles
            .get_profile(session.user_id)
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?
            .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;
        let has_credential = self.has_credential_flag(session.user_id).await;
        Ok(ProfileView::new(
            profile,
            has_credential,
            &self.settings.agent_app_url,
        ))
    }

    /// Stores (or replaces) the caller's agent provider key.
    pub async fn store_credential(
        &self,
        session: &SessionContext,
        credential: SecretString,
    ) -> Result<(), AppError> {
        if !has_text(Some(credential.expose_secret())) {
            let mut fields = FieldErrors::default();
            fields.insert("credential", CREDENTIAL_REQUIRED);
            return Err(AppError::Validation(fields));
        }
        self.deps
            .secrets
            .put(session.user_id, CredentialKind::Agent, &credential)
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))
    }

    async fn load_profile(
        &self,
        user_id: Uuid,
        trail: &mut StateTrail,
    ) -> Result<Option<ProfileRow>, AppError> {
        self.deps.profiles.get_profile(user_id).await.map_err(|e| {
            trail.fail();
            AppError::Persistence(e.to_string())
        })
    }

    async fn has_stored_credential(
        &self,
        user_id: Uuid,
        trail: &mut StateTrail,
    ) -> Result<bool, AppError> {
        self.deps
            .secrets
            .has(user_id, CredentialKind::Agent)
            .await
            .map_err(|e| {
                trail.fail();
                AppError::Persistence(e.to_string())
            })
    }

    async fn has_credential_flag(&self, user_id: Uuid) -> bool {
        self.deps
            .secrets
            .has(user_id, CredentialKind::Agent)
            .await
            .unwrap_or_else(|e| {
                warn!("Could not check stored credential for user {user_id}: {e}");
                false
            })
    }

    async fn store_credential_inner(
        &self,
        user_id: Uuid,
        credential: &SecretString,
        trail: &mut StateTrail,
    ) -> Result<(), AppError> {
        self.deps
            .secrets
            .put(user_id, CredentialKind::Agent, credential)
            .await
            .map_err(|e| {
                trail.fail();
                AppError::Persistence(e.to_string())
            })
    }

    /// Never fatal: returns usable text or `None` with a warning pushed.
    async fn extract(
        &self,
        user_id: Uuid,
        document: &Document,
        warnings: &mut Vec<String>,
    ) -> Option<String> {
        match extract_with_deadline(
            self.deps.extractor.as_ref(),
            document,
            self.settings.extraction_timeout,
        )
        .await
        {
            Ok(Extraction::Text(text)) => {
                info!("Extracted {} characters for user {user_id}", text.len());
                Some(text)
            }
            Ok(Extraction::EmptyOrUnreadable) => {
                warn!("Uploaded document for user {user_id} was empty or unreadable");
                warnings.push(WARN_UNREADABLE.to_string());
                None
            }
            Err(e) => {
                warn!("Extraction failed for user {user_id}: {e}");
                warnings.push(WARN_EXTRACTION_FAILED.to_string());
                None
            }
        }
    }

    /// Reuses a previously created agent for identical content, otherwise calls the provider.
    async fn create_agent(
        &self,
        user_id: Uuid,
        display_name: &str,
        grounding: &str,
        supplied: Option<&SecretString>,
    ) -> AgentStep {
        let spec = match AgentSpec::new(display_name, grounding) {
            Ok(spec) => spec,
            Err(e) => return AgentStep::Failed(e.to_string()),
        };

        let key = provisioning_key(user_id, &spec.display_name, &spec.grounding_text);
        match self.deps.profiles.find_provision(user_id, &key).await {
            Ok(Some(agent)) => {
                info!("Reusing agent {agent} for user {user_id}");
                return AgentStep::Reused(agent);
            }
            Ok(None) => {}
            Err(e) => warn!("Provision lookup failed for user {user_id}: {e}"),
        }

        let credential = match supplied.filter(|c| has_text(Some(c.expose_secret()))) {
            Some(credential) => credential.clone(),
            None => match self.deps.secrets.get(user_id, CredentialKind::Agent).await {
                Ok(Some(credential)) => credential,
                Ok(None) => return AgentStep::Failed("no agent provider credential".to_string()),
                Err(e) => return AgentStep::Failed(e.to_string()),
            },
        };

        match create_with_deadline(
            self.deps.agents.as_ref(),
            &spec,
            &credential,
            self.settings.agent_timeout,
        )
        .await
        {
            Ok(agent) => {
                if let Err(e) = self
                    .deps
                    .profiles
                    .record_provision(user_id, &key, &agent)
                    .await
                {
                    warn!("Could not record agent {agent} for user {user_id}: {e}");
                }
                AgentStep::Created(agent)
            }
            Err(e) => {
                match &e {
                    AgentError::Rejected(status) => {
                        error!("Agent provider rejected credential for user {user_id} ({status})")
                    }
                    other => error!("Agent creation failed for user {user_id}: {other}"),
                }
                AgentStep::Failed(e.to_string())
            }
        }
    }

    fn agent_status(
        &self,
        agent: Option<&AgentHandle>,
        reused: bool,
        pending_reason: Option<String>,
    ) -> AgentStatus {
        match (agent, pending_reason) {
            (Some(agent), None) => AgentStatus::Ready {
                agent_id: agent.0.clone(),
                chat_link: chat_link(&self.settings.agent_app_url, agent),
                reused,
            },
            (_, reason) => AgentStatus::Pending {
                reason: reason.unwrap_or_else(|| NO_GROUNDING.to_string()),
            },
        }
    }

    async fn report(
        &self,
        trail: StateTrail,
        outcome: PersistOutcome,
        agent: AgentStatus,
        mut warnings: Vec<String>,
        created: bool,
    ) -> Result<ProvisioningReport, AppError> {
        if matches!(outcome.projection, ProjectionOutcome::Lagging(_)) {
            warnings.push(WARN_LISTING_LAGGING.to_string());
        }
        let notice = match (&agent, created) {
            (AgentStatus::Ready { .. }, true) => "Persona created",
            (AgentStatus::Ready { .. }, false) => "Agent ready",
            (AgentStatus::Pending { .. }, _) => "Profile saved; agent setup pending",
        }
        .to_string();

        let has_credential = self.has_credential_flag(outcome.profile.user_id).await;
        Ok(ProvisioningReport {
            state: trail.current(),
            trail: trail.states().to_vec(),
            profile: ProfileView::new(outcome.profile, has_credential, &self.settings.agent_app_url),
            agent,
            projection: outcome.projection,
            warnings,
            notice,
        })
    }
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
