//! Provisioning Orchestrator.
//!
//! Sequences validation, optional resume extraction, agent creation and profile
//! persistence for one user action. Every external call is bounded by a deadline;
//! no step is retried automatically.

use std::str::FromStr;

use bytes::Bytes;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod handlers;
pub mod orchestrator;
pub mod state;
pub mod validation;

pub use orchestrator::{Collaborators, Provisioner, ProvisioningReport, Settings};

/// What to do when the agent provider fails during provisioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentFailurePolicy {
    /// Save the profile without an agent; it can be retried from the account page.
    #[default]
    PersistPending,
    /// Fail the whole request and save nothing.
    Abort,
}

#[derive(Debug, Error)]
#[error("unknown agent failure policy '{0}'")]
pub struct UnknownPolicy(String);

impl FromStr for AgentFailurePolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "persist_pending" => Ok(AgentFailurePolicy::PersistPending),
            "abort" => Ok(AgentFailurePolicy::Abort),
            other => Err(UnknownPolicy(other.to_string())),
        }
    }
}

/// An uploaded resume file as received from the client.
#[derive(Clone)]
pub struct ResumeUpload {
    pub file_name: Option<String>,
    pub mime_type: String,
    pub content: Bytes,
}

/// Input of a signup-time or account-page persona creation.
#[derive(Clone, Default)]
pub struct PersonaRequest {
    pub first_name: String,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    /// Manually entered resume text; overrides any uploaded file.
    pub resume_text: Option<String>,
    pub resume: Option<ResumeUpload>,
    pub credential: Option<SecretString>,
    pub is_public: bool,
    pub avatar_url: Option<String>,
}

impl PersonaRequest {
    pub fn has_credential(&self) -> bool {
        self.credential
            .as_ref()
            .is_some_and(|c| !c.expose_secret().trim().is_empty())
    }
}

/// Owner edits from the account page. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub resume_text: Option<String>,
    pub is_public: Option<bool>,
    pub avatar_url: Option<String>,
}
