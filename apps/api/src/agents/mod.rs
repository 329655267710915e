//! Agent Provisioner — creates a conversational agent grounded in a person's resume.
//!
//! Provider calls are NOT idempotent: every successful call creates a new external
//! agent. Callers go through `idempotency::provisioning_key` and the recorded
//! provisions before calling `create_agent` again.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod elevenlabs;
pub mod idempotency;

/// Opaque identifier returned by the agent provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentHandle(pub String);

impl AgentHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the agent should be: who it introduces itself as, and what it knows.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    pub display_name: String,
    pub grounding_text: String,
}

impl AgentSpec {
    pub fn new(display_name: &str, grounding_text: &str) -> Result<Self, AgentError> {
        let display_name = display_name.trim();
        let grounding_text = grounding_text.trim();
        if display_name.is_empty() {
            return Err(AgentError::MissingInput("display_name"));
        }
        if grounding_text.is_empty() {
            return Err(AgentError::MissingInput("grounding_text"));
        }
        Ok(Self {
            display_name: display_name.to_string(),
            grounding_text: grounding_text.to_string(),
        })
    }

    /// The agent's opening line.
    pub fn first_message(&self) -> String {
        format!(
            "Hi, I'm {}, ask me about my professional or educational history.",
            self.display_name
        )
    }
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("missing required field: {0}")]
    MissingInput(&'static str),

    #[error("credential rejected by agent provider (status {0})")]
    Rejected(u16),

    #[error("agent provider error (status {status}): {message}")]
    Provider { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("agent provider response had no agent_id")]
    MissingAgentId,

    #[error("agent creation timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait AgentProvider: Send + Sync {
    async fn create_agent(
        &self,
        spec: &AgentSpec,
        credential: &SecretString,
    ) -> Result<AgentHandle, AgentError>;
}

/// Runs agent creation under a hard deadline. An elapsed deadline does not cancel
/// the agent on the provider side; the request is simply abandoned.
pub async fn create_with_deadline(
    provider: &dyn AgentProvider,
    spec: &AgentSpec,
    credential: &SecretString,
    deadline: Duration,
) -> Result<AgentHandle, AgentError> {
    tokio::time::timeout(deadline, provider.create_agent(spec, credential))
        .await
        .map_err(|_| AgentError::Timeout(deadline))?
}

/// Deep link that opens a conversation with the agent in the provider's app.
pub fn chat_link(app_url: &str, agent: &AgentHandle) -> String {
    format!(
        "{}/app/talk-to?agent_id={}",
        app_url.trim_end_matches('/'),
        agent.as_str()
    )
}
