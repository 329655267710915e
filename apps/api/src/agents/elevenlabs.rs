//! ElevenLabs conversational-agent provider.
//!
//! Creation is never retried here: a retry after a lost response would create a
//! second agent on the provider side.
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::agents::{AgentError, AgentHandle, AgentProvider, AgentSpec};

const CREATE_AGENT_PATH: &str = "/v1/convai/agents/create";

#[derive(Debug, Serialize)]
struct CreateAgentRequest<'a> {
    conversation_config: ConversationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct ConversationConfig<'a> {
    agent: AgentConfig<'a>,
}

#[derive(Debug, Serialize)]
struct AgentConfig<'a> {
    first_message: String,
    prompt: PromptConfig<'a>,
}

#[derive(Debug, Serialize)]
struct PromptConfig<'a> {
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateAgentResponse {
    agent_id: Option<String>,
}

impl<'a> CreateAgentRequest<'a> {
    fn from_spec(spec: &'a AgentSpec) -> Self {
        Self {
            conversation_config: ConversationConfig {
                agent: AgentConfig {
                    first_message: spec.first_message(),
                    prompt: PromptConfig {
                        prompt: &spec.grounding_text,
                    },
                },
            },
        }
    }
}

#[derive(Clone)]
pub struct ElevenLabsProvider {
    client: Client,
    base_url: String,
}

impl ElevenLabsProvider {
    pub fn new(client: Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl AgentProvider for ElevenLabsProvider {
    async fn create_agent(
        &self,
        spec: &AgentSpec,
        credential: &SecretString,
    ) -> Result<AgentHandle, AgentError> {
        info!("Creating agent for {}", spec.display_name);

        let response = self
            .client
            .post(format!("{}{CREATE_AGENT_PATH}", self.base_url))
            .header("xi-api-key", credential.expose_secret())
            .json(&CreateAgentRequest::from_spec(spec))
            .send()
            .await?;

        let status = response.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(AgentError::Rejected(status.as_u16()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Agent provider returned {status}: {body}");
            return Err(AgentError::Provider {
                status: status.as_u16(),
                message: body,
            });
        }

        let created: CreateAgentResponse = response.json().await?;
        let agent_id = created
            .agent_id
            .filter(|id| !id.trim().is_empty())
            .ok_or(AgentError::MissingAgentId)?;

        info!("Agent {agent_id} created for {}", spec.display_name);
        Ok(AgentHandle(agent_id))
    }
}
