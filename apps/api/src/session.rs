//! Explicit session context.
//!
//! Handlers take a `SessionContext` argument; the caller's identity is never read
//! from ambient state. The extractor verifies the bearer token against the identity
//! provider through the `IdentityVerifier` carried in `AppState`.

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: Uuid,
    pub email: Option<String>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token rejected by identity provider")]
    InvalidToken,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("identity provider returned status {0}")]
    Provider(u16),
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<SessionContext, AuthError>;
}

/// Verifies access tokens by asking the identity provider who they belong to.
pub struct HttpIdentityVerifier {
    client: Client,
    auth_url: String,
    anon_key: SecretString,
}

#[derive(Debug, Deserialize)]
struct ProviderUser {
    id: Uuid,
    email: Option<String>,
}

impl HttpIdentityVerifier {
    pub fn new(client: Client, auth_url: String, anon_key: SecretString) -> Self {
        Self {
            client,
            auth_url: auth_url.trim_end_matches('/').to_string(),
            anon_key,
        }
    }
}

#[async_trait]
impl IdentityVerifier for HttpIdentityVerifier {
    async fn verify(&self, token: &str) -> Result<SessionContext, AuthError> {
        let response = self
            .client
            .get(format!("{}/auth/v1/user", self.auth_url))
            .bearer_auth(token)
            .header("apikey", self.anon_key.expose_secret())
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => {
                let user: ProviderUser = response.json().await?;
                debug!("Verified session for user {}", user.id);
                Ok(SessionContext {
                    user_id: user.id,
                    email: user.email,
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AuthError::InvalidToken),
            s => Err(AuthError::Provider(s.as_u16())),
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for SessionContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = bearer_token(parts).ok_or(AppError::Unauthorized)?;

        state.identity.verify(token).await.map_err(|e| match e {
            AuthError::InvalidToken => AppError::Unauthorized,
            // An outage must not look like a revoked session to the client.
            other => {
                warn!("Identity provider unavailable: {other}");
                AppError::IdentityUnavailable(other.to_string())
            }
        })
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::agents::testing::ScriptedProvider;
    use crate::extraction::testing::ScriptedExtractor;
    use crate::provisioning::testing::Harness;
    use axum::http::Request;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/v1/account");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_extracted() {
        let parts = parts_with(Some("Bearer abc.def"));
        assert_eq!(bearer_token(&parts), Some("abc.def"));
    }

    #[test]
    fn test_missing_header_yields_none() {
        assert_eq!(bearer_token(&parts_with(None)), None);
    }

    #[test]
    fn test_non_bearer_scheme_rejected() {
        assert_eq!(bearer_token(&parts_with(Some("Basic dXNlcjpwYXNz"))), None);
        assert_eq!(bearer_token(&parts_with(Some("Bearer   "))), None);
    }

    #[tokio::test]
    async fn test_static_verifier_maps_token_to_user() {
        let user = Uuid::new_v4();
        let verifier = testing::StaticVerifier::default().with_token("t1", user);
        assert_eq!(verifier.verify("t1").await.unwrap().user_id, user);
        assert!(matches!(
            verifier.verify("nope").await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_unknown_token_is_unauthorized() {
        let harness = Harness::new(
            ScriptedExtractor::text("unused"),
            ScriptedProvider::returning("abc123"),
        );
        let state = harness.app_state("good", Uuid::new_v4());
        let mut parts = parts_with(Some("Bearer bad"));

        let err = SessionContext::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[tokio::test]
    async fn test_provider_outage_is_unavailable() {
        let harness = Harness::new(
            ScriptedExtractor::text("unused"),
            ScriptedProvider::returning("abc123"),
        );
        let mut state = harness.app_state("good", Uuid::new_v4());
        state.identity = Arc::new(testing::UnavailableVerifier);
        let mut parts = parts_with(Some("Bearer good"));

        let err = SessionContext::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::IdentityUnavailable(_)));
    }
}
