//! Axum route handlers for persona creation and the account page.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::extraction::MediaType;
use crate::profiles::models::{ProfileView, PublicPersonaView};
use crate::profiles::writer::ProjectionOutcome;
use crate::provisioning::{PersonaRequest, ProfileUpdate, ProvisioningReport, ResumeUpload};
use crate::session::SessionContext;
use crate::state::AppState;

const GENERIC_BINARY_MIME: &str = "application/octet-stream";

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CredentialRequest {
    pub credential: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RetryAgentRequest {
    pub credential: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AccountUpdateResponse {
    pub profile: ProfileView,
    pub projection: ProjectionOutcome,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/personas
///
/// Multipart form: first_name, last_name, bio, resume_text, credential, is_public,
/// avatar_url and an optional `resume` file.
pub async fn handle_create_persona(
    State(state): State<AppState>,
    session: SessionContext,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ProvisioningReport>), AppError> {
    let request = read_persona_form(multipart).await?;
    info!(
        "Persona submission from user {} <{}>",
        session.user_id,
        session.email.as_deref().unwrap_or("unknown")
    );
    let report = state.provisioner.provision(&session, request).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

/// GET /api/v1/personas/public
///
/// Unauthenticated listing of public personas.
pub async fn handle_list_public(
    State(state): State<AppState>,
) -> Result<Json<Vec<PublicPersonaView>>, AppError> {
    let app_url = &state.provisioner.settings().agent_app_url;
    let personas = state
        .profiles
        .list_public()
        .await
        .map_err(|e| AppError::Persistence(e.to_string()))?
        .into_iter()
        .map(|p| PublicPersonaView::new(p, app_url))
        .collect();
    Ok(Json(personas))
}

/// GET /api/v1/account
pub async fn handle_get_account(
    State(state): State<AppState>,
    session: SessionContext,
) -> Result<Json<ProfileView>, AppError> {
    Ok(Json(state.provisioner.account(&session).await?))
}

/// PATCH /api/v1/account
pub async fn handle_update_account(
    State(state): State<AppState>,
    session: SessionContext,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<AccountUpdateResponse>, AppError> {
    let (profile, projection) = state.provisioner.update_profile(&session, update).await?;
    Ok(Json(AccountUpdateResponse {
        profile,
        projection,
    }))
}

/// PUT /api/v1/account/credential
///
/// The key is stored server-side and never returned.
pub async fn handle_put_credential(
    State(state): State<AppState>,
    session: SessionContext,
    Json(request): Json<CredentialRequest>,
) -> Result<StatusCode, AppError> {
    state
        .provisioner
        .store_credential(&session, SecretString::from(request.credential))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/account/agent
///
/// Creates the agent for a profile saved in "pending setup". The body is optional;
/// without one the stored credential is used.
pub async fn handle_retry_agent(
    State(state): State<AppState>,
    session: SessionContext,
    request: Option<Json<RetryAgentRequest>>,
) -> Result<Json<ProvisioningReport>, AppError> {
    let credential = request
        .and_then(|Json(request)| request.credential)
        .map(SecretString::from);
    let report = state.provisioner.retry_agent(&session, credential).await?;
    Ok(Json(report))
}

// ────────────────────────────────────────────────────────────────────────────
// Multipart form parsing
// ────────────────────────────────────────────────────────────────────────────

async fn read_persona_form(mut multipart: Multipart) -> Result<PersonaRequest, AppError> {
    let mut request = PersonaRequest::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Malformed form data: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "resume" {
            let file_name = field.file_name().map(str::to_string);
            let declared = field.content_type().map(str::to_string);
            let content = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Could not read resume: {e}")))?;
            // Browsers send an empty part when no file was chosen.
            if content.is_empty() && file_name.as_deref().unwrap_or_default().is_empty() {
                continue;
            }
            request.resume = Some(ResumeUpload {
                mime_type: resolve_mime(declared.as_deref(), file_name.as_deref()),
                file_name,
                content,
            });
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(format!("Could not read field '{name}': {e}")))?;

        match name.as_str() {
            "first_name" => request.first_name = value,
            "last_name" => request.last_name = Some(value),
            "bio" => request.bio = Some(value),
            "resume_text" => request.resume_text = Some(value),
            "credential" => request.credential = Some(SecretString::from(value)),
            "is_public" => request.is_public = parse_flag(&value),
            "avatar_url" => request.avatar_url = Some(value),
            _ => {}
        }
    }

    Ok(request)
}

/// Uses the declared MIME type unless it is missing or generic, then falls back to the extension.
fn resolve_mime(declared: Option<&str>, file_name: Option<&str>) -> String {
    match declared.filter(|m| !m.is_empty() && *m != GENERIC_BINARY_MIME) {
        Some(mime) => mime.to_string(),
        None => file_name
            .and_then(MediaType::from_file_name)
            .map(|m| m.mime().to_string())
            .unwrap_or_else(|| declared.unwrap_or(GENERIC_BINARY_MIME).to_string()),
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "on" | "1" | "yes"
    )
}
