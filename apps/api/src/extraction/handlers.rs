use axum::{extract::State, Json};
use serde::Serialize;
use tracing::info;

use crate::errors::AppError;
use crate::extraction::{extract_with_deadline, Extraction, ExtractionError, ExtractionRequest};
use crate::session::SessionContext;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ExtractionResponse {
    pub text: Option<String>,
    pub empty_or_unreadable: bool,
}

impl From<Extraction> for ExtractionResponse {
    fn from(extraction: Extraction) -> Self {
        match extraction {
            Extraction::Text(text) => Self {
                text: Some(text),
                empty_or_unreadable: false,
            },
            Extraction::EmptyOrUnreadable => Self {
                text: None,
                empty_or_unreadable: true,
            },
        }
    }
}

/// POST /api/v1/documents/extract
///
/// Previews the text of a resume before a persona is submitted. Unsupported media
/// types are rejected with 415 before any call to the extraction service.
pub async fn handle_extract(
    State(state): State<AppState>,
    session: SessionContext,
    Json(request): Json<ExtractionRequest>,
) -> Result<Json<ExtractionResponse>, AppError> {
    let document = request.into_document().map_err(|e| match e {
        ExtractionError::UnsupportedMediaType(mime) => AppError::UnsupportedMediaType(format!(
            "'{mime}' is not supported; upload a PDF, DOC, DOCX or TXT file"
        )),
        other => AppError::BadRequest(other.to_string()),
    })?;

    info!(
        "Extracting {} document for user {}",
        document.media_type.extension(),
        session.user_id
    );

    let extraction = extract_with_deadline(
        state.extractor.as_ref(),
        &document,
        state.provisioner.settings().extraction_timeout,
    )
    .await
    .map_err(|e| AppError::Extraction(e.to_string()))?;

    Ok(Json(extraction.into()))
}
