use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::extraction::{Document, ExtractionError};
use crate::provisioning::PersonaRequest;

pub const MIN_NAME_CHARS: usize = 2;
pub const CREDENTIAL_REQUIRED: &str = "An agent provider API key is required";

/// Field name -> message, in stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn insert(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    #[cfg(test)]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    /// Lists the offending field names, e.g. `first_name, credential`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.keys().map(String::as_str).collect();
        f.write_str(&names.join(", "))
    }
}

pub fn has_text(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

pub fn check_first_name(errors: &mut FieldErrors, first_name: &str) {
    if first_name.trim().chars().count() < MIN_NAME_CHARS {
        errors.insert(
            "first_name",
            format!("Must be at least {MIN_NAME_CHARS} characters"),
        );
    }
}

pub fn check_avatar_url(errors: &mut FieldErrors, avatar_url: Option<&str>) {
    if let Some(url) = avatar_url.map(str::trim).filter(|u| !u.is_empty()) {
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            errors.insert("avatar_url", "Must be an http(s) URL");
        }
    }
}

/// Checks a persona request before any network call.
///
/// Returns the validated resume document when one was uploaded.
///
/// Only looks at the request itself; whether a stored credential can stand in for a
/// missing one is decided afterwards by [`require_credential`].
pub fn validate_request(request: &PersonaRequest) -> Result<Option<Document>, FieldErrors> {
    let mut errors = FieldErrors::default();

    check_first_name(&mut errors, &request.first_name);
    check_avatar_url(&mut errors, request.avatar_url.as_deref());

    let document = match &request.resume {
        Some(upload) => match Document::from_bytes(&upload.mime_type, &upload.content) {
            Ok(document) => Some(document),
            Err(ExtractionError::UnsupportedMediaType(_)) => {
                errors.insert("resume", "Upload a PDF, DOC, DOCX or TXT file");
                None
            }
            Err(_) => {
                errors.insert("resume", "The uploaded file is empty");
                None
            }
        },
        None => None,
    };

    let has_grounding = has_text(request.resume_text.as_deref())
        || request.resume.is_some()
        || has_text(request.bio.as_deref());
    if !has_grounding {
        errors.insert(
            "grounding",
            "Upload a resume or enter your background in the text box",
        );
    }

    errors.into_result(document)
}

/// A credential must come with the request or already be stored for the user.
pub fn require_credential(supplied: bool, stored: bool) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();
    if !supplied && !stored {
        errors.insert("credential", CREDENTIAL_REQUIRED);
    }
    errors.into_result(())
}
