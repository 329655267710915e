//! Document Extractor — turns an uploaded resume into plain text.
//!
//! Media types are validated locally before any network call. The remote extractor
//! may report the document as empty or unreadable, which is surfaced as
//! `Extraction::EmptyOrUnreadable` rather than an empty string so callers never
//! mistake it for usable grounding text.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod fallback;
pub mod gemini;
pub mod handlers;
pub mod prompts;

use prompts::EMPTY_OR_UNREADABLE_MARKER;

/// Resume formats accepted for extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Pdf,
    Doc,
    Docx,
    Txt,
}

impl MediaType {
    pub const ALL: [MediaType; 4] = [MediaType::Pdf, MediaType::Doc, MediaType::Docx, MediaType::Txt];

    pub fn mime(&self) -> &'static str {
        match self {
            MediaType::Pdf => "application/pdf",
            MediaType::Doc => "application/msword",
            MediaType::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            MediaType::Txt => "text/plain",
        }
    }

    /// Guesses the media type from a file name, for uploads sent without a usable MIME type.
    pub fn from_file_name(file_name: &str) -> Option<MediaType> {
        let (_, ext) = file_name.rsplit_once('.')?;
        let ext = ext.to_ascii_lowercase();
        MediaType::ALL.into_iter().find(|m| m.extension() == ext)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            MediaType::Pdf => "pdf",
            MediaType::Doc => "doc",
            MediaType::Docx => "docx",
            MediaType::Txt => "txt",
        }
    }
}

impl FromStr for MediaType {
    type Err = ExtractionError;

    /// Parses a MIME string. Parameters such as `; charset=utf-8` are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let essence = s.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        MediaType::ALL
            .into_iter()
            .find(|m| m.mime() == essence)
            .ok_or_else(|| ExtractionError::UnsupportedMediaType(s.to_string()))
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// Result of a single extraction attempt. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Text(String),
    EmptyOrUnreadable,
}

impl Extraction {
    /// Classifies raw extractor output: blank output and the marker both mean unreadable.
    pub fn from_output(output: &str) -> Self {
        let trimmed = output.trim();
        if trimmed.is_empty() || trimmed == EMPTY_OR_UNREADABLE_MARKER {
            Extraction::EmptyOrUnreadable
        } else {
            Extraction::Text(trimmed.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("unsupported media type '{0}'")]
    UnsupportedMediaType(String),

    #[error("document content is missing")]
    MissingContent,

    #[error("document content is not valid base64")]
    InvalidEncoding,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("extraction service error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("extraction timed out after {0:?}")]
    Timeout(Duration),

    #[error("local extraction failed: {0}")]
    Local(String),
}

impl ExtractionError {
    /// True for errors raised by local validation, before any network call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ExtractionError::UnsupportedMediaType(_)
                | ExtractionError::MissingContent
                | ExtractionError::InvalidEncoding
        )
    }
}

/// A validated document ready to be sent to an extractor.
#[derive(Debug, Clone)]
pub struct Document {
    pub media_type: MediaType,
    pub base64_data: String,
}

impl Document {
    /// Validates a base64 payload and its declared MIME type.
    pub fn from_base64(mime_type: &str, base64_data: String) -> Result<Self, ExtractionError> {
        let media_type: MediaType = mime_type.parse()?;
        if base64_data.trim().is_empty() {
            return Err(ExtractionError::MissingContent);
        }
        base64::engine::general_purpose::STANDARD
            .decode(base64_data.trim())
            .map_err(|_| ExtractionError::InvalidEncoding)?;
        Ok(Self {
            media_type,
            base64_data: base64_data.trim().to_string(),
        })
    }

    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Result<Self, ExtractionError> {
        let media_type: MediaType = mime_type.parse()?;
        if bytes.is_empty() {
            return Err(ExtractionError::MissingContent);
        }
        Ok(Self {
            media_type,
            base64_data: base64::engine::general_purpose::STANDARD.encode(bytes),
        })
    }

    pub fn decode(&self) -> Result<Vec<u8>, ExtractionError> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.base64_data)
            .map_err(|_| ExtractionError::InvalidEncoding)
    }
}

/// Wire request for `POST /api/v1/documents/extract`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRequest {
    pub base64_data: String,
    pub mime_type: String,
}

impl ExtractionRequest {
    pub fn into_document(self) -> Result<Document, ExtractionError> {
        Document::from_base64(&self.mime_type, self.base64_data)
    }
}

#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, document: &Document) -> Result<Extraction, ExtractionError>;
}

/// Runs an extraction under a hard deadline.
pub async fn extract_with_deadline(
    extractor: &dyn DocumentExtractor,
    document: &Document,
    deadline: Duration,
) -> Result<Extraction, ExtractionError> {
    tokio::time::timeout(deadline, extractor.extract(document))
        .await
        .map_err(|_| ExtractionError::Timeout(deadline))?
}

#[cfg(test)]
pub mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Extractor with a fixed outcome that counts how often it was called.
    pub struct ScriptedExtractor {
        outcome: Result<Extraction, String>,
        pub calls: AtomicUsize,
    }

    impl ScriptedExtractor {
        pub fn text(text: &str) -> Self {
            Self {
                outcome: Ok(Extraction::Text(text.to_string())),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn unreadable() -> Self {
            Self {
                outcome: Ok(Extraction::EmptyOrUnreadable),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                outcome: Err(message.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DocumentExtractor for ScriptedExtractor {
        async fn extract(&self, _document: &Document) -> Result<Extraction, ExtractionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone().map_err(|message| ExtractionError::Api {
                status: 500,
                message,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_mime_types_parse() {
        for media in MediaType::ALL {
            assert_eq!(media.mime().parse::<MediaType>().unwrap(), media);
        }
    }

    #[test]
    fn test_mime_parameters_and_case_ignored() {
        assert_eq!(
            "Text/Plain; charset=utf-8".parse::<MediaType>().unwrap(),
            MediaType::Txt
        );
    }

    #[test]
    fn test_unsupported_mime_types_rejected() {
        for mime in ["image/png", "application/zip", "text/html", ""] {
            let err = mime.parse::<MediaType>().unwrap_err();
            assert!(err.is_validation(), "{mime} should fail validation");
        }
    }

    #[test]
    fn test_media_type_from_file_name() {
        assert_eq!(MediaType::from_file_name("Resume.PDF"), Some(MediaType::Pdf));
        assert_eq!(MediaType::from_file_name("cv.final.docx"), Some(MediaType::Docx));
        assert_eq!(MediaType::from_file_name("photo.jpg"), None);
        assert_eq!(MediaType::from_file_name("README"), None);
    }

    #[test]
    fn test_marker_is_not_text() {
        assert_eq!(
            Extraction::from_output("  [[EMPTY_OR_UNREADABLE_DOCUMENT]]\n"),
            Extraction::EmptyOrUnreadable
        );
        assert_eq!(Extraction::from_output("   "), Extraction::EmptyOrUnreadable);
    }

    #[test]
    fn test_real_output_is_trimmed_text() {
        assert_eq!(
            Extraction::from_output("\nJordan Lee\nEngineer\n"),
            Extraction::Text("Jordan Lee\nEngineer".to_string())
        );
    }

    #[test]
    fn test_document_rejects_bad_base64() {
        let err = Document::from_base64("application/pdf", "not base64!!".into()).unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidEncoding));
    }

    #[test]
    fn test_document_rejects_empty_payload() {
        let err = Document::from_base64("application/pdf", "  ".into()).unwrap_err();
        assert!(matches!(err, ExtractionError::MissingContent));
        let err = Document::from_bytes("text/plain", &[]).unwrap_err();
        assert!(matches!(err, ExtractionError::MissingContent));
    }

    #[test]
    fn test_media_type_checked_before_content() {
        let err = Document::from_base64("image/gif", "".into()).unwrap_err();
        assert!(matches!(err, ExtractionError::UnsupportedMediaType(_)));
    }

    #[test]
    fn test_from_bytes_round_trips_through_decode() {
        let doc = Document::from_bytes("text/plain", b"hello").unwrap();
        assert_eq!(doc.decode().unwrap(), b"hello");
    }

    #[test]
    fn test_extraction_request_uses_camel_case() {
        let req: ExtractionRequest = serde_json::from_value(serde_json::json!({
            "base64Data": "aGVsbG8=",
            "mimeType": "text/plain"
        }))
        .unwrap();
        let doc = req.into_document().unwrap();
        assert_eq!(doc.media_type, MediaType::Txt);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_elapses_on_hung_extractor() {
        struct Hung;

        #[async_trait]
        impl DocumentExtractor for Hung {
            async fn extract(&self, _document: &Document) -> Result<Extraction, ExtractionError> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Extraction::EmptyOrUnreadable)
            }
        }

        let doc = Document::from_bytes("text/plain", b"x").unwrap();
        let err = extract_with_deadline(&Hung, &doc, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Timeout(_)));
    }
}
