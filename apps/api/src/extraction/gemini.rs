//! Remote extractor backed by the Gemini `generateContent` REST API.
//!
//! Extraction is read-only on the provider side, so 429 and 5xx replies are retried
//! with exponential backoff. The caller still bounds the whole call with a deadline.
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::extraction::prompts::EXTRACTION_PROMPT;
use crate::extraction::{Document, DocumentExtractor, Extraction, ExtractionError};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    InlineData { inline_data: InlineData<'a> },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenates the text parts of the first candidate.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

#[derive(Clone)]
pub struct GeminiExtractor {
    client: Client,
    api_key: SecretString,
    model: String,
}

impl GeminiExtractor {
    pub fn new(client: Client, api_key: SecretString, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
        }
    }

    fn endpoint(&self) -> String {
        format!("{GEMINI_API_URL}/{}:generateContent", self.model)
    }
}

#[async_trait]
impl DocumentExtractor for GeminiExtractor {
    async fn extract(&self, document: &Document) -> Result<Extraction, ExtractionError> {
        let request_body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::InlineData {
                        inline_data: InlineData {
                            mime_type: document.media_type.mime(),
                            data: &document.base64_data,
                        },
                    },
                    RequestPart::Text {
                        text: EXTRACTION_PROMPT,
                    },
                ],
            }],
        };

        let mut last_error: Option<ExtractionError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "Extraction attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(self.endpoint())
                .header("x-goog-api-key", self.api_key.expose_secret())
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(ExtractionError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Extraction API returned {}: {}", status, body);
                last_error = Some(ExtractionError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<GeminiError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(ExtractionError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let generated: GenerateResponse = response.json().await?;
            let text = generated.text();

            debug!(
                "Extracted {} characters from {} document",
                text.len(),
                document.media_type.extension()
            );

            return Ok(Extraction::from_output(&text));
        }

        Err(last_error.unwrap_or(ExtractionError::Api {
            status: 429,
            message: format!("rate limited after {MAX_RETRIES} attempts"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape_matches_generate_content() {
        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::InlineData {
                        inline_data: InlineData {
                            mime_type: "application/pdf",
                            data: "JVBERi0=",
                        },
                    },
                    RequestPart::Text { text: "extract" },
                ],
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["inline_data"]["mime_type"], "application/pdf");
        assert_eq!(parts[0]["inline_data"]["data"], "JVBERi0=");
        assert_eq!(parts[1]["text"], "extract");
    }

    #[test]
    fn test_response_text_joins_parts() {
        let resp: GenerateResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Jordan Lee\n" }, { "text": "Engineer" }] }
            }]
        }))
        .unwrap();
        assert_eq!(resp.text(), "Jordan Lee\nEngineer");
    }

    #[test]
    fn test_response_without_candidates_is_unreadable() {
        let resp: GenerateResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(Extraction::from_output(&resp.text()), Extraction::EmptyOrUnreadable);
    }

    #[test]
    fn test_endpoint_includes_model() {
        let extractor = GeminiExtractor::new(
            Client::new(),
            SecretString::from("k"),
            "gemini-2.0-flash".to_string(),
        );
        assert!(extractor
            .endpoint()
            .ends_with("/models/gemini-2.0-flash:generateContent"));
    }
}
