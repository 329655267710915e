use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::extraction::{Document, DocumentExtractor, Extraction, ExtractionError, MediaType};

/// Wraps a remote extractor with local handling for formats Rust can read itself.
///
/// - TXT: decoded as UTF-8 without a network call; invalid UTF-8 goes to the remote.
/// - PDF: sent to the remote first; if that fails, text is pulled locally with
///   `pdf-extract`. The remote error is returned when the local pass finds nothing.
///
/// Remote calls get their own deadline, which must be shorter than the caller's,
/// so a hung remote still leaves time for the local pass.
pub struct LocalFallback<E> {
    remote: E,
    remote_deadline: Duration,
}

impl<E: DocumentExtractor> LocalFallback<E> {
    pub fn new(remote: E, remote_deadline: Duration) -> Self {
        Self {
            remote,
            remote_deadline,
        }
    }

    async fn extract_remote(&self, document: &Document) -> Result<Extraction, ExtractionError> {
        tokio::time::timeout(self.remote_deadline, self.remote.extract(document))
            .await
            .map_err(|_| ExtractionError::Timeout(self.remote_deadline))?
    }
}

#[async_trait]
impl<E: DocumentExtractor> DocumentExtractor for LocalFallback<E> {
    async fn extract(&self, document: &Document) -> Result<Extraction, ExtractionError> {
        match document.media_type {
            MediaType::Txt => {
                let bytes = document.decode()?;
                match String::from_utf8(bytes) {
                    Ok(text) => Ok(Extraction::from_output(&text)),
                    Err(_) => {
                        info!("Plain-text upload is not UTF-8, using remote extractor");
                        self.extract_remote(document).await
                    }
                }
            }
            MediaType::Pdf => match self.extract_remote(document).await {
                Ok(extraction) => Ok(extraction),
                Err(remote_err) if !remote_err.is_validation() => {
                    warn!("Remote PDF extraction failed ({remote_err}), trying local parser");
                    match extract_pdf_locally(document).await {
                        Ok(Extraction::Text(text)) => Ok(Extraction::Text(text)),
                        Ok(Extraction::EmptyOrUnreadable) => Err(remote_err),
                        Err(local_err) => {
                            warn!("Local PDF extraction failed: {local_err}");
                            Err(remote_err)
                        }
                    }
                }
                Err(e) => Err(e),
            },
            MediaType::Doc | MediaType::Docx => self.extract_remote(document).await,
        }
    }
}

async fn extract_pdf_locally(document: &Document) -> Result<Extraction, ExtractionError> {
    let bytes = document.decode()?;
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| ExtractionError::Local(e.to_string()))?
        .map_err(|e| ExtractionError::Local(e.to_string()))?;
    Ok(Extraction::from_output(&text))
}
