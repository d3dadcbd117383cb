//! Document Extraction Service — turns an uploaded PDF into plain text.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("could not parse document: {0}")]
    Parse(String),

    #[error("document contains no extractable text")]
    Empty,

    #[error("extraction task failed: {0}")]
    Task(String),
}

#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract_text(&self, document: &[u8]) -> Result<String, ExtractError>;
}

/// PDF text extraction via `pdf-extract`, run on the blocking pool since
/// parsing is CPU-bound.
pub struct PdfExtractor;

#[async_trait]
impl DocumentExtractor for PdfExtractor {
    async fn extract_text(&self, document: &[u8]) -> Result<String, ExtractError> {
        let bytes = document.to_vec();
        let text = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem(&bytes).map_err(|e| ExtractError::Parse(e.to_string()))
        })
        .await
        .map_err(|e| ExtractError::Task(e.to_string()))??;

        if text.trim().is_empty() {
            return Err(ExtractError::Empty);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_garbage_bytes_fail_to_parse() {
        let result = PdfExtractor.extract_text(b"not a pdf at all").await;
        assert!(matches!(result, Err(ExtractError::Parse(_))));
    }
}
