//! Rendering Service — fills the resume template and stores the document in
//! S3/MinIO under the deterministic `(identity, job_id)` key.
//!
//! Storage is last-write-wins: retrying a whole pipeline run after a partial
//! failure overwrites the previous artifact instead of accumulating copies.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

pub mod template;

pub use template::document_key;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("unknown template '{0}'")]
    UnknownTemplate(String),

    #[error("bad generation payload: {0}")]
    BadPayload(String),

    #[error("artifact storage failed: {0}")]
    Storage(String),

    #[error("no rendered document for this user/job")]
    NotRendered,
}

#[async_trait]
pub trait RenderService: Send + Sync {
    /// Renders the structured result through the named template and stores the
    /// document under the key derived from `(identity, job_id)`.
    async fn render_and_store(
        &self,
        template_key: &str,
        identity: &str,
        job_id: i64,
        result: &Value,
    ) -> Result<(), RenderError>;

    /// Retrieves the stored document by re-deriving its key.
    async fn fetch_document(&self, identity: &str, job_id: i64) -> Result<Bytes, RenderError>;
}

pub struct S3Renderer {
    s3: S3Client,
    bucket: String,
}

impl S3Renderer {
    pub fn new(s3: S3Client, bucket: String) -> Self {
        Self { s3, bucket }
    }
}

#[async_trait]
impl RenderService for S3Renderer {
    async fn render_and_store(
        &self,
        template_key: &str,
        identity: &str,
        job_id: i64,
        result: &Value,
    ) -> Result<(), RenderError> {
        let html = template::fill_template(template_key, result)?;

        let key = document_key(identity, job_id);
        self.s3
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(html.into_bytes()))
            .content_type("text/html")
            .send()
            .await
            .map_err(|e| RenderError::Storage(format!("S3 upload failed: {e}")))?;

        info!("Rendered document stored at s3://{}/{}", self.bucket, key);
        Ok(())
    }

    async fn fetch_document(&self, identity: &str, job_id: i64) -> Result<Bytes, RenderError> {
        let key = document_key(identity, job_id);
        let object = self
            .s3
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|_| RenderError::NotRendered)?;

        let data = object
            .body
            .collect()
            .await
            .map_err(|e| RenderError::Storage(format!("S3 read failed: {e}")))?;

        Ok(data.into_bytes())
    }
}
