use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use crate::agents::idempotency::content_digest;
use crate::extraction::MediaType;

/// Keeps the original resume file so the owner can download it later.
#[async_trait]
pub trait ResumeArchive: Send + Sync {
    /// Stores the file and returns its object key.
    async fn store(
        &self,
        user_id: Uuid,
        media_type: MediaType,
        content: Bytes,
    ) -> anyhow::Result<String>;
}

/// Object key for a resume: content-addressed per user, so re-uploads overwrite.
pub fn resume_key(user_id: Uuid, media_type: MediaType, content: &[u8]) -> String {
    format!(
        "resumes/{}/{}.{}",
        user_id,
        content_digest(content),
        media_type.extension()
    )
}

pub struct S3ResumeArchive {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ResumeArchive {
    pub fn new(client: aws_sdk_s3::Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl ResumeArchive for S3ResumeArchive {
    async fn store(
        &self,
        user_id: Uuid,
        media_type: MediaType,
        content: Bytes,
    ) -> anyhow::Result<String> {
        let key = resume_key(user_id, media_type, &content);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(content))
            .content_type(media_type.mime())
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("S3 upload failed: {e}"))?;

        info!("Uploaded resume to s3://{}/{}", self.bucket, key);
        Ok(key)
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records uploads in memory; optionally fails every upload.
    #[derive(Default)]
    pub struct MemoryArchive {
        pub fail: bool,
        pub stored: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ResumeArchive for MemoryArchive {
        async fn store(
            &self,
            user_id: Uuid,
            media_type: MediaType,
            content: Bytes,
        ) -> anyhow::Result<String> {
            if self.fail {
                anyhow::bail!("bucket unavailable");
            }
            let key = resume_key(user_id, media_type, &content);
            self.stored.lock().unwrap().push(key.clone());
            Ok(key)
        }
    }
}
