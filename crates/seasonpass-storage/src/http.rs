use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, Stream};
use futures::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client};
use std::pin::Pin;
use std::time::Duration;

use seasonpass_core::models::{FileSource, LocalFile};
use seasonpass_core::{BackendError, ObjectUploader, ProgressFn, TransferError};

const CHUNK_SIZE: usize = 64 * 1024;

type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + Sync>>;

/// PUTs file bytes to a pre-signed URL.
///
/// Progress is reported per chunk handed to the connection, so the final
/// `(total, total)` call fires just before the store answers.
#[derive(Clone, Debug)]
pub struct HttpObjectUploader {
    client: Client,
}

impl HttpObjectUploader {
    pub fn new(timeout: Duration) -> Result<Self, TransferError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransferError::Backend(BackendError::Network(e.to_string())))?;
        Ok(Self { client })
    }

    /// Reuse an existing client (shared connection pool).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn byte_stream(
        file: &LocalFile,
    ) -> Result<ByteStream, TransferError> {
        match &file.source {
            FileSource::Path(path) => {
                let handle = tokio::fs::File::open(path).await.map_err(|e| {
                    TransferError::Io(format!("Failed to open {}: {}", path.display(), e))
                })?;
                Ok(Box::pin(tokio_util::io::ReaderStream::with_capacity(
                    handle, CHUNK_SIZE,
                )))
            }
            FileSource::Memory(data) => {
                let data = data.clone();
                let chunks: Vec<std::io::Result<Bytes>> = (0..data.len())
                    .step_by(CHUNK_SIZE)
                    .map(|start| Ok(data.slice(start..(start + CHUNK_SIZE).min(data.len()))))
                    .collect();
                Ok(Box::pin(stream::iter(chunks)))
            }
        }
    }
}

#[async_trait]
impl ObjectUploader for HttpObjectUploader {
    async fn upload(
        &self,
        write_url: &str,
        file: &LocalFile,
        on_progress: ProgressFn,
    ) -> Result<(), TransferError> {
        let total = file.size;
        let source = Self::byte_stream(file).await?;

        on_progress(0, total);
        let mut sent: u64 = 0;
        let progress = on_progress.clone();
        let counted = source.map(move |chunk| {
            if let Ok(bytes) = &chunk {
                sent += bytes.len() as u64;
                progress(sent.min(total), total);
            }
            chunk
        });

        let start = std::time::Instant::now();

        let response = self
            .client
            .put(write_url)
            .header(CONTENT_TYPE, file.content_type_or_default())
            .header(CONTENT_LENGTH, total)
            .body(Body::wrap_stream(counted))
            .send()
            .await
            .map_err(|e| {
                let err = if e.is_timeout() {
                    BackendError::Timeout(e.to_string())
                } else {
                    BackendError::Network(e.to_string())
                };
                TransferError::Backend(err)
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .ok()
                .filter(|body| !body.trim().is_empty())
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("upload rejected").to_string());
            tracing::warn!(
                file_name = %file.name,
                status = status.as_u16(),
                "Object store rejected upload"
            );
            return Err(TransferError::Backend(BackendError::Status {
                status: status.as_u16(),
                message,
            }));
        }

        on_progress(total, total);

        tracing::debug!(
            file_name = %file.name,
            size_bytes = total,
            duration_ms = start.elapsed().as_millis() as u64,
            "Object store upload successful"
        );

        Ok(())
    }
}
