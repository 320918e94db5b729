use aws_config::Region;
use aws_credential_types::Credentials;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::primitives::ByteStream;
use flate2::write::GzEncoder;
use flate2::read::GzDecoder;
use flate2::Compression;
use std::io::{Read, Write};
use thiserror::Error;

use crate::models::Job;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("S3 upload error: {0}")]
    UploadError(String),
    #[error("S3 download error: {0}")]
    DownloadError(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("Gzip compression error: {0}")]
    CompressionError(#[from] std::io::Error),
    #[error("job (de)serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

fn job_key(job_id: &str, filename: &str) -> String {
    format!("jobs/{}/{}", job_id, filename)
}

/// Client for uploading content to R2/S3-compatible storage.
pub struct StorageClient {
    client: S3Client,
    bucket: String,
}

/// Configuration needed to create a StorageClient.
pub struct StorageConfig {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: String,
}

impl StorageClient {
    /// Create a new StorageClient configured for Cloudflare R2 (or any S3-compatible endpoint).
    pub fn new(config: StorageConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "r2-static",
        );

        let s3_config = S3ConfigBuilder::new()
            .endpoint_url(&config.endpoint)
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true)
            .behavior_version_latest()
            .build();

        let client = S3Client::from_conf(s3_config);

        StorageClient {
            client,
            bucket: config.bucket,
        }
    }

    /// Persist a job snapshot under `jobs/<job_id>/status.json`, tagging the
    /// object with status and a truncated URL so it's listable without a
    /// full body fetch.
    pub async fn save_job(&self, job: &Job) -> Result<(), StorageError> {
        let key = job_key(&job.job_id, "status.json");
        let body = serde_json::to_string(job)?;
        let compressed = gzip_bytes(body.as_bytes())?;
        let truncated_url: String = job.url.chars().take(100).collect();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(compressed))
            .content_type("application/json")
            .content_encoding("gzip")
            .metadata("status", format!("{:?}", job.status).to_lowercase())
            .metadata("url", truncated_url)
            .send()
            .await
            .map_err(|e| StorageError::UploadError(e.to_string()))?;

        Ok(())
    }

    /// Load a previously persisted job snapshot.
    pub async fn load_job(&self, job_id: &str) -> Result<Job, StorageError> {
        let key = job_key(job_id, "status.json");
        let bytes = self.get_object(&key).await?;
        let job: Job = serde_json::from_slice(&bytes)?;
        Ok(job)
    }

    /// Persist a result artifact (`llm.txt` or `llms-full.txt`) for a job.
    pub async fn save_result_file(
        &self,
        job_id: &str,
        filename: &str,
        content: &str,
    ) -> Result<(), StorageError> {
        let key = job_key(job_id, filename);
        let compressed = gzip_bytes(content.as_bytes())?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(compressed))
            .content_type("text/plain")
            .content_encoding("gzip")
            .send()
            .await
            .map_err(|e| StorageError::UploadError(e.to_string()))?;

        Ok(())
    }

    /// Load a previously persisted result artifact.
    pub async fn load_result_file(&self, job_id: &str, filename: &str) -> Result<String, StorageError> {
        let key = job_key(job_id, filename);
        let bytes = self.get_object(&key).await?;
        String::from_utf8(bytes).map_err(|e| StorageError::DownloadError(e.to_string()))
    }

    /// Fetch and gunzip the object at `key`.
    async fn get_object(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.to_string().to_lowercase().contains("nosuchkey") {
                    StorageError::NotFound(key.to_string())
                } else {
                    StorageError::DownloadError(e.to_string())
                }
            })?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::DownloadError(e.to_string()))?
            .into_bytes();

        gunzip_bytes(&bytes)
    }
}

/// Compress bytes using gzip.
fn gzip_bytes(data: &[u8]) -> Result<Vec<u8>, std::io::Error> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Decompress a gzip byte stream.
fn gunzip_bytes(data: &[u8]) -> Result<Vec<u8>, StorageError> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
