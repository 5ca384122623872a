//! S3 backend implementation
//!
//! Maps the multipart protocol onto the AWS SDK for Rust. Works with AWS S3
//! and S3-compatible services (MinIO, DigitalOcean Spaces, LocalStack, ...).

use super::error::{BackendError, BackendResult};
use super::{CompletedUpload, MultipartBackend, Part, UploadTarget};
use crate::config::UploadConfig;
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client as AwsS3Client;
use bytes::Bytes;

/// S3 multipart backend
///
/// # Example
///
/// ```no_run
/// use chute::backend::S3Backend;
/// use chute::UploadConfig;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = UploadConfig::builder()
///         .bucket("my-bucket")
///         .endpoint("https://sfo2.digitaloceanspaces.com")
///         .credentials("ACCESS", "SECRET")
///         .build();
///
///     let backend = S3Backend::connect(&config).await;
///     Ok(())
/// }
/// ```
#[derive(Clone, Debug)]
pub struct S3Backend {
    client: AwsS3Client,
}

impl S3Backend {
    /// Build an S3 client from an upload configuration
    ///
    /// No request is sent here; credential problems surface on the first
    /// backend call.
    pub async fn connect(config: &UploadConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(RegionProviderChain::first_try(Region::new(
                config.region.clone(),
            )));

        if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
            let credentials = Credentials::new(
                access_key,
                secret_key,
                config.session_token.clone(),
                None,
                "chute-explicit",
            );
            loader = loader.credentials_provider(credentials);
        }

        let sdk_config = loader.load().await;

        // The part uploader owns the retry policy
        let mut builder =
            aws_sdk_s3::config::Builder::from(&sdk_config).retry_config(RetryConfig::disabled());

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(normalize_endpoint(endpoint));
        }
        if config.force_path_style {
            builder = builder.force_path_style(true);
        }

        Self {
            client: AwsS3Client::from_conf(builder.build()),
        }
    }

    /// Wrap an already configured SDK client
    pub fn from_client(client: AwsS3Client) -> Self {
        Self { client }
    }
}

/// Endpoints may be given as bare hosts ("nyc3.digitaloceanspaces.com")
fn normalize_endpoint(endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("https://{}", endpoint)
    }
}

#[async_trait]
impl MultipartBackend for S3Backend {
    async fn initiate(&self, bucket: &str, key: &str, content_type: &str) -> BackendResult<String> {
        let response = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(BackendError::from)?;

        response
            .upload_id()
            .map(|s| s.to_string())
            .ok_or_else(|| BackendError::InvalidResponse("no upload id returned".to_string()))
    }

    async fn upload_part(
        &self,
        target: &UploadTarget,
        part_number: i32,
        body: Bytes,
    ) -> BackendResult<String> {
        let content_length = body.len() as i64;

        let response = self
            .client
            .upload_part()
            .bucket(&target.bucket)
            .key(&target.key)
            .upload_id(&target.upload_id)
            .part_number(part_number)
            .content_length(content_length)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(BackendError::from)?;

        response
            .e_tag()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                BackendError::InvalidResponse(format!("no ETag returned for part {}", part_number))
            })
    }

    async fn complete_upload(
        &self,
        target: &UploadTarget,
        parts: &[Part],
    ) -> BackendResult<CompletedUpload> {
        let completed_parts: Vec<CompletedPart> = parts
            .iter()
            .map(|p| {
                CompletedPart::builder()
                    .part_number(p.part_number)
                    .e_tag(&p.etag)
                    .build()
            })
            .collect();

        let multipart_upload = CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();

        let response = self
            .client
            .complete_multipart_upload()
            .bucket(&target.bucket)
            .key(&target.key)
            .upload_id(&target.upload_id)
            .multipart_upload(multipart_upload)
            .send()
            .await
            .map_err(BackendError::from)?;

        Ok(CompletedUpload {
            bucket: response.bucket().unwrap_or(target.bucket.as_str()).to_string(),
            key: response.key().unwrap_or(target.key.as_str()).to_string(),
            location: response.location().map(|s| s.to_string()),
            etag: response.e_tag().map(|s| s.to_string()),
        })
    }

    async fn abort_upload(&self, target: &UploadTarget) -> BackendResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&target.bucket)
            .key(&target.key)
            .upload_id(&target.upload_id)
            .send()
            .await
            .map_err(BackendError::from)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(
            normalize_endpoint("nyc3.digitaloceanspaces.com"),
            "https://nyc3.digitaloceanspaces.com"
        );
        assert_eq!(
            normalize_endpoint("http://localhost:9000"),
            "http://localhost:9000"
        );
    }

    #[tokio::test]
    async fn test_connect_builds_client_without_network() {
        let config = UploadConfig::builder()
            .bucket("test-bucket")
            .credentials("access", "secret")
            .endpoint("http://localhost:9000")
            .force_path_style(true)
            .build();

        let backend = S3Backend::connect(&config).await;
        assert_eq!(
            backend.client.config().region().map(|r| r.as_ref()),
            Some("us-east-1")
        );
    }
}
