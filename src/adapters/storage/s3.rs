//! S3-compatible object store

use super::traits::ObjectStore;
use crate::config::StorageConfig;
use crate::domain::StorageError;
use async_trait::async_trait;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::Client;
use bytes::Bytes;
use secrecy::ExposeSecret;
use std::time::Duration;

/// Credentials provider name reported by the SDK
const PROVIDER_NAME: &str = "trade-backfill";

/// Object store backed by `aws-sdk-s3`
///
/// SDK-level retries are disabled; transient failures surface as
/// [`StorageError::Request`] and are retried by the pipeline's policy.
#[derive(Clone, Debug)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    endpoint: String,
}

impl S3ObjectStore {
    pub fn new(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.expose_secret().as_str(),
            None,
            None,
            PROVIDER_NAME,
        );

        let timeouts = TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(config.timeout_seconds))
            .build();

        let s3_config = aws_sdk_s3::Config::builder()
            .endpoint_url(config.endpoint.clone())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .behavior_version(BehaviorVersion::latest())
            .force_path_style(config.force_path_style)
            .timeout_config(timeouts)
            .retry_config(RetryConfig::disabled())
            .build();

        Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            endpoint: config.endpoint.clone(),
        }
    }
}

fn is_http_not_found<E>(err: &SdkError<E>) -> bool {
    err.raw_response()
        .map(|response| response.status().as_u16() == 404)
        .unwrap_or(false)
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let no_such_key = e
                    .as_service_error()
                    .map(|service| service.is_no_such_key())
                    .unwrap_or(false);
                if no_such_key || is_http_not_found(&e) {
                    StorageError::NotFound(key.to_string())
                } else {
                    StorageError::Request(format!(
                        "GET {key} failed: {}",
                        DisplayErrorContext(&e)
                    ))
                }
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Request(format!("Reading body of {key} failed: {e}")))?;

        let bytes = data.into_bytes();
        tracing::debug!(key, bytes = bytes.len(), "Object downloaded");
        Ok(bytes)
    }

    async fn object_exists(&self, key: &str) -> Result<bool, StorageError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let not_found = e
                    .as_service_error()
                    .map(|service| service.is_not_found())
                    .unwrap_or(false);
                if not_found || is_http_not_found(&e) {
                    Ok(false)
                } else {
                    Err(StorageError::Request(format!(
                        "HEAD {key} failed: {}",
                        DisplayErrorContext(&e)
                    )))
                }
            }
        }
    }

    fn describe(&self) -> String {
        format!("s3://{}@{}", self.bucket, self.endpoint)
    }
}
