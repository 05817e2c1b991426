//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectStore and Connector traits from
//! stowage-core.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{ObjectCannedAcl, ServerSideEncryption};
use tracing::debug;

use stowage_core::{
    ClientConfig, Connector, Encryption, Error, ListRequest, ListedObject, ListingPage,
    ObjectAddress, ObjectMetadata, ObjectReader, ObjectStore, PutRequest, Receipt, Result,
};

/// Region reported for buckets without a location constraint
const DEFAULT_LOCATION: &str = "us-east-1";

/// How an SDK failure is reported to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureKind {
    NotFound,
    Auth,
    Conflict,
    Other,
}

fn classify(code: Option<&str>, status: Option<u16>) -> FailureKind {
    match code {
        Some("NoSuchKey" | "NoSuchBucket" | "NotFound" | "NoSuchVersion") => FailureKind::NotFound,
        Some(
            "AccessDenied"
            | "InvalidAccessKeyId"
            | "SignatureDoesNotMatch"
            | "ExpiredToken"
            | "InvalidToken"
            | "AllAccessDisabled",
        ) => FailureKind::Auth,
        Some("PreconditionFailed" | "OperationAborted" | "ConditionalRequestConflict") => {
            FailureKind::Conflict
        }
        _ => match status {
            Some(404) => FailureKind::NotFound,
            Some(401 | 403) => FailureKind::Auth,
            Some(409 | 412) => FailureKind::Conflict,
            _ => FailureKind::Other,
        },
    }
}

fn map_sdk_error<E>(err: SdkError<E>, target: &str) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let status = err.raw_response().map(|r| r.status().as_u16());
    let kind = classify(err.code(), status);
    let detail = DisplayErrorContext(&err).to_string();
    match kind {
        FailureKind::NotFound => Error::NotFound(target.to_string()),
        FailureKind::Auth => Error::Auth(format!("{target}: {detail}")),
        FailureKind::Conflict => Error::Conflict(format!("{target}: {detail}")),
        FailureKind::Other => Error::Network(format!("{target}: {detail}")),
    }
}

fn timestamp(dt: &aws_smithy_types::DateTime) -> Option<jiff::Timestamp> {
    jiff::Timestamp::new(dt.secs(), dt.subsec_nanos() as i32).ok()
}

fn trim_etag(etag: &str) -> String {
    etag.trim_matches('"').to_string()
}

/// S3 client wrapper; one per session
pub struct S3Client {
    inner: aws_sdk_s3::Client,
}

impl S3Client {
    /// Create a new S3 client from a resolved configuration
    pub async fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        // Build credentials provider
        let credentials = aws_credential_types::Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None, // session token
            None, // expiry
            "stowage-static-credentials",
        );

        // Build SDK config
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(aws_config::Region::new(config.region.clone()));
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
        })
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn list_page(&self, request: &ListRequest) -> Result<ListingPage> {
        let target = format!("{}/{}", request.container, request.prefix);
        let response = self
            .inner
            .list_objects()
            .bucket(&request.container)
            .prefix(&request.prefix)
            .set_delimiter(request.delimiter.clone())
            .set_marker(request.marker.clone())
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &target))?;

        let items: Vec<ListedObject> = response
            .contents()
            .iter()
            .map(|object| {
                let mut item = ListedObject::new(
                    &request.container,
                    object.key().unwrap_or_default(),
                    object.size().unwrap_or(0),
                );
                item.last_modified = object.last_modified().and_then(timestamp);
                item.etag = object.e_tag().map(trim_etag);
                item
            })
            .collect();

        let common_prefixes = response
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(str::to_string))
            .collect();

        // NextMarker is only returned when a delimiter is set; fall back to
        // the last key otherwise.
        let truncated = response.is_truncated().unwrap_or(false);
        let continuation_marker = if truncated {
            response
                .next_marker()
                .map(str::to_string)
                .or_else(|| items.last().map(|item| item.key.clone()))
        } else {
            None
        };

        Ok(ListingPage {
            items,
            common_prefixes,
            continuation_marker,
            truncated,
        })
    }

    async fn head_object(&self, container: &str, key: &str) -> Result<ObjectMetadata> {
        let target = format!("{container}/{key}");
        let response = self
            .inner
            .head_object()
            .bucket(container)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &target))?;

        Ok(ObjectMetadata {
            size: response.content_length().unwrap_or(0),
            content_type: response.content_type().map(str::to_string),
            etag: response.e_tag().map(trim_etag),
            last_modified: response.last_modified().and_then(timestamp),
            metadata: response.metadata().cloned().unwrap_or_default(),
        })
    }

    async fn get_object(&self, container: &str, key: &str) -> Result<ObjectReader> {
        let target = format!("{container}/{key}");
        let response = self
            .inner
            .get_object()
            .bucket(container)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &target))?;

        Ok(Box::pin(response.body.into_async_read()))
    }

    async fn put_object(&self, request: PutRequest) -> Result<Receipt> {
        let target = format!("{}/{}", request.container, request.key);
        let mut builder = self
            .inner
            .put_object()
            .bucket(&request.container)
            .key(&request.key)
            .body(ByteStream::from(request.body))
            .acl(ObjectCannedAcl::from(request.acl.as_str()))
            .set_content_type(request.content_type);

        if !request.metadata.is_empty() {
            builder = builder.set_metadata(Some(request.metadata));
        }

        if let Some(Encryption::Kms { key_id }) = request.encryption {
            builder = builder
                .server_side_encryption(ServerSideEncryption::AwsKms)
                .ssekms_key_id(key_id);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &target))?;

        let mut receipt = Receipt::new(request.container, request.key);
        receipt.etag = response.e_tag().map(trim_etag);
        receipt.version_id = response.version_id().map(str::to_string);
        Ok(receipt)
    }

    async fn delete_object(&self, container: &str, key: &str) -> Result<Receipt> {
        let target = format!("{container}/{key}");
        let response = self
            .inner
            .delete_object()
            .bucket(container)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &target))?;

        let mut receipt = Receipt::new(container, key);
        receipt.version_id = response.version_id().map(str::to_string);
        Ok(receipt)
    }

    async fn copy_object(&self, src: &ObjectAddress, dst: &ObjectAddress) -> Result<Receipt> {
        // Build copy source: bucket/key
        let copy_source = format!("{}/{}", src.container, src.key);

        let response = self
            .inner
            .copy_object()
            .copy_source(&copy_source)
            .bucket(&dst.container)
            .key(&dst.key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &copy_source))?;

        let mut receipt = Receipt::new(&dst.container, &dst.key);
        receipt.etag = response
            .copy_object_result()
            .and_then(|r| r.e_tag())
            .map(trim_etag);
        receipt.version_id = response.version_id().map(str::to_string);
        Ok(receipt)
    }

    async fn presign_get(&self, container: &str, key: &str, expires: Duration) -> Result<String> {
        let target = format!("{container}/{key}");
        let presigning = PresigningConfig::expires_in(expires)
            .map_err(|e| Error::General(format!("Invalid presign expiry: {e}")))?;

        let request = self
            .inner
            .get_object()
            .bucket(container)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| map_sdk_error(e, &target))?;

        Ok(request.uri().to_string())
    }

    async fn container_location(&self, container: &str) -> Result<String> {
        let response = self
            .inner
            .get_bucket_location()
            .bucket(container)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, container))?;

        let location = response
            .location_constraint()
            .map(|c| c.as_str())
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_LOCATION);
        Ok(location.to_string())
    }
}

/// Opens a fresh [`S3Client`] per session
#[derive(Debug, Clone, Copy, Default)]
pub struct S3Connector;

#[async_trait]
impl Connector for S3Connector {
    async fn connect(&self, config: &ClientConfig) -> Result<Arc<dyn ObjectStore>> {
        debug!(
            region = %config.region,
            endpoint = config.endpoint.as_deref().unwrap_or("default"),
            "connecting to S3"
        );
        Ok(Arc::new(S3Client::new(config).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_code() {
        assert_eq!(classify(Some("NoSuchKey"), Some(404)), FailureKind::NotFound);
        assert_eq!(classify(Some("NoSuchBucket"), None), FailureKind::NotFound);
        assert_eq!(classify(Some("AccessDenied"), Some(403)), FailureKind::Auth);
        assert_eq!(classify(Some("SignatureDoesNotMatch"), None), FailureKind::Auth);
        assert_eq!(classify(Some("PreconditionFailed"), Some(412)), FailureKind::Conflict);
        assert_eq!(classify(Some("SlowDown"), Some(503)), FailureKind::Other);
    }

    #[test]
    fn test_classify_by_status_without_code() {
        // HEAD responses carry no body, so only the status is known.
        assert_eq!(classify(None, Some(404)), FailureKind::NotFound);
        assert_eq!(classify(None, Some(403)), FailureKind::Auth);
        assert_eq!(classify(None, Some(409)), FailureKind::Conflict);
        assert_eq!(classify(None, Some(500)), FailureKind::Other);
        assert_eq!(classify(None, None), FailureKind::Other);
    }

    #[test]
    fn test_timestamp_conversion() {
        let dt = aws_smithy_types::DateTime::from_secs_and_nanos(1_700_000_000, 500);
        let ts = timestamp(&dt).unwrap();
        assert_eq!(ts.as_second(), 1_700_000_000);
        assert_eq!(ts.subsec_nanosecond(), 500);
    }

    #[test]
    fn test_trim_etag() {
        assert_eq!(trim_etag("\"abc123\""), "abc123");
        assert_eq!(trim_etag("abc123"), "abc123");
    }

    #[tokio::test]
    async fn test_client_rejects_invalid_config() {
        let config = ClientConfig::new("", "secret");
        assert!(S3Client::new(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_presign_is_local() {
        let config = ClientConfig::new("AKIDEXAMPLE", "secret")
            .with_region("eu-west-1")
            .with_endpoint("http://localhost:9000");
        let client = S3Client::new(&config).await.unwrap();

        let url = client
            .presign_get("bucket", "dir/a.txt", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(url.contains("bucket"));
        assert!(url.contains("dir/a.txt"));
        assert!(url.contains("X-Amz-Expires=60"));
    }
}
