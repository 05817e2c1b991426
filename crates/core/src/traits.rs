//! ObjectStore trait definition
//!
//! These traits define the narrow interface the engine needs from an
//! object-storage backend. The engine never talks to an SDK directly: a
//! [`Connector`] opens a session ([`ObjectStore`]) per operation and the
//! session is dropped when the operation finishes.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;
use crate::error::Result;
use crate::path::ObjectAddress;

/// Streaming object body
pub type ObjectReader = Pin<Box<dyn tokio::io::AsyncRead + Send>>;

/// A single item returned by a listing call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListedObject {
    /// Container the object lives in
    pub container: String,

    /// Object key
    pub key: String,

    /// Size in bytes
    pub size: i64,

    /// Last modified timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<jiff::Timestamp>,

    /// ETag (usually MD5 for single-part uploads)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl ListedObject {
    /// Create a new ListedObject
    pub fn new(container: impl Into<String>, key: impl Into<String>, size: i64) -> Self {
        Self {
            container: container.into(),
            key: key.into(),
            size,
            last_modified: None,
            etag: None,
        }
    }

    /// Address of this object
    pub fn address(&self) -> ObjectAddress {
        ObjectAddress::new(&self.container, &self.key)
    }
}

// Identity is (container, key); size and timestamps do not take part.
impl PartialEq for ListedObject {
    fn eq(&self, other: &Self) -> bool {
        self.container == other.container && self.key == other.key
    }
}

impl Eq for ListedObject {}

impl std::hash::Hash for ListedObject {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.container.hash(state);
        self.key.hash(state);
    }
}

/// Parameters of one listing call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    /// Container to list
    pub container: String,

    /// Key prefix to filter by
    pub prefix: String,

    /// Delimiter for grouping (usually "/")
    pub delimiter: Option<String>,

    /// Continuation marker from the previous page
    pub marker: Option<String>,
}

/// One page of a paginated listing response
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    /// Objects on this page, in key order
    pub items: Vec<ListedObject>,

    /// Sub-prefixes grouped by the delimiter
    pub common_prefixes: Vec<String>,

    /// Marker to request the next page
    pub continuation_marker: Option<String>,

    /// Whether more pages follow
    pub truncated: bool,
}

/// Metadata returned by a head request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectMetadata {
    /// Size in bytes
    pub size: i64,

    /// Content type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// ETag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    /// Last modified timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<jiff::Timestamp>,

    /// User-defined metadata
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Canned access control list applied on upload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Acl {
    #[default]
    Private,
    PublicRead,
    PublicReadWrite,
    AuthenticatedRead,
    BucketOwnerRead,
    BucketOwnerFullControl,
}

impl Acl {
    /// Canned ACL header value
    pub const fn as_str(self) -> &'static str {
        match self {
            Acl::Private => "private",
            Acl::PublicRead => "public-read",
            Acl::PublicReadWrite => "public-read-write",
            Acl::AuthenticatedRead => "authenticated-read",
            Acl::BucketOwnerRead => "bucket-owner-read",
            Acl::BucketOwnerFullControl => "bucket-owner-full-control",
        }
    }
}

impl std::str::FromStr for Acl {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "private" => Ok(Acl::Private),
            "public-read" => Ok(Acl::PublicRead),
            "public-read-write" => Ok(Acl::PublicReadWrite),
            "authenticated-read" => Ok(Acl::AuthenticatedRead),
            "bucket-owner-read" => Ok(Acl::BucketOwnerRead),
            "bucket-owner-full-control" => Ok(Acl::BucketOwnerFullControl),
            other => Err(crate::Error::General(format!("Unknown ACL: {other}"))),
        }
    }
}

/// Server-side encryption directive attached to a put
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encryption {
    /// Server-side encryption with a KMS-managed key
    Kms { key_id: String },
}

/// A fully prepared upload
#[derive(Debug, Clone, Default)]
pub struct PutRequest {
    pub container: String,
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    /// User metadata, keys already normalized
    pub metadata: HashMap<String, String>,
    pub acl: Acl,
    pub encryption: Option<Encryption>,
}

/// Acknowledgement of a mutating call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub container: String,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
}

impl Receipt {
    /// Receipt without etag or version
    pub fn new(container: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            key: key.into(),
            etag: None,
            version_id: None,
        }
    }
}

/// One authenticated session against an object store
///
/// This trait is implemented by the S3 adapter and by the in-memory store,
/// and can be mocked for testing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one page of a prefix listing
    async fn list_page(&self, request: &ListRequest) -> Result<ListingPage>;

    /// Get object metadata; `Error::NotFound` when the object is missing
    async fn head_object(&self, container: &str, key: &str) -> Result<ObjectMetadata>;

    /// Open the object body as a stream
    async fn get_object(&self, container: &str, key: &str) -> Result<ObjectReader>;

    /// Store an object
    async fn put_object(&self, request: PutRequest) -> Result<Receipt>;

    /// Delete an object
    async fn delete_object(&self, container: &str, key: &str) -> Result<Receipt>;

    /// Server-side copy
    async fn copy_object(&self, src: &ObjectAddress, dst: &ObjectAddress) -> Result<Receipt>;

    /// Pre-signed GET URL
    async fn presign_get(&self, container: &str, key: &str, expires: Duration) -> Result<String>;

    /// Region/location of a container; fails when the container is missing
    async fn container_location(&self, container: &str) -> Result<String>;
}

/// Opens sessions from a resolved configuration
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new session
    async fn connect(&self, config: &ClientConfig) -> Result<Arc<dyn ObjectStore>>;
}
