//! In-memory object store
//!
//! Emulates the listing semantics of an S3-compatible service (sorted keys,
//! prefix filtering, delimiter grouping into common prefixes, marker
//! pagination) without any network. Used by the test suites and handy for
//! offline experiments. Cloning a [`MemoryStore`] shares its contents, and
//! the store doubles as its own [`Connector`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::path::ObjectAddress;
use crate::traits::{
    Acl, Connector, Encryption, ListRequest, ListedObject, ListingPage, ObjectMetadata,
    ObjectReader, ObjectStore, PutRequest, Receipt,
};

/// Default number of entries per listing page
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// An object held by the in-memory store
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    pub metadata: HashMap<String, String>,
    pub acl: Acl,
    pub encryption: Option<Encryption>,
    pub etag: String,
    pub last_modified: jiff::Timestamp,
}

#[derive(Debug, Default)]
struct State {
    containers: BTreeSet<String>,
    objects: BTreeMap<(String, String), StoredObject>,
    failing_prefix: Option<String>,
}

#[derive(Debug)]
struct Inner {
    state: RwLock<State>,
    page_size: usize,
    connects: AtomicUsize,
    list_calls: AtomicUsize,
    head_calls: AtomicUsize,
}

/// In-memory [`ObjectStore`] and [`Connector`]
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store with the default page size
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Create an empty store that returns at most `page_size` entries per page
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(State::default()),
                page_size: page_size.max(1),
                connects: AtomicUsize::new(0),
                list_calls: AtomicUsize::new(0),
                head_calls: AtomicUsize::new(0),
            }),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.inner
            .state
            .read()
            .map_err(|_| Error::General("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.inner
            .state
            .write()
            .map_err(|_| Error::General("memory store lock poisoned".into()))
    }

    /// Create a container
    pub fn create_container(&self, name: &str) -> Result<()> {
        self.write()?.containers.insert(name.to_string());
        Ok(())
    }

    /// Store an object directly, creating the container if needed
    pub fn insert(&self, container: &str, key: &str, body: impl Into<Vec<u8>>) -> Result<()> {
        self.insert_with_metadata(container, key, body, HashMap::new())
    }

    /// Store an object with user metadata, creating the container if needed
    pub fn insert_with_metadata(
        &self,
        container: &str,
        key: &str,
        body: impl Into<Vec<u8>>,
        metadata: HashMap<String, String>,
    ) -> Result<()> {
        let body = body.into();
        let mut state = self.write()?;
        state.containers.insert(container.to_string());
        state.objects.insert(
            (container.to_string(), key.to_string()),
            StoredObject {
                etag: etag_of(&body),
                body,
                content_type: None,
                metadata,
                acl: Acl::Private,
                encryption: None,
                last_modified: jiff::Timestamp::now(),
            },
        );
        Ok(())
    }

    /// Snapshot of a stored object
    pub fn object(&self, container: &str, key: &str) -> Option<StoredObject> {
        self.read()
            .ok()?
            .objects
            .get(&(container.to_string(), key.to_string()))
            .cloned()
    }

    /// All keys in a container, sorted
    pub fn keys(&self, container: &str) -> Vec<String> {
        self.read()
            .map(|state| {
                state
                    .objects
                    .keys()
                    .filter(|(c, _)| c == container)
                    .map(|(_, k)| k.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Make every listing whose prefix starts with `prefix` fail
    pub fn fail_listing_under(&self, prefix: impl Into<String>) -> Result<()> {
        self.write()?.failing_prefix = Some(prefix.into());
        Ok(())
    }

    /// Number of sessions opened through the connector
    pub fn connect_count(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    /// Number of listing pages served
    pub fn list_count(&self) -> usize {
        self.inner.list_calls.load(Ordering::SeqCst)
    }

    /// Number of head requests served
    pub fn head_count(&self) -> usize {
        self.inner.head_calls.load(Ordering::SeqCst)
    }

    fn require_container(state: &State, container: &str) -> Result<()> {
        if state.containers.contains(container) {
            Ok(())
        } else {
            Err(Error::NotFound(format!("Container not found: {container}")))
        }
    }
}

fn etag_of(body: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_page(&self, request: &ListRequest) -> Result<ListingPage> {
        self.inner.list_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.read()?;
        Self::require_container(&state, &request.container)?;

        if let Some(failing) = &state.failing_prefix {
            if request.prefix.starts_with(failing.as_str()) {
                return Err(Error::Network(format!(
                    "injected listing failure for {}",
                    request.prefix
                )));
            }
        }

        let marker = request.marker.as_deref().unwrap_or("");
        let delimiter = request.delimiter.as_deref().filter(|d| !d.is_empty());
        let mut page = ListingPage::default();
        let mut last_entry: Option<String> = None;
        let mut count = 0usize;

        let candidates = state.objects.iter().filter(|((c, k), _)| {
            c.as_str() == request.container && k.starts_with(request.prefix.as_str())
        });

        for ((_, key), object) in candidates {
            let entry = match delimiter {
                Some(d) => {
                    let rest = &key[request.prefix.len()..];
                    rest.find(d)
                        .map(|pos| format!("{}{}", request.prefix, &rest[..pos + d.len()]))
                }
                None => None,
            };

            // Entries at or before the marker were served on an earlier page.
            let sort_key = entry.as_deref().unwrap_or(key.as_str());
            if !marker.is_empty() && sort_key <= marker {
                continue;
            }
            if entry.is_some() && entry == last_entry {
                continue;
            }

            if count == self.inner.page_size {
                page.truncated = true;
                page.continuation_marker = last_entry.clone();
                break;
            }

            match entry {
                Some(prefix) => {
                    page.common_prefixes.push(prefix.clone());
                    last_entry = Some(prefix);
                }
                None => {
                    let mut item =
                        ListedObject::new(&request.container, key, object.body.len() as i64);
                    item.last_modified = Some(object.last_modified);
                    item.etag = Some(object.etag.clone());
                    page.items.push(item);
                    last_entry = Some(key.clone());
                }
            }
            count += 1;
        }

        Ok(page)
    }

    async fn head_object(&self, container: &str, key: &str) -> Result<ObjectMetadata> {
        self.inner.head_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.read()?;
        let object = state
            .objects
            .get(&(container.to_string(), key.to_string()))
            .ok_or_else(|| Error::NotFound(format!("{container}/{key}")))?;

        Ok(ObjectMetadata {
            size: object.body.len() as i64,
            content_type: object.content_type.clone(),
            etag: Some(object.etag.clone()),
            last_modified: Some(object.last_modified),
            metadata: object.metadata.clone(),
        })
    }

    async fn get_object(&self, container: &str, key: &str) -> Result<ObjectReader> {
        let body = self
            .read()?
            .objects
            .get(&(container.to_string(), key.to_string()))
            .map(|o| o.body.clone())
            .ok_or_else(|| Error::NotFound(format!("{container}/{key}")))?;
        Ok(Box::pin(std::io::Cursor::new(body)))
    }

    async fn put_object(&self, request: PutRequest) -> Result<Receipt> {
        let mut state = self.write()?;
        Self::require_container(&state, &request.container)?;

        let etag = etag_of(&request.body);
        state.objects.insert(
            (request.container.clone(), request.key.clone()),
            StoredObject {
                body: request.body,
                content_type: request.content_type,
                metadata: request.metadata,
                acl: request.acl,
                encryption: request.encryption,
                etag: etag.clone(),
                last_modified: jiff::Timestamp::now(),
            },
        );

        let mut receipt = Receipt::new(request.container, request.key);
        receipt.etag = Some(etag);
        Ok(receipt)
    }

    async fn delete_object(&self, container: &str, key: &str) -> Result<Receipt> {
        let mut state = self.write()?;
        Self::require_container(&state, container)?;
        state
            .objects
            .remove(&(container.to_string(), key.to_string()));
        Ok(Receipt::new(container, key))
    }

    async fn copy_object(&self, src: &ObjectAddress, dst: &ObjectAddress) -> Result<Receipt> {
        let mut state = self.write()?;
        Self::require_container(&state, &dst.container)?;

        let mut object = state
            .objects
            .get(&(src.container.clone(), src.key.clone()))
            .cloned()
            .ok_or_else(|| Error::NotFound(src.to_string()))?;
        object.last_modified = jiff::Timestamp::now();
        let etag = object.etag.clone();
        state
            .objects
            .insert((dst.container.clone(), dst.key.clone()), object);

        let mut receipt = Receipt::new(&dst.container, &dst.key);
        receipt.etag = Some(etag);
        Ok(receipt)
    }

    async fn presign_get(&self, container: &str, key: &str, expires: Duration) -> Result<String> {
        Ok(format!(
            "memory://{container}/{key}?expires={}",
            expires.as_secs()
        ))
    }

    async fn container_location(&self, container: &str) -> Result<String> {
        let state = self.read()?;
        Self::require_container(&state, container)?;
        Ok("memory".to_string())
    }
}

#[async_trait]
impl Connector for MemoryStore {
    async fn connect(&self, _config: &ClientConfig) -> Result<Arc<dyn ObjectStore>> {
        self.inner.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(self.clone()))
    }
}
