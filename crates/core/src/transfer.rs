//! Upload and download pipeline
//!
//! Downloads check for existence first so that a missing object surfaces as
//! [`Error::ObjectNotFound`] rather than as whatever the backend reports.
//! Uploads accept raw bytes, readers, typed values, local files, local
//! directories (mirrored entry by entry) or literal text. Every upload is a
//! single put; there is no multipart path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use futures::{StreamExt, TryStreamExt, stream};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use crate::codec;
use crate::config::{ClientConfig, SerializationFormat};
use crate::error::{Error, Result};
use crate::listing::DEFAULT_DELIMITER;
use crate::path::{self, ObjectAddress, SEPARATOR};
use crate::search::normalize_metadata;
use crate::storage::Storage;
use crate::traits::{Acl, Encryption, ObjectReader, PutRequest, Receipt};

/// Re-encodes a text payload before upload
type Reencode = fn(&str, SerializationFormat) -> Result<String>;

/// Options applied to every object an upload call creates
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// User metadata; keys are normalized before sending
    pub metadata: HashMap<String, String>,
    /// Canned ACL
    pub acl: Acl,
    /// Explicit content type
    pub content_type: Option<String>,
}

impl UploadOptions {
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_acl(mut self, acl: Acl) -> Self {
        self.acl = acl;
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Files under `dir` paired with their target addresses
///
/// Symlinks are followed; anything that is neither a file nor a directory
/// is skipped.
fn collect_files(
    dir: PathBuf,
    dest: ObjectAddress,
) -> BoxFuture<'static, Result<Vec<(PathBuf, ObjectAddress)>>> {
    Box::pin(async move {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().into_string().map_err(|name| {
                Error::InvalidPath(format!("Non UTF-8 file name: {}", name.to_string_lossy()))
            })?;
            let target = dest.join(&name);
            let meta = match tokio::fs::metadata(entry.path()).await {
                Ok(meta) => meta,
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };

            if meta.is_dir() {
                files.extend(collect_files(entry.path(), target).await?);
            } else if meta.is_file() {
                files.push((entry.path(), target));
            } else {
                warn!(path = %entry.path().display(), "skipping special file");
            }
        }
        Ok(files)
    })
}

/// Key prefix stripped from listed keys when writing them locally
///
/// Everything up to and including the last separator of the listing prefix.
fn local_base(prefix: &str) -> String {
    let address = path::resolve(prefix);
    let listing = address.listing_prefix(path::is_directory(prefix));
    match listing.rfind(SEPARATOR) {
        Some(i) => listing[..=i].to_string(),
        None => String::new(),
    }
}

/// Decode as `T` and encode again, pretty-printed
fn reencode<T>(text: &str, format: SerializationFormat) -> Result<String>
where
    T: Serialize + DeserializeOwned,
{
    let value: T = codec::deserialize(text, format)?;
    codec::serialize(&value, format)
}

impl Storage {
    /// Open an object body as a stream
    pub async fn download_stream(&self, path: &str) -> Result<ObjectReader> {
        let address = path::resolve(path);
        if !self.object_exists(path).await {
            return Err(Error::ObjectNotFound(address.to_string()));
        }

        let (_, store) = self.session().await?;
        store.get_object(&address.container, &address.key).await
    }

    /// Whole object body
    pub async fn download_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let mut reader = self.download_stream(path).await?;
        let mut body = Vec::new();
        reader.read_to_end(&mut body).await?;
        Ok(body)
    }

    /// Object body as UTF-8 text
    pub async fn download_text(&self, path: &str) -> Result<String> {
        Ok(String::from_utf8(self.download_bytes(path).await?)?)
    }

    /// Object body decoded with the configured serialization format
    pub async fn download_as<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let config = self.config()?;
        let text = self.download_text(path).await?;
        codec::deserialize(&text, config.serialization_format)
    }

    /// Store raw bytes
    ///
    /// Returns `None` without contacting the store when the path lacks a
    /// container or key.
    pub async fn upload_bytes(
        &self,
        path: &str,
        body: Vec<u8>,
        opts: &UploadOptions,
    ) -> Result<Option<Receipt>> {
        let address = path::resolve(path);
        if !address.is_complete() {
            debug!(path, "upload skipped: incomplete address");
            return Ok(None);
        }
        let config = self.config()?;
        self.put(&config, address, body, opts, None).await.map(Some)
    }

    /// Store everything a reader yields
    pub async fn upload_reader<R>(
        &self,
        path: &str,
        mut reader: R,
        opts: &UploadOptions,
    ) -> Result<Option<Receipt>>
    where
        R: AsyncRead + Unpin + Send,
    {
        if !path::resolve(path).is_complete() {
            debug!(path, "upload skipped: incomplete address");
            return Ok(None);
        }
        let mut body = Vec::new();
        reader.read_to_end(&mut body).await?;
        self.upload_bytes(path, body, opts).await
    }

    /// Store a value encoded with the configured serialization format
    pub async fn upload_value<T>(
        &self,
        path: &str,
        value: &T,
        opts: &UploadOptions,
    ) -> Result<Option<Receipt>>
    where
        T: Serialize + ?Sized + Sync,
    {
        let address = path::resolve(path);
        if !address.is_complete() {
            debug!(path, "upload skipped: incomplete address");
            return Ok(None);
        }
        let config = self.config()?;
        let text = codec::serialize(value, config.serialization_format)?;
        self.put(
            &config,
            address,
            text.into_bytes(),
            opts,
            Some(config.serialization_format),
        )
        .await
        .map(Some)
    }

    /// Upload from a local directory, a local file, or literal text
    ///
    /// A directory is mirrored entry by entry below `path` (recursing into
    /// subdirectories); no object is created for `path` itself. A file is
    /// uploaded as its raw bytes. Any other `source` is uploaded as literal
    /// UTF-8 content.
    pub async fn upload(&self, path: &str, source: &str, opts: &UploadOptions) -> Result<Vec<Receipt>> {
        self.upload_source(path, source, opts, None).await
    }

    /// Like [`Storage::upload`], with every payload validated as `T`
    ///
    /// File contents and literals are read as UTF-8, decoded as `T` with the
    /// configured format and uploaded re-serialized.
    pub async fn upload_as<T>(&self, path: &str, source: &str, opts: &UploadOptions) -> Result<Vec<Receipt>>
    where
        T: Serialize + DeserializeOwned,
    {
        self.upload_source(path, source, opts, Some(reencode::<T> as Reencode))
            .await
    }

    async fn upload_source(
        &self,
        path: &str,
        source: &str,
        opts: &UploadOptions,
        encode: Option<Reencode>,
    ) -> Result<Vec<Receipt>> {
        let address = path::resolve(path);
        if address.container.is_empty() {
            debug!(path, "upload skipped: no container");
            return Ok(Vec::new());
        }
        let config = self.config()?;
        let local = Path::new(source);

        match tokio::fs::metadata(local).await {
            Ok(meta) if meta.is_dir() => {
                let receipts = self
                    .mirror_dir(&config, local.to_path_buf(), address, opts, encode)
                    .await?;
                debug!(source, path, objects = receipts.len(), "directory mirrored");
                Ok(receipts)
            }
            _ if !address.is_complete() => {
                debug!(path, "upload skipped: incomplete address");
                Ok(Vec::new())
            }
            Ok(meta) if meta.is_file() => {
                let body = tokio::fs::read(local).await?;
                let receipt = self.put_encoded(&config, address, body, opts, encode).await?;
                Ok(vec![receipt])
            }
            _ => {
                let body = source.as_bytes().to_vec();
                let receipt = self.put_encoded(&config, address, body, opts, encode).await?;
                Ok(vec![receipt])
            }
        }
    }

    /// Upload every file under `dir`, at most `max_concurrency` at a time
    async fn mirror_dir(
        &self,
        config: &ClientConfig,
        dir: PathBuf,
        dest: ObjectAddress,
        opts: &UploadOptions,
        encode: Option<Reencode>,
    ) -> Result<Vec<Receipt>> {
        let files = collect_files(dir, dest).await?;
        stream::iter(files)
            .map(|(source, target)| async move {
                let body = tokio::fs::read(&source).await?;
                self.put_encoded(config, target, body, opts, encode).await
            })
            .buffer_unordered(config.max_concurrency.max(1))
            .try_collect()
            .await
    }

    async fn put_encoded(
        &self,
        config: &ClientConfig,
        address: ObjectAddress,
        body: Vec<u8>,
        opts: &UploadOptions,
        encode: Option<Reencode>,
    ) -> Result<Receipt> {
        match encode {
            Some(encode) => {
                let text = String::from_utf8(body)?;
                let format = config.serialization_format;
                let body = encode(&text, format)?.into_bytes();
                self.put(config, address, body, opts, Some(format)).await
            }
            None => self.put(config, address, body, opts, None).await,
        }
    }

    async fn put(
        &self,
        config: &ClientConfig,
        address: ObjectAddress,
        body: Vec<u8>,
        opts: &UploadOptions,
        format: Option<SerializationFormat>,
    ) -> Result<Receipt> {
        let content_type = opts
            .content_type
            .clone()
            .or_else(|| mime_guess::from_path(&address.key).first_raw().map(str::to_string))
            .or_else(|| format.map(|f| f.content_type().to_string()));

        let request = PutRequest {
            container: address.container,
            key: address.key,
            body,
            content_type,
            metadata: normalize_metadata(&opts.metadata),
            acl: opts.acl,
            encryption: config.kms_key_id.clone().map(|key_id| Encryption::Kms { key_id }),
        };
        debug!(
            container = %request.container,
            key = %request.key,
            size = request.body.len(),
            "uploading object"
        );

        let store = self.open(config).await?;
        store.put_object(request).await
    }

    /// Write every object below a path into a local directory
    ///
    /// Keys are placed relative to the directory the path names: `a/b/`
    /// strips `a/b/`, while a bare `a/b` strips only `a/`, so keys that
    /// merely share the prefix (`a/bc.txt`) keep their whole name. Keys
    /// that would escape `local_dir` are skipped. Returns the files written.
    pub async fn download_tree(&self, prefix: &str, local_dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let local_dir = local_dir.as_ref();
        let config = self.config()?;
        let base = local_base(prefix);
        let objects = self
            .list_objects(prefix, Some(DEFAULT_DELIMITER), true)
            .await?;

        let mut jobs = Vec::with_capacity(objects.len());
        for object in objects {
            let relative = object
                .key
                .strip_prefix(base.as_str())
                .unwrap_or(&object.key)
                .trim_start_matches(SEPARATOR);
            if relative.split(SEPARATOR).any(|part| part == ".." || part == ".") {
                warn!(key = %object.key, "skipping key that escapes the target directory");
                continue;
            }
            let target = local_dir.join(relative);
            jobs.push((object.address().to_string(), target));
        }

        let mut written: Vec<PathBuf> = stream::iter(jobs)
            .map(|(source, target)| async move {
                if let Some(parent) = target.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                let mut reader = self.download_stream(&source).await?;
                let mut file = tokio::fs::File::create(&target).await?;
                tokio::io::copy(&mut reader, &mut file).await?;
                Ok::<_, Error>(target)
            })
            .buffer_unordered(config.max_concurrency.max(1))
            .try_collect()
            .await?;

        written.sort();
        debug!(prefix, files = written.len(), "tree downloaded");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::traits::{Connector, ListRequest, ListingPage, ObjectMetadata, ObjectStore};
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    fn storage_with(store: &MemoryStore, config: ClientConfig) -> Storage {
        Storage::with_instance_config(Arc::new(store.clone()), config)
    }

    fn storage(store: &MemoryStore) -> Storage {
        storage_with(store, ClientConfig::new("ak", "sk"))
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Settings {
        name: String,
        retries: u32,
    }

    #[tokio::test]
    async fn test_download_text_and_bytes() {
        let store = MemoryStore::new();
        store.insert("bucket", "a.txt", "hello").unwrap();
        let storage = storage(&store);

        assert_eq!(storage.download_bytes("bucket/a.txt").await.unwrap(), b"hello");
        assert_eq!(storage.download_text("bucket/a.txt").await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_download_missing_object() {
        let store = MemoryStore::new();
        store.create_container("bucket").unwrap();
        let result = storage(&store).download_text("bucket/missing.txt").await;
        assert!(matches!(result, Err(Error::ObjectNotFound(_))));
    }

    #[tokio::test]
    async fn test_download_text_rejects_invalid_utf8() {
        let store = MemoryStore::new();
        store.insert("bucket", "bin", vec![0xff, 0xfe, 0x00]).unwrap();
        let result = storage(&store).download_text("bucket/bin").await;
        assert!(matches!(result, Err(Error::Encoding(_))));
    }

    #[tokio::test]
    async fn test_download_as_uses_configured_format() {
        let store = MemoryStore::new();
        store
            .insert("bucket", "s.xml", "<Settings><name>a</name><retries>3</retries></Settings>")
            .unwrap();
        let storage = storage_with(
            &store,
            ClientConfig::new("ak", "sk").with_format(SerializationFormat::Xml),
        );

        let settings: Settings = storage.download_as("bucket/s.xml").await.unwrap();
        assert_eq!(settings, Settings { name: "a".into(), retries: 3 });
    }

    #[tokio::test]
    async fn test_upload_incomplete_address_is_noop() {
        let store = MemoryStore::new();
        let storage = storage(&store);
        let opts = UploadOptions::default();

        assert!(storage.upload_bytes("bucket", b"x".to_vec(), &opts).await.unwrap().is_none());
        assert!(storage.upload_bytes("", b"x".to_vec(), &opts).await.unwrap().is_none());
        assert!(storage.upload_value("bucket/", &1u32, &opts).await.unwrap().is_none());
        assert!(storage.upload("bucket", "literal", &opts).await.unwrap().is_empty());
        assert_eq!(store.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_bytes_applies_options() {
        let store = MemoryStore::new();
        store.create_container("bucket").unwrap();
        let storage = storage_with(
            &store,
            ClientConfig::new("ak", "sk").with_kms_key_id("key-1"),
        );
        let opts = UploadOptions::default()
            .with_metadata("Doc Type", "invoice")
            .with_acl(Acl::PublicRead);

        let receipt = storage
            .upload_bytes("bucket/docs/a.pdf", b"%PDF".to_vec(), &opts)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(receipt.key, "docs/a.pdf");

        let object = store.object("bucket", "docs/a.pdf").unwrap();
        assert_eq!(object.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(object.metadata.get("Doc-Type").map(String::as_str), Some("invoice"));
        assert_eq!(object.acl, Acl::PublicRead);
        assert_eq!(
            object.encryption,
            Some(Encryption::Kms { key_id: "key-1".into() })
        );
    }

    #[tokio::test]
    async fn test_upload_defaults_to_private_without_encryption() {
        let store = MemoryStore::new();
        store.create_container("bucket").unwrap();
        storage(&store)
            .upload_bytes("bucket/blob", b"x".to_vec(), &UploadOptions::default())
            .await
            .unwrap();

        let object = store.object("bucket", "blob").unwrap();
        assert_eq!(object.acl, Acl::Private);
        assert!(object.encryption.is_none());
        assert!(object.content_type.is_none());
    }

    #[tokio::test]
    async fn test_upload_reader() {
        let store = MemoryStore::new();
        store.create_container("bucket").unwrap();
        let reader = std::io::Cursor::new(b"streamed".to_vec());
        storage(&store)
            .upload_reader("bucket/s.txt", reader, &UploadOptions::default())
            .await
            .unwrap();
        assert_eq!(store.object("bucket", "s.txt").unwrap().body, b"streamed");
    }

    #[tokio::test]
    async fn test_upload_value_round_trip() {
        let store = MemoryStore::new();
        store.create_container("bucket").unwrap();
        let storage = storage_with(
            &store,
            ClientConfig::new("ak", "sk").with_format(SerializationFormat::Xml),
        );
        let value = Settings { name: "svc".into(), retries: 5 };

        storage
            .upload_value("bucket/conf/settings", &value, &UploadOptions::default())
            .await
            .unwrap();

        let object = store.object("bucket", "conf/settings").unwrap();
        assert_eq!(object.content_type.as_deref(), Some("application/xml"));
        let back: Settings = storage.download_as("bucket/conf/settings").await.unwrap();
        assert_eq!(back, value);
    }

    #[tokio::test]
    async fn test_upload_literal_and_file() {
        let store = MemoryStore::new();
        store.create_container("bucket").unwrap();
        let storage = storage(&store);
        let opts = UploadOptions::default();

        let receipts = storage.upload("bucket/note.txt", "just text", &opts).await.unwrap();
        assert_eq!(receipts.len(), 1);
        assert_eq!(store.object("bucket", "note.txt").unwrap().body, b"just text");

        let dir = TempDir::new().unwrap();
        let file = dir.path().join("data.bin");
        std::fs::write(&file, [1u8, 2, 3]).unwrap();
        storage
            .upload("bucket/data.bin", file.to_str().unwrap(), &opts)
            .await
            .unwrap();
        assert_eq!(store.object("bucket", "data.bin").unwrap().body, [1, 2, 3]);
    }

    #[tokio::test]
    async fn test_upload_directory_mirrors_tree() {
        let store = MemoryStore::new();
        store.create_container("bucket").unwrap();
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("a.txt"), "a").unwrap();
        std::fs::create_dir(root.path().join("sub")).unwrap();
        std::fs::write(root.path().join("sub").join("b.txt"), "b").unwrap();

        let receipts = storage(&store)
            .upload("bucket/dest", root.path().to_str().unwrap(), &UploadOptions::default())
            .await
            .unwrap();

        assert_eq!(receipts.len(), 2);
        assert_eq!(store.keys("bucket"), ["dest/a.txt", "dest/sub/b.txt"]);
        assert_eq!(store.object("bucket", "dest/sub/b.txt").unwrap().body, b"b");
    }

    #[tokio::test]
    async fn test_upload_directory_to_container_root() {
        let store = MemoryStore::new();
        store.create_container("bucket").unwrap();
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("a.txt"), "a").unwrap();

        storage(&store)
            .upload("bucket", root.path().to_str().unwrap(), &UploadOptions::default())
            .await
            .unwrap();
        assert_eq!(store.keys("bucket"), ["a.txt"]);
    }

    /// Tracks how many uploads are in flight at once
    #[derive(Clone)]
    struct Gauge {
        store: MemoryStore,
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl Gauge {
        fn new(store: MemoryStore) -> Self {
            Self {
                store,
                in_flight: Arc::new(AtomicUsize::new(0)),
                peak: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl ObjectStore for Gauge {
        async fn list_page(&self, request: &ListRequest) -> Result<ListingPage> {
            self.store.list_page(request).await
        }

        async fn head_object(&self, container: &str, key: &str) -> Result<ObjectMetadata> {
            self.store.head_object(container, key).await
        }

        async fn get_object(&self, container: &str, key: &str) -> Result<ObjectReader> {
            self.store.get_object(container, key).await
        }

        async fn put_object(&self, request: PutRequest) -> Result<Receipt> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            for _ in 0..4 {
                tokio::task::yield_now().await;
            }
            let receipt = self.store.put_object(request).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            receipt
        }

        async fn delete_object(&self, container: &str, key: &str) -> Result<Receipt> {
            self.store.delete_object(container, key).await
        }

        async fn copy_object(&self, src: &ObjectAddress, dst: &ObjectAddress) -> Result<Receipt> {
            self.store.copy_object(src, dst).await
        }

        async fn presign_get(&self, container: &str, key: &str, expires: Duration) -> Result<String> {
            self.store.presign_get(container, key, expires).await
        }

        async fn container_location(&self, container: &str) -> Result<String> {
            self.store.container_location(container).await
        }
    }

    #[async_trait]
    impl Connector for Gauge {
        async fn connect(&self, _config: &ClientConfig) -> Result<Arc<dyn ObjectStore>> {
            Ok(Arc::new(self.clone()))
        }
    }

    #[tokio::test]
    async fn test_upload_directory_bounds_concurrency() {
        let store = MemoryStore::new();
        store.create_container("bucket").unwrap();
        let root = TempDir::new().unwrap();
        for i in 0..12 {
            let dir = root.path().join(format!("d{}", i % 3));
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join(format!("{i}.txt")), "x").unwrap();
        }
        let gauge = Gauge::new(store.clone());
        let storage = Storage::with_instance_config(
            Arc::new(gauge.clone()),
            ClientConfig::new("ak", "sk").with_max_concurrency(2),
        );

        let receipts = storage
            .upload("bucket/dest", root.path().to_str().unwrap(), &UploadOptions::default())
            .await
            .unwrap();

        assert_eq!(receipts.len(), 12);
        assert_eq!(store.keys("bucket").len(), 12);
        let peak = gauge.peak.load(Ordering::SeqCst);
        assert!((1..=2).contains(&peak), "peak {peak}");
        assert_eq!(gauge.in_flight.load(Ordering::SeqCst), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_upload_directory_follows_symlinks() {
        let store = MemoryStore::new();
        store.create_container("bucket").unwrap();
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("shared.txt"), "shared").unwrap();
        std::fs::create_dir(outside.path().join("lib")).unwrap();
        std::fs::write(outside.path().join("lib").join("c.txt"), "c").unwrap();

        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("a.txt"), "a").unwrap();
        std::os::unix::fs::symlink(outside.path().join("shared.txt"), root.path().join("linked.txt")).unwrap();
        std::os::unix::fs::symlink(outside.path().join("lib"), root.path().join("lib")).unwrap();
        std::os::unix::fs::symlink(root.path().join("missing"), root.path().join("dangling")).unwrap();

        storage(&store)
            .upload("bucket", root.path().to_str().unwrap(), &UploadOptions::default())
            .await
            .unwrap();

        assert_eq!(store.keys("bucket"), ["a.txt", "lib/c.txt", "linked.txt"]);
        assert_eq!(store.object("bucket", "linked.txt").unwrap().body, b"shared");
    }

    #[tokio::test]
    async fn test_upload_as_reencodes_literal() {
        let store = MemoryStore::new();
        store.create_container("bucket").unwrap();
        let storage = storage(&store);

        storage
            .upload_as::<Settings>(
                "bucket/s.json",
                r#"{"name":"svc","retries":2}"#,
                &UploadOptions::default(),
            )
            .await
            .unwrap();

        let text = String::from_utf8(store.object("bucket", "s.json").unwrap().body).unwrap();
        assert!(text.contains("\n  \"retries\": 2"));

        let invalid = storage
            .upload_as::<Settings>("bucket/bad.json", "not json", &UploadOptions::default())
            .await;
        assert!(matches!(invalid, Err(Error::Json(_))));
        assert!(store.object("bucket", "bad.json").is_none());
    }

    #[tokio::test]
    async fn test_upload_as_directory() {
        let store = MemoryStore::new();
        store.create_container("bucket").unwrap();
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("one.json"), r#"{"name":"a","retries":1}"#).unwrap();

        let receipts = storage(&store)
            .upload_as::<Settings>("bucket/cfg/", root.path().to_str().unwrap(), &UploadOptions::default())
            .await
            .unwrap();
        assert_eq!(receipts[0].key, "cfg/one.json");
        let back: Settings = storage(&store).download_as("bucket/cfg/one.json").await.unwrap();
        assert_eq!(back, Settings { name: "a".into(), retries: 1 });
    }

    #[tokio::test]
    async fn test_download_tree() {
        let store = MemoryStore::new();
        for (key, body) in [("x/1.txt", "1"), ("x/y/", ""), ("x/y/2.txt", "2"), ("z.txt", "z")] {
            store.insert("bucket", key, body).unwrap();
        }
        let dest = TempDir::new().unwrap();

        let written = storage(&store)
            .download_tree("bucket/x/", dest.path())
            .await
            .unwrap();

        assert_eq!(
            written,
            [dest.path().join("1.txt"), dest.path().join("y").join("2.txt")]
        );
        assert_eq!(std::fs::read_to_string(dest.path().join("y/2.txt")).unwrap(), "2");
        assert!(!dest.path().join("z.txt").exists());
    }

    #[test]
    fn test_local_base() {
        assert_eq!(local_base("bucket/x/"), "x/");
        assert_eq!(local_base("bucket/x"), "");
        assert_eq!(local_base("bucket/a/b"), "a/");
        assert_eq!(local_base("bucket/a/b/"), "a/b/");
        assert_eq!(local_base("bucket"), "");
    }

    #[tokio::test]
    async fn test_download_tree_bare_prefix_keeps_whole_names() {
        let store = MemoryStore::new();
        store.insert("bucket", "x/1.txt", "1").unwrap();
        store.insert("bucket", "xylophone.txt", "xy").unwrap();
        let dest = TempDir::new().unwrap();

        let written = storage(&store)
            .download_tree("bucket/x", dest.path())
            .await
            .unwrap();

        assert_eq!(
            written,
            [dest.path().join("x").join("1.txt"), dest.path().join("xylophone.txt")]
        );
        assert_eq!(std::fs::read_to_string(dest.path().join("xylophone.txt")).unwrap(), "xy");
        assert!(!dest.path().join("ylophone.txt").exists());
    }

    #[tokio::test]
    async fn test_download_tree_skips_escaping_keys() {
        let store = MemoryStore::new();
        store.insert("bucket", "x/../evil.txt", "bad").unwrap();
        store.insert("bucket", "x/ok.txt", "ok").unwrap();
        let dest = TempDir::new().unwrap();

        let written = storage(&store)
            .download_tree("bucket/x/", dest.path())
            .await
            .unwrap();
        assert_eq!(written, [dest.path().join("ok.txt")]);
    }
}
