//! The storage engine
//!
//! [`Storage`] is the single entry point callers use. It binds a
//! [`Connector`] to a configuration chain and exposes address-level
//! operations. Listing, search and transfer operations live in their own
//! modules as further `impl Storage` blocks.
//!
//! Address-dependent operations follow a soft-failure policy: a path
//! without a container or key yields `false`/`None` instead of an error.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::{ClientConfig, ConfigChain};
use crate::error::Result;
use crate::path::{self, ObjectAddress};
use crate::traits::{Connector, ObjectMetadata, ObjectStore, Receipt};

/// Default lifetime of pre-signed URLs
pub const DEFAULT_PRESIGN_EXPIRY: Duration = Duration::from_secs(3600);

/// Object-storage engine bound to a connector and a configuration chain
#[derive(Clone)]
pub struct Storage {
    connector: Arc<dyn Connector>,
    chain: ConfigChain,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").finish_non_exhaustive()
    }
}

impl Storage {
    /// Engine that resolves its configuration from the process default
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            chain: ConfigChain::default(),
        }
    }

    /// Engine with an instance-bound configuration
    pub fn with_instance_config(connector: Arc<dyn Connector>, config: ClientConfig) -> Self {
        Self {
            connector,
            chain: ConfigChain::with_instance(Some(Arc::new(config))),
        }
    }

    /// Replace (or clear) the instance-bound configuration
    pub fn set_config(&mut self, config: Option<ClientConfig>) {
        self.chain.set_instance(config.map(Arc::new));
    }

    /// Handle that uses `config` for every call made through it
    ///
    /// The explicit record takes precedence over the instance and process
    /// defaults; it replaces them whole.
    pub fn with_config(&self, config: ClientConfig) -> Self {
        Self {
            connector: Arc::clone(&self.connector),
            chain: self.chain.with_explicit(Arc::new(config)),
        }
    }

    /// The configuration the next call would use
    pub fn config(&self) -> Result<Arc<ClientConfig>> {
        self.chain.resolve()
    }

    /// Open a fresh session; it is released when the returned handle drops
    pub(crate) async fn open(&self, config: &ClientConfig) -> Result<Arc<dyn ObjectStore>> {
        debug!(region = %config.region, "opening storage session");
        self.connector.connect(config).await
    }

    /// Resolve the configuration and open a session
    pub(crate) async fn session(&self) -> Result<(Arc<ClientConfig>, Arc<dyn ObjectStore>)> {
        let config = self.config()?;
        let store = self.open(&config).await?;
        Ok((config, store))
    }

    /// Whether an object exists
    ///
    /// Any backend failure counts as "does not exist".
    pub async fn object_exists(&self, path: &str) -> bool {
        let address = path::resolve(path);
        if !address.is_complete() {
            return false;
        }
        match self.stat_address(&address).await {
            Ok(_) => true,
            Err(e) => {
                debug!(%address, error = %e, "object existence check failed");
                false
            }
        }
    }

    /// Whether a container exists
    ///
    /// Any backend failure counts as "does not exist".
    pub async fn container_exists(&self, container: &str) -> bool {
        let container = path::resolve(container).container;
        if container.is_empty() {
            return false;
        }
        match self.container_location(&container).await {
            Ok(_) => true,
            Err(e) => {
                debug!(%container, error = %e, "container existence check failed");
                false
            }
        }
    }

    /// Location (region) of a container
    pub async fn container_location(&self, container: &str) -> Result<String> {
        let (_, store) = self.session().await?;
        store.container_location(container).await
    }

    /// Metadata of an object
    pub async fn stat(&self, path: &str) -> Result<ObjectMetadata> {
        self.stat_address(&path::resolve(path)).await
    }

    async fn stat_address(&self, address: &ObjectAddress) -> Result<ObjectMetadata> {
        let (_, store) = self.session().await?;
        store.head_object(&address.container, &address.key).await
    }

    /// Server-side copy; `None` when either path lacks a container or key
    pub async fn copy(&self, src: &str, dst: &str) -> Result<Option<Receipt>> {
        let src = path::resolve(src);
        let dst = path::resolve(dst);
        if !src.is_complete() || !dst.is_complete() {
            debug!(%src, %dst, "copy skipped: incomplete address");
            return Ok(None);
        }

        let (_, store) = self.session().await?;
        store.copy_object(&src, &dst).await.map(Some)
    }

    /// Delete an object when it exists
    ///
    /// Returns `None` for malformed paths and missing objects, so repeated
    /// calls are harmless.
    pub async fn delete_if_exists(&self, path: &str) -> Result<Option<Receipt>> {
        let address = path::resolve(path);
        if !address.is_complete() || !self.object_exists(path).await {
            return Ok(None);
        }

        let (_, store) = self.session().await?;
        let receipt = store.delete_object(&address.container, &address.key).await?;
        debug!(%address, "object deleted");
        Ok(Some(receipt))
    }

    /// Pre-signed GET URL; `None` when the path lacks a container or key
    pub async fn presigned_url(&self, path: &str, expires: Option<Duration>) -> Result<Option<String>> {
        let address = path::resolve(path);
        if !address.is_complete() {
            return Ok(None);
        }

        let (_, store) = self.session().await?;
        let url = store
            .presign_get(
                &address.container,
                &address.key,
                expires.unwrap_or(DEFAULT_PRESIGN_EXPIRY),
            )
            .await?;
        Ok(Some(url))
    }
}
