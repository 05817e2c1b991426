//! Recursive listing
//!
//! Turns the store's flat, paginated, prefix-filtered listing into a full
//! traversal. Every prefix is paged through with its continuation marker;
//! when recursion is requested, each common prefix reported along the way is
//! traversed by its own concurrent branch with its own session, and the
//! branch results are merged once all of them finish.
//!
//! Directory markers (keys ending in the separator) are never returned.
//! Results are unordered across branches. A failure in any page of any
//! branch fails the whole call and the siblings' partial results are
//! dropped.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::{BoxFuture, try_join_all};
use futures::{StreamExt, TryStreamExt, stream};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::path::{self, SEPARATOR};
use crate::storage::Storage;
use crate::traits::{ListRequest, ListedObject};

/// Delimiter used when callers do not pick one
pub const DEFAULT_DELIMITER: &str = "/";

impl Storage {
    /// List the objects under a path
    ///
    /// `delimiter` groups keys into common prefixes; with `recursive` those
    /// prefixes are traversed as well. Without a delimiter the store returns
    /// every key under the prefix flat, so `recursive` changes nothing.
    pub async fn list_objects(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        recursive: bool,
    ) -> Result<Vec<ListedObject>> {
        let config = self.config()?;
        let address = path::resolve(prefix);
        if address.container.is_empty() {
            debug!(prefix, "listing skipped: no container");
            return Ok(Vec::new());
        }

        let key_prefix = address.listing_prefix(path::is_directory(prefix));
        let objects = self
            .traverse(
                config,
                address.container,
                key_prefix,
                delimiter.map(str::to_string),
                recursive,
            )
            .await?;

        debug!(prefix, count = objects.len(), recursive, "listing finished");
        Ok(objects)
    }

    /// Keys of every object below a path, recursively
    pub async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let objects = self.list_objects(prefix, Some(DEFAULT_DELIMITER), true).await?;
        Ok(objects.into_iter().map(|o| o.key).collect())
    }

    /// List objects and decode each payload with the configured format
    ///
    /// Values come back in listing order.
    pub async fn list_objects_as<T>(&self, prefix: &str, recursive: bool) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        let objects = self
            .list_objects(prefix, Some(DEFAULT_DELIMITER), recursive)
            .await?;
        self.fetch_all_as(objects).await
    }

    /// Download and decode a batch of listed objects, preserving order
    pub(crate) async fn fetch_all_as<T>(&self, objects: Vec<ListedObject>) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        let config = self.config()?;
        stream::iter(objects)
            .map(|object| async move { self.download_as::<T>(&object.address().to_string()).await })
            .buffered(config.max_concurrency.max(1))
            .try_collect()
            .await
    }

    /// Page through one prefix, then fan out into its sub-prefixes
    fn traverse(
        &self,
        config: Arc<ClientConfig>,
        container: String,
        prefix: String,
        delimiter: Option<String>,
        recursive: bool,
    ) -> BoxFuture<'_, Result<Vec<ListedObject>>> {
        Box::pin(async move {
            let store = self.open(&config).await?;
            let mut objects = Vec::new();
            let mut sub_prefixes = Vec::new();
            let mut seen = HashSet::new();
            let mut marker: Option<String> = None;

            loop {
                let request = ListRequest {
                    container: container.clone(),
                    prefix: prefix.clone(),
                    delimiter: delimiter.clone(),
                    marker: marker.take(),
                };
                let page = store.list_page(&request).await?;
                trace!(
                    %container,
                    %prefix,
                    items = page.items.len(),
                    prefixes = page.common_prefixes.len(),
                    truncated = page.truncated,
                    "listing page"
                );

                let last_key = page.items.last().map(|item| item.key.clone());

                objects.extend(
                    page.items
                        .into_iter()
                        .filter(|item| !path::is_directory_key(&item.key)),
                );

                // A prefix is expanded once even if a later page repeats it.
                if recursive {
                    for sub in page.common_prefixes {
                        if sub != prefix && seen.insert(sub.clone()) {
                            sub_prefixes.push(sub);
                        }
                    }
                }

                if !page.truncated {
                    break;
                }

                marker = page
                    .continuation_marker
                    .or_else(|| last_key)
                    .or_else(|| sub_prefixes.last().cloned());
                if marker.is_none() {
                    return Err(Error::General(format!(
                        "Truncated listing of {container}{SEPARATOR}{prefix} carried no continuation marker"
                    )));
                }
            }

            // The branch's own session is done before its children open theirs.
            drop(store);

            if !sub_prefixes.is_empty() {
                debug!(%container, %prefix, branches = sub_prefixes.len(), "expanding sub-prefixes");
                let branches = sub_prefixes.into_iter().map(|sub| {
                    self.traverse(
                        Arc::clone(&config),
                        container.clone(),
                        sub,
                        delimiter.clone(),
                        true,
                    )
                });
                for branch in try_join_all(branches).await? {
                    objects.extend(branch);
                }
            }

            Ok(objects)
        })
    }
}
