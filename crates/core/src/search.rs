//! Object search by key pattern or stored metadata
//!
//! Both searches run a full recursive listing first. Pattern search then
//! filters keys locally. Metadata search fetches every candidate's metadata
//! concurrently (bounded by [`ClientConfig::max_concurrency`]) and keeps the
//! objects whose metadata contains every queried pair.
//!
//! In single-match mode a shared flag is raised on the first match and each
//! pending check looks at it before it starts its fetch. Checks already in
//! flight still finish, so more than one match can come back.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use futures::{StreamExt, TryStreamExt, stream};
use regex::{Regex, RegexBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::listing::DEFAULT_DELIMITER;
use crate::storage::Storage;
use crate::traits::ListedObject;

/// Normalize a metadata key the way the store expects header names
///
/// Header names cannot contain spaces, so they become hyphens.
pub fn normalize_metadata_key(key: &str) -> String {
    key.trim().replace(' ', "-")
}

/// Normalize every key of a metadata map
pub fn normalize_metadata<I, K, V>(pairs: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (normalize_metadata_key(k.as_ref()), v.into()))
        .collect()
}

/// What a search filters on
#[derive(Debug, Clone)]
pub enum SearchPredicate {
    /// Case-insensitive regular expression matched against the key
    Pattern(Regex),
    /// Metadata pairs that must all be present with equal values
    Metadata(BTreeMap<String, String>),
}

impl SearchPredicate {
    /// Compile a case-insensitive key pattern
    pub fn pattern(pattern: &str) -> Result<Self> {
        let regex = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        Ok(SearchPredicate::Pattern(regex))
    }

    /// Build a metadata predicate; keys are normalized
    pub fn metadata<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        SearchPredicate::Metadata(normalize_metadata(pairs).into_iter().collect())
    }

    /// Whether a key satisfies a pattern predicate
    ///
    /// Metadata predicates cannot be decided from the key and accept it.
    pub fn matches_key(&self, key: &str) -> bool {
        match self {
            SearchPredicate::Pattern(regex) => regex.is_match(key),
            SearchPredicate::Metadata(_) => true,
        }
    }

    /// Whether stored metadata satisfies a metadata predicate
    ///
    /// Header names are case-insensitive on the wire, so keys compare
    /// ignoring ASCII case; values must be equal.
    pub fn matches_metadata(&self, stored: &HashMap<String, String>) -> bool {
        match self {
            SearchPredicate::Pattern(_) => true,
            SearchPredicate::Metadata(query) => query.iter().all(|(key, value)| {
                stored
                    .iter()
                    .any(|(k, v)| k.eq_ignore_ascii_case(key) && v == value)
            }),
        }
    }
}

impl Storage {
    /// All objects below a path that satisfy the predicate
    ///
    /// `single` only affects metadata search, where it stops scheduling new
    /// metadata fetches soon after the first match.
    pub async fn find_objects(
        &self,
        prefix: &str,
        predicate: &SearchPredicate,
        single: bool,
    ) -> Result<Vec<ListedObject>> {
        let candidates = self
            .list_objects(prefix, Some(DEFAULT_DELIMITER), true)
            .await?;

        match predicate {
            SearchPredicate::Pattern(regex) => {
                let found: Vec<_> = candidates
                    .into_iter()
                    .filter(|o| regex.is_match(&o.key))
                    .collect();
                debug!(prefix, pattern = %regex, found = found.len(), "pattern search finished");
                Ok(found)
            }
            SearchPredicate::Metadata(_) => {
                let config = self.config()?;
                self.filter_by_metadata(&config, candidates, predicate, single)
                    .await
            }
        }
    }

    /// First object below a path that satisfies the predicate
    ///
    /// For pattern search the full traversal still runs; this is the first
    /// element of [`Storage::find_objects`].
    pub async fn find_object(
        &self,
        prefix: &str,
        predicate: &SearchPredicate,
    ) -> Result<Option<ListedObject>> {
        let found = self.find_objects(prefix, predicate, true).await?;
        Ok(found.into_iter().next())
    }

    /// Pattern search from a pattern string
    pub async fn find_by_pattern(&self, prefix: &str, pattern: &str) -> Result<Vec<ListedObject>> {
        let predicate = SearchPredicate::pattern(pattern)?;
        self.find_objects(prefix, &predicate, false).await
    }

    /// Metadata search from key/value pairs
    pub async fn find_by_metadata<I, K, V>(
        &self,
        prefix: &str,
        metadata: I,
        single: bool,
    ) -> Result<Vec<ListedObject>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let predicate = SearchPredicate::metadata(metadata);
        self.find_objects(prefix, &predicate, single).await
    }

    /// Matches decoded with the configured format
    pub async fn find_objects_as<T>(&self, prefix: &str, predicate: &SearchPredicate) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        let found = self.find_objects(prefix, predicate, false).await?;
        self.fetch_all_as(found).await
    }

    /// First match decoded with the configured format
    pub async fn find_object_as<T>(&self, prefix: &str, predicate: &SearchPredicate) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.find_object(prefix, predicate).await? {
            Some(object) => Ok(Some(self.download_as(&object.address().to_string()).await?)),
            None => Ok(None),
        }
    }

    async fn filter_by_metadata(
        &self,
        config: &ClientConfig,
        candidates: Vec<ListedObject>,
        predicate: &SearchPredicate,
        single: bool,
    ) -> Result<Vec<ListedObject>> {
        let total = candidates.len();
        let matched = AtomicBool::new(false);
        let matched = &matched;

        let checks = stream::iter(candidates).map(|candidate| async move {
            if single && matched.load(Ordering::Acquire) {
                trace!(key = %candidate.key, "metadata check skipped after first match");
                return Ok::<_, Error>(None);
            }

            let store = self.open(config).await?;
            match store.head_object(&candidate.container, &candidate.key).await {
                Ok(meta) if predicate.matches_metadata(&meta.metadata) => {
                    matched.store(true, Ordering::Release);
                    Ok(Some(candidate))
                }
                Ok(_) => Ok(None),
                // Deleted between listing and the metadata fetch.
                Err(e) if e.is_not_found() => {
                    debug!(key = %candidate.key, "candidate vanished before metadata fetch");
                    Ok(None)
                }
                Err(e) => Err(e),
            }
        });

        let found: Vec<ListedObject> = checks
            .buffer_unordered(config.max_concurrency.max(1))
            .try_filter_map(|hit| async move { Ok(hit) })
            .try_collect()
            .await?;

        debug!(candidates = total, found = found.len(), single, "metadata search finished");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::memory::MemoryStore;
    use serde::{Deserialize, Serialize};
    use std::sync::Arc;

    fn storage(store: &MemoryStore, concurrency: usize) -> Storage {
        Storage::with_instance_config(
            Arc::new(store.clone()),
            ClientConfig::new("ak", "sk").with_max_concurrency(concurrency),
        )
    }

    fn meta(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_with_metadata("bucket", "docs/a.PDF", "a", meta(&[("Doc-Type", "invoice")]))
            .unwrap();
        store
            .insert_with_metadata(
                "bucket",
                "docs/2024/b.pdf",
                "b",
                meta(&[("doc-type", "invoice"), ("year", "2024")]),
            )
            .unwrap();
        store
            .insert_with_metadata("bucket", "docs/c.txt", "c", meta(&[("doc-type", "note")]))
            .unwrap();
        store
    }

    #[test]
    fn test_normalize_metadata_key() {
        assert_eq!(normalize_metadata_key("Doc Type"), "Doc-Type");
        assert_eq!(normalize_metadata_key(" owner "), "owner");
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        let result = SearchPredicate::pattern("([a-z");
        assert!(matches!(result, Err(Error::Pattern(_))));
    }

    #[test]
    fn test_metadata_predicate_requires_every_pair() {
        let predicate = SearchPredicate::metadata([("doc type", "invoice"), ("year", "2024")]);
        assert!(predicate.matches_metadata(&meta(&[("doc-type", "invoice"), ("year", "2024")])));
        assert!(!predicate.matches_metadata(&meta(&[("doc-type", "invoice")])));
        assert!(!predicate.matches_metadata(&meta(&[("doc-type", "Invoice"), ("year", "2024")])));
    }

    #[tokio::test]
    async fn test_pattern_search_is_case_insensitive() {
        let store = seeded();
        let found = storage(&store, 4)
            .find_by_pattern("bucket/docs/", r"\.pdf$")
            .await
            .unwrap();

        let mut keys: Vec<_> = found.iter().map(|o| o.key.as_str()).collect();
        keys.sort();
        assert_eq!(keys, ["docs/2024/b.pdf", "docs/a.PDF"]);
    }

    #[tokio::test]
    async fn test_pattern_search_invalid_regex_fails() {
        let store = seeded();
        let result = storage(&store, 4).find_by_pattern("bucket/docs/", "(").await;
        assert!(matches!(result, Err(Error::Pattern(_))));
    }

    #[tokio::test]
    async fn test_find_object_pattern_runs_full_listing() {
        let store = seeded();
        let predicate = SearchPredicate::pattern("c\\.txt").unwrap();
        let found = storage(&store, 4)
            .find_object("bucket/docs/", &predicate)
            .await
            .unwrap();
        assert_eq!(found.unwrap().key, "docs/c.txt");

        let predicate = SearchPredicate::pattern("nothing-here").unwrap();
        let found = storage(&store, 4)
            .find_object("bucket/docs/", &predicate)
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_metadata_search_finds_all_matches() {
        let store = seeded();
        let found = storage(&store, 4)
            .find_by_metadata("bucket/docs/", [("doc type", "invoice")], false)
            .await
            .unwrap();

        let mut keys: Vec<_> = found.iter().map(|o| o.key.clone()).collect();
        keys.sort();
        assert_eq!(keys, ["docs/2024/b.pdf", "docs/a.PDF"]);
        assert_eq!(store.head_count(), 3);
    }

    // The stop flag is best-effort: checks already past it still complete,
    // so a single-match search may legitimately return both matches.
    #[tokio::test]
    async fn test_single_metadata_search_returns_one_or_two() {
        let store = seeded();
        let found = storage(&store, 8)
            .find_by_metadata("bucket/docs/", [("doc-type", "invoice")], true)
            .await
            .unwrap();
        assert!((1..=2).contains(&found.len()));
    }

    #[tokio::test]
    async fn test_single_metadata_search_stops_scheduling() {
        let store = MemoryStore::new();
        for i in 0..50 {
            store
                .insert_with_metadata("bucket", &format!("k/{i:02}"), "x", meta(&[("tag", "hit")]))
                .unwrap();
        }

        let found = storage(&store, 1)
            .find_by_metadata("bucket/k/", [("tag", "hit")], true)
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(store.head_count(), 1);
    }

    #[tokio::test]
    async fn test_metadata_search_no_match() {
        let store = seeded();
        let found = storage(&store, 4)
            .find_by_metadata("bucket/docs/", [("doc-type", "receipt")], true)
            .await
            .unwrap();
        assert!(found.is_empty());
        assert_eq!(store.head_count(), 3);
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Invoice {
        number: u32,
    }

    #[tokio::test]
    async fn test_typed_find() {
        let store = MemoryStore::new();
        store.insert("bucket", "inv/1.json", r#"{"number": 1}"#).unwrap();
        store.insert("bucket", "inv/2.json", r#"{"number": 2}"#).unwrap();
        store.insert("bucket", "inv/readme.md", "not json").unwrap();
        let storage = storage(&store, 4);

        let predicate = SearchPredicate::pattern(r"\.json$").unwrap();
        let mut all: Vec<Invoice> = storage.find_objects_as("bucket/inv/", &predicate).await.unwrap();
        all.sort_by_key(|i| i.number);
        assert_eq!(all, [Invoice { number: 1 }, Invoice { number: 2 }]);

        let predicate = SearchPredicate::pattern(r"2\.json$").unwrap();
        let one: Option<Invoice> = storage.find_object_as("bucket/inv/", &predicate).await.unwrap();
        assert_eq!(one, Some(Invoice { number: 2 }));
    }
}
