//! Path parsing and resolution
//!
//! Object paths have the format `container[/key]`. A path ending in a
//! separator names a directory (a key prefix); any other path names a single
//! object, whether or not it exists yet.

/// Separator between path components
pub const SEPARATOR: char = '/';

/// A resolved object address: container plus key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectAddress {
    /// Container (bucket) name
    pub container: String,
    /// Object key (empty for the container root)
    pub key: String,
}

impl ObjectAddress {
    /// Create a new ObjectAddress
    pub fn new(container: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            key: key.into(),
        }
    }

    /// Both container and key are present
    pub fn is_complete(&self) -> bool {
        !self.container.is_empty() && !self.key.is_empty()
    }

    /// Join a child component below this address
    pub fn join(&self, child: &str) -> Self {
        let base = self.key.trim_end_matches(SEPARATOR);
        let child = child.trim_start_matches(SEPARATOR);
        let key = if base.is_empty() {
            child.to_string()
        } else {
            format!("{base}{SEPARATOR}{child}")
        };
        Self {
            container: self.container.clone(),
            key,
        }
    }

    /// Key prefix to hand to a listing call
    ///
    /// Directory paths get their separator back so that `a/b/` does not also
    /// match `a/bc`.
    pub fn listing_prefix(&self, is_dir: bool) -> String {
        if is_dir && !self.key.is_empty() {
            format!("{}{SEPARATOR}", self.key)
        } else {
            self.key.clone()
        }
    }
}

impl std::fmt::Display for ObjectAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.key.is_empty() {
            write!(f, "{}", self.container)
        } else {
            write!(f, "{}{SEPARATOR}{}", self.container, self.key)
        }
    }
}

/// Split an object path into container and key
///
/// One trailing separator and one leading separator are trimmed, then the
/// path is split on the first remaining separator only. Never fails: a bare
/// container name yields an empty key and an empty path an empty container.
pub fn resolve(path: &str) -> ObjectAddress {
    let path = path.trim();
    let path = path.strip_suffix(SEPARATOR).unwrap_or(path);
    let path = path.strip_prefix(SEPARATOR).unwrap_or(path);

    match path.split_once(SEPARATOR) {
        Some((container, key)) => ObjectAddress::new(container, key),
        None => ObjectAddress::new(path, ""),
    }
}

/// Whether a path uses directory semantics (ends with a separator)
pub fn is_directory(path: &str) -> bool {
    path.trim().ends_with(SEPARATOR)
}

/// Whether a key is a zero-byte directory marker
pub fn is_directory_key(key: &str) -> bool {
    key.ends_with(SEPARATOR)
}
