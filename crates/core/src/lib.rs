//! stowage-core: object-storage convenience layer
//!
//! This crate provides the engine behind the `stow` CLI:
//! - Path resolution (`container/key`)
//! - Recursive listing with concurrent prefix fan-out
//! - Search by key pattern or by stored metadata
//! - Uploads and downloads of bytes, text, typed values and local trees
//! - Configuration resolution and named profiles
//!
//! The engine talks to a backend only through the [`Connector`] and
//! [`ObjectStore`] traits, so it can run against S3 or the in-memory store.

pub mod codec;
pub mod config;
pub mod error;
pub mod listing;
pub mod memory;
pub mod path;
pub mod profile;
pub mod search;
pub mod storage;
pub mod traits;
pub mod transfer;

pub use config::{
    ClientConfig, Config, ConfigChain, ConfigManager, SerializationFormat, default_config,
    set_default_config,
};
pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use path::{ObjectAddress, is_directory, resolve};
pub use profile::{Profile, ProfileManager};
pub use search::SearchPredicate;
pub use storage::Storage;
pub use traits::{
    Acl, Connector, Encryption, ListRequest, ListedObject, ListingPage, ObjectMetadata,
    ObjectReader, ObjectStore, PutRequest, Receipt,
};
pub use transfer::UploadOptions;
