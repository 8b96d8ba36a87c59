//! Flowpad Storage - Storage backends for saved diagrams
//!
//! This crate provides the storage collaborator the diagram engine reads and
//! writes through, with an in-memory and an embedded on-disk backend.

#![allow(clippy::result_large_err)]

pub mod error;
pub mod migration;
pub mod traits;

#[cfg(feature = "redb")]
pub mod redb;

pub mod memory;

pub use error::{StorageError, StorageResult};
pub use migration::{Migratable, SchemaVersion, CURRENT_VERSION};
pub use traits::DiagramStore;

#[cfg(feature = "redb")]
pub use redb::RedbStore;

pub use memory::MemoryStore;
