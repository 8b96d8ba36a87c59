//! Storage collaborator trait definition

use crate::error::StorageResult;
use flowpad_core::{
    ConnectionId, DiagramId, DiagramSummary, IdKind, ItemId, PersistedConnection,
    PersistedDiagram, PersistedItem,
};

/// Trait for storage backend implementations
///
/// Calls are synchronous; the session runs them off the interactive thread.
pub trait DiagramStore: Send + Sync {
    /// Allocate a fresh identity from the given sequence. Identities are
    /// never reused.
    fn allocate_id(&self, kind: IdKind) -> StorageResult<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Diagram Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Summaries of every saved diagram, ordered by id
    fn fetch_all_diagram_summaries(&self) -> StorageResult<Vec<DiagramSummary>>;

    /// Fetch a diagram aggregate, failing with `DiagramNotFound` if absent
    fn fetch_diagram(&self, id: DiagramId) -> StorageResult<PersistedDiagram>;

    /// Save a diagram aggregate, assigning its id if it has none
    fn save_diagram(&self, diagram: &PersistedDiagram) -> StorageResult<DiagramId>;

    // ─────────────────────────────────────────────────────────────────────────
    // Item Operations
    // ─────────────────────────────────────────────────────────────────────────

    fn fetch_diagram_item(&self, id: ItemId) -> StorageResult<PersistedItem>;

    /// Insert or replace an item record
    fn save_diagram_item(&self, item: &PersistedItem) -> StorageResult<ItemId>;

    /// Remove an item record; removing an absent record is not an error
    fn delete_diagram_item(&self, id: ItemId) -> StorageResult<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Connection Operations
    // ─────────────────────────────────────────────────────────────────────────

    fn fetch_connection(&self, id: ConnectionId) -> StorageResult<PersistedConnection>;

    /// Insert or replace a connection record
    fn save_connection(&self, connection: &PersistedConnection) -> StorageResult<ConnectionId>;

    /// Remove a connection record; removing an absent record is not an error
    fn delete_connection(&self, id: ConnectionId) -> StorageResult<()>;
}
