//! Identity registry backed by the store's id sequences

use flowpad_core::{ConnectionId, DiagramId, IdKind, ItemId};
use flowpad_storage::{DiagramStore, StorageResult};

/// Hands out identities for new entities and reuses existing ones.
///
/// Allocation failures are returned to the caller; a save cannot continue
/// without an identity.
pub struct IdentityRegistry<'a> {
    store: &'a dyn DiagramStore,
}

impl<'a> IdentityRegistry<'a> {
    pub fn new(store: &'a dyn DiagramStore) -> Self {
        Self { store }
    }

    /// A fresh, never before issued identity
    pub fn assign(&self, kind: IdKind) -> StorageResult<u64> {
        self.store.allocate_id(kind)
    }

    pub fn resolve_item(&self, existing: Option<ItemId>) -> StorageResult<ItemId> {
        match existing {
            Some(id) => Ok(id),
            None => self.assign(IdKind::Item).map(ItemId),
        }
    }

    pub fn resolve_connection(&self, existing: Option<ConnectionId>) -> StorageResult<ConnectionId> {
        match existing {
            Some(id) => Ok(id),
            None => self.assign(IdKind::Connection).map(ConnectionId),
        }
    }

    pub fn resolve_diagram(&self, existing: Option<DiagramId>) -> StorageResult<DiagramId> {
        match existing {
            Some(id) => Ok(id),
            None => self.assign(IdKind::Diagram).map(DiagramId),
        }
    }
}
