//! Deletion cascade into a saved aggregate

use flowpad_core::{ConnectionId, ItemId, PersistedDiagram, Persistable, Removed};
use flowpad_storage::{DiagramStore, StorageResult};

/// A persisted entity deleted from the live graph since the last save
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Removal {
    Node(ItemId),
    Connection(ConnectionId),
}

impl Removal {
    /// The removal to replay against the store, or `None` for entities that
    /// were never persisted
    pub fn from_removed(removed: &Removed) -> Option<Self> {
        match removed {
            Removed::Node(node) => node.id().map(Self::Node),
            Removed::Connection(connection) => connection.id().map(Self::Connection),
        }
    }
}

/// Applies removals to a saved aggregate and the records it lists.
///
/// Removing a node first removes every listed connection whose source or
/// sink names it, so the aggregate never keeps a connection to a missing item.
pub struct CascadeResolver<'a> {
    store: &'a dyn DiagramStore,
}

impl<'a> CascadeResolver<'a> {
    pub fn new(store: &'a dyn DiagramStore) -> Self {
        Self { store }
    }

    /// Apply one removal and write the adjusted aggregate back
    pub fn apply(&self, diagram: &mut PersistedDiagram, removal: Removal) -> StorageResult<()> {
        match removal {
            Removal::Connection(id) => self.remove_connection(diagram, id)?,
            Removal::Node(item_id) => {
                for connection_id in self.connections_touching(diagram, item_id)? {
                    self.remove_connection(diagram, connection_id)?;
                }
                if !diagram.remove_item(item_id) {
                    tracing::debug!("Item {} was not listed in the saved diagram", item_id);
                }
                self.store.delete_diagram_item(item_id)?;
                tracing::debug!("Removed item {} from saved diagram", item_id);
            }
        }

        if diagram.is_persisted() {
            self.store.save_diagram(diagram)?;
        }
        Ok(())
    }

    fn connections_touching(
        &self,
        diagram: &PersistedDiagram,
        item_id: ItemId,
    ) -> StorageResult<Vec<ConnectionId>> {
        let mut touching = Vec::new();
        for connection_id in &diagram.connection_ids {
            let connection = self.store.fetch_connection(*connection_id)?;
            if connection.touches(item_id) {
                touching.push(*connection_id);
            }
        }
        Ok(touching)
    }

    fn remove_connection(
        &self,
        diagram: &mut PersistedDiagram,
        connection_id: ConnectionId,
    ) -> StorageResult<()> {
        diagram.remove_connection(connection_id);
        self.store.delete_connection(connection_id)?;
        tracing::debug!("Removed connection {} from saved diagram", connection_id);
        Ok(())
    }
}
