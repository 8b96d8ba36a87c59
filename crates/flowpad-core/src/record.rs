//! Flat persisted record types
//!
//! A saved diagram is an aggregate ([`PersistedDiagram`]) listing its items
//! and the ids of its connections. Items and connections are stored as
//! separate records that reference nodes by identity only; no geometry is
//! carried.

use crate::identity::{ConnectionId, DiagramId, ItemId, Persistable};
use crate::kind::NodeKind;
use crate::orientation::Orientation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A node as stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedItem {
    pub item_id: ItemId,
    pub kind: NodeKind,
}

impl PersistedItem {
    pub fn new(item_id: ItemId, kind: NodeKind) -> Self {
        Self { item_id, kind }
    }
}

/// A directed connection as stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedConnection {
    pub connection_id: ConnectionId,
    pub source_item_id: ItemId,
    pub source_side: Orientation,
    pub source_kind: NodeKind,
    pub sink_item_id: ItemId,
    pub sink_side: Orientation,
    pub sink_kind: NodeKind,
}

impl PersistedConnection {
    /// True if either endpoint names the given item
    pub fn touches(&self, item_id: ItemId) -> bool {
        self.source_item_id == item_id || self.sink_item_id == item_id
    }
}

/// The aggregate root of a saved diagram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedDiagram {
    /// Assigned by the store on first save
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<DiagramId>,

    pub items: Vec<PersistedItem>,

    pub connection_ids: Vec<ConnectionId>,

    /// Last save timestamp
    pub saved_at: DateTime<Utc>,
}

impl PersistedDiagram {
    /// An empty, not yet persisted aggregate
    pub fn new() -> Self {
        Self {
            id: None,
            items: Vec::new(),
            connection_ids: Vec::new(),
            saved_at: Utc::now(),
        }
    }

    pub fn contains_item(&self, item_id: ItemId) -> bool {
        self.items.iter().any(|item| item.item_id == item_id)
    }

    /// Remove an item from the aggregate, returning whether it was listed
    pub fn remove_item(&mut self, item_id: ItemId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.item_id != item_id);
        self.items.len() != before
    }

    /// Remove a connection id from the aggregate, returning whether it was listed
    pub fn remove_connection(&mut self, connection_id: ConnectionId) -> bool {
        let before = self.connection_ids.len();
        self.connection_ids.retain(|id| *id != connection_id);
        self.connection_ids.len() != before
    }

    /// Drop all item and connection entries, keeping the identity
    pub fn clear_contents(&mut self) {
        self.items.clear();
        self.connection_ids.clear();
    }

    /// Summary row for a persisted aggregate
    pub fn summary(&self) -> Option<DiagramSummary> {
        self.id.map(|id| DiagramSummary {
            id,
            item_count: self.items.len(),
            connection_count: self.connection_ids.len(),
            saved_at: self.saved_at,
        })
    }
}

impl Default for PersistedDiagram {
    fn default() -> Self {
        Self::new()
    }
}

impl Persistable for PersistedDiagram {
    fn identity(&self) -> Option<u64> {
        self.id.map(DiagramId::get)
    }
}

/// Listing entry for a saved diagram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramSummary {
    pub id: DiagramId,
    pub item_count: usize,
    pub connection_count: usize,
    pub saved_at: DateTime<Utc>,
}
