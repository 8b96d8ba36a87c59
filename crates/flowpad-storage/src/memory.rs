//! In-memory storage backend for testing

use crate::error::{StorageError, StorageResult};
use crate::traits::DiagramStore;
use flowpad_core::{
    ConnectionId, DiagramId, DiagramSummary, IdKind, ItemId, PersistedConnection,
    PersistedDiagram, PersistedItem,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

/// In-memory storage backend
///
/// Useful for testing and temporary storage. Counts every call it serves and
/// can be told to fail writes, so callers can check what the engine touched.
pub struct MemoryStore {
    diagrams: RwLock<BTreeMap<DiagramId, PersistedDiagram>>,
    items: RwLock<HashMap<ItemId, PersistedItem>>,
    connections: RwLock<HashMap<ConnectionId, PersistedConnection>>,
    sequences: Mutex<HashMap<IdKind, u64>>,
    operations: AtomicUsize,
    fail_writes: AtomicBool,
}

fn lock_error<T>(e: PoisonError<T>) -> StorageError {
    StorageError::Database(format!("Lock error: {}", e))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            diagrams: RwLock::new(BTreeMap::new()),
            items: RwLock::new(HashMap::new()),
            connections: RwLock::new(HashMap::new()),
            sequences: Mutex::new(HashMap::new()),
            operations: AtomicUsize::new(0),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Number of trait calls served so far
    pub fn operation_count(&self) -> usize {
        self.operations.load(Ordering::SeqCst)
    }

    /// Make every subsequent write (and id allocation) fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of stored item records
    pub fn item_count(&self) -> StorageResult<usize> {
        Ok(self.items.read().map_err(lock_error)?.len())
    }

    /// Number of stored connection records
    pub fn connection_count(&self) -> StorageResult<usize> {
        Ok(self.connections.read().map_err(lock_error)?.len())
    }

    fn record_operation(&self) {
        self.operations.fetch_add(1, Ordering::SeqCst);
    }

    fn check_write(&self, what: &str) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Database(format!("injected write failure: {}", what)));
        }
        Ok(())
    }

    fn next_id(&self, kind: IdKind) -> StorageResult<u64> {
        self.check_write("allocate id")?;
        let mut sequences = self.sequences.lock().map_err(lock_error)?;
        let next = sequences.entry(kind).or_insert(0);
        *next += 1;
        Ok(*next)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagramStore for MemoryStore {
    fn allocate_id(&self, kind: IdKind) -> StorageResult<u64> {
        self.record_operation();
        self.next_id(kind)
    }

    // Diagram operations

    fn fetch_all_diagram_summaries(&self) -> StorageResult<Vec<DiagramSummary>> {
        self.record_operation();
        let diagrams = self.diagrams.read().map_err(lock_error)?;
        Ok(diagrams.values().filter_map(PersistedDiagram::summary).collect())
    }

    fn fetch_diagram(&self, id: DiagramId) -> StorageResult<PersistedDiagram> {
        self.record_operation();
        let diagrams = self.diagrams.read().map_err(lock_error)?;
        diagrams
            .get(&id)
            .cloned()
            .ok_or(StorageError::DiagramNotFound(id))
    }

    fn save_diagram(&self, diagram: &PersistedDiagram) -> StorageResult<DiagramId> {
        self.record_operation();
        self.check_write("save diagram")?;
        let id = match diagram.id {
            Some(id) => id,
            None => DiagramId(self.next_id(IdKind::Diagram)?),
        };

        let mut stored = diagram.clone();
        stored.id = Some(id);
        let mut diagrams = self.diagrams.write().map_err(lock_error)?;
        diagrams.insert(id, stored);
        Ok(id)
    }

    // Item operations

    fn fetch_diagram_item(&self, id: ItemId) -> StorageResult<PersistedItem> {
        self.record_operation();
        let items = self.items.read().map_err(lock_error)?;
        items.get(&id).copied().ok_or(StorageError::ItemNotFound(id))
    }

    fn save_diagram_item(&self, item: &PersistedItem) -> StorageResult<ItemId> {
        self.record_operation();
        self.check_write("save item")?;
        let mut items = self.items.write().map_err(lock_error)?;
        items.insert(item.item_id, *item);
        Ok(item.item_id)
    }

    fn delete_diagram_item(&self, id: ItemId) -> StorageResult<()> {
        self.record_operation();
        self.check_write("delete item")?;
        let mut items = self.items.write().map_err(lock_error)?;
        items.remove(&id);
        Ok(())
    }

    // Connection operations

    fn fetch_connection(&self, id: ConnectionId) -> StorageResult<PersistedConnection> {
        self.record_operation();
        let connections = self.connections.read().map_err(lock_error)?;
        connections
            .get(&id)
            .copied()
            .ok_or(StorageError::ConnectionNotFound(id))
    }

    fn save_connection(&self, connection: &PersistedConnection) -> StorageResult<ConnectionId> {
        self.record_operation();
        self.check_write("save connection")?;
        let mut connections = self.connections.write().map_err(lock_error)?;
        connections.insert(connection.connection_id, *connection);
        Ok(connection.connection_id)
    }

    fn delete_connection(&self, id: ConnectionId) -> StorageResult<()> {
        self.record_operation();
        self.check_write("delete connection")?;
        let mut connections = self.connections.write().map_err(lock_error)?;
        connections.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowpad_core::{NodeKind, Orientation};

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();

        // Save an item and a connection
        let a = ItemId(store.allocate_id(IdKind::Item).unwrap());
        let b = ItemId(store.allocate_id(IdKind::Item).unwrap());
        assert_ne!(a, b);
        store
            .save_diagram_item(&PersistedItem::new(a, NodeKind::Source))
            .unwrap();
        store
            .save_diagram_item(&PersistedItem::new(b, NodeKind::Sink))
            .unwrap();

        let connection = PersistedConnection {
            connection_id: ConnectionId(store.allocate_id(IdKind::Connection).unwrap()),
            source_item_id: a,
            source_side: Orientation::Right,
            source_kind: NodeKind::Source,
            sink_item_id: b,
            sink_side: Orientation::Left,
            sink_kind: NodeKind::Sink,
        };
        let connection_id = store.save_connection(&connection).unwrap();

        // Save the aggregate
        let mut diagram = PersistedDiagram::new();
        diagram.items.push(PersistedItem::new(a, NodeKind::Source));
        diagram.items.push(PersistedItem::new(b, NodeKind::Sink));
        diagram.connection_ids.push(connection_id);
        let id = store.save_diagram(&diagram).unwrap();

        let fetched = store.fetch_diagram(id).unwrap();
        assert_eq!(fetched.id, Some(id));
        assert_eq!(fetched.items.len(), 2);
        assert_eq!(store.fetch_connection(connection_id).unwrap(), connection);

        let summaries = store.fetch_all_diagram_summaries().unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].connection_count, 1);

        // Deletes are idempotent
        store.delete_connection(connection_id).unwrap();
        store.delete_connection(connection_id).unwrap();
        assert!(store.fetch_connection(connection_id).unwrap_err().is_not_found());
        store.delete_diagram_item(a).unwrap();
        assert!(matches!(
            store.fetch_diagram_item(a),
            Err(StorageError::ItemNotFound(_))
        ));
    }

    #[test]
    fn test_resave_keeps_identity() {
        let store = MemoryStore::new();
        let id = store.save_diagram(&PersistedDiagram::new()).unwrap();
        let mut diagram = store.fetch_diagram(id).unwrap();
        diagram.items.push(PersistedItem::new(ItemId(1), NodeKind::Settings));

        assert_eq!(store.save_diagram(&diagram).unwrap(), id);
        assert_eq!(store.fetch_all_diagram_summaries().unwrap().len(), 1);
    }

    #[test]
    fn test_counts_report_poisoned_lock() {
        let store = MemoryStore::new();
        assert_eq!(store.item_count().unwrap(), 0);

        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = store.connections.write().unwrap();
            panic!("poison the connection map");
        }));
        assert!(matches!(
            store.connection_count(),
            Err(StorageError::Database(_))
        ));
        assert_eq!(store.item_count().unwrap(), 0);
    }

    #[test]
    fn test_missing_diagram() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.fetch_diagram(DiagramId(99)),
            Err(StorageError::DiagramNotFound(DiagramId(99)))
        ));
    }

    #[test]
    fn test_injected_write_failure() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        assert!(store.allocate_id(IdKind::Item).is_err());
        assert!(store.save_diagram(&PersistedDiagram::new()).is_err());
        assert_eq!(store.operation_count(), 2);

        store.set_fail_writes(false);
        assert_eq!(store.allocate_id(IdKind::Item).unwrap(), 1);
    }
}
