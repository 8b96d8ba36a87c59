//! ReDB storage backend

use crate::error::{StorageError, StorageResult};
use crate::migration::Migratable;
use crate::traits::DiagramStore;
use flowpad_core::{
    ConnectionId, DiagramId, DiagramSummary, IdKind, ItemId, PersistedConnection,
    PersistedDiagram, PersistedItem,
};
use redb::{Database, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;

// Table definitions
const DIAGRAMS: TableDefinition<u64, &[u8]> = TableDefinition::new("diagrams");
const ITEMS: TableDefinition<u64, &[u8]> = TableDefinition::new("items");
const CONNECTIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("connections");
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

const SCHEMA_VERSION_KEY: &str = "schema_version";

type RecordTable = TableDefinition<'static, u64, &'static [u8]>;

/// ReDB storage backend
pub struct RedbStore {
    db: Mutex<Database>,
}

impl RedbStore {
    /// Open or create a ReDB database at the given path
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path).map_err(|e| StorageError::Database(e.to_string()))?;

        // Initialize tables
        {
            let write_txn = db
                .begin_write()
                .map_err(|e| StorageError::Database(e.to_string()))?;
            {
                write_txn.open_table(DIAGRAMS)?;
                write_txn.open_table(ITEMS)?;
                write_txn.open_table(CONNECTIONS)?;
                write_txn.open_table(META)?;
            }
            write_txn.commit()?;
        }

        let store = Self { db: Mutex::new(db) };
        store.migrate_to_latest()?;
        Ok(store)
    }

    fn sequence_key(kind: IdKind) -> &'static str {
        match kind {
            IdKind::Diagram => "seq:diagram",
            IdKind::Item => "seq:item",
            IdKind::Connection => "seq:connection",
        }
    }

    fn read_record<T: DeserializeOwned>(
        &self,
        table: RecordTable,
        key: u64,
    ) -> StorageResult<Option<T>> {
        let db = self
            .db
            .lock()
            .map_err(|e| StorageError::Database(e.to_string()))?;
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(table)?;

        let record = match table.get(key)? {
            Some(value) => Some(serde_json::from_slice(value.value())?),
            None => None,
        };
        Ok(record)
    }

    fn write_record<T: Serialize>(&self, table: RecordTable, key: u64, record: &T) -> StorageResult<()> {
        let value = serde_json::to_vec(record)?;

        let db = self
            .db
            .lock()
            .map_err(|e| StorageError::Database(e.to_string()))?;
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(table)?;
            table.insert(key, value.as_slice())?;
        }
        write_txn.commit()?;

        Ok(())
    }

    fn remove_record(&self, table: RecordTable, key: u64) -> StorageResult<()> {
        let db = self
            .db
            .lock()
            .map_err(|e| StorageError::Database(e.to_string()))?;
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(table)?;
            table.remove(key)?;
        }
        write_txn.commit()?;

        Ok(())
    }

    fn read_meta(&self, key: &str) -> StorageResult<Option<u64>> {
        let db = self
            .db
            .lock()
            .map_err(|e| StorageError::Database(e.to_string()))?;
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(META)?;
        let value = table.get(key)?.map(|v| v.value());
        Ok(value)
    }

    fn write_meta(&self, key: &str, value: u64) -> StorageResult<()> {
        let db = self
            .db
            .lock()
            .map_err(|e| StorageError::Database(e.to_string()))?;
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(META)?;
            table.insert(key, value)?;
        }
        write_txn.commit()?;

        Ok(())
    }
}

impl Migratable for RedbStore {
    fn get_schema_version(&self) -> StorageResult<u32> {
        let version = self.read_meta(SCHEMA_VERSION_KEY)?.unwrap_or(0);
        u32::try_from(version)
            .map_err(|_| StorageError::Migration(format!("invalid schema version {}", version)))
    }

    fn set_schema_version(&self, version: u32) -> StorageResult<()> {
        self.write_meta(SCHEMA_VERSION_KEY, u64::from(version))
    }

    fn run_migration(&self, version: u32) -> StorageResult<()> {
        match version {
            // tables are created on open
            1 => Ok(()),
            other => Err(StorageError::Migration(format!(
                "no migration defined for schema version {}",
                other
            ))),
        }
    }
}

impl DiagramStore for RedbStore {
    fn allocate_id(&self, kind: IdKind) -> StorageResult<u64> {
        let key = Self::sequence_key(kind);

        let db = self
            .db
            .lock()
            .map_err(|e| StorageError::Database(e.to_string()))?;
        let write_txn = db.begin_write()?;
        let next = {
            let mut table = write_txn.open_table(META)?;
            let next = table.get(key)?.map(|v| v.value()).unwrap_or(0) + 1;
            table.insert(key, next)?;
            next
        };
        write_txn.commit()?;

        tracing::trace!("Allocated {} id {}", kind, next);
        Ok(next)
    }

    fn fetch_all_diagram_summaries(&self) -> StorageResult<Vec<DiagramSummary>> {
        let db = self
            .db
            .lock()
            .map_err(|e| StorageError::Database(e.to_string()))?;
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(DIAGRAMS)?;

        let mut summaries = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let diagram: PersistedDiagram = serde_json::from_slice(value.value())?;
            if let Some(summary) = diagram.summary() {
                summaries.push(summary);
            }
        }

        Ok(summaries)
    }

    fn fetch_diagram(&self, id: DiagramId) -> StorageResult<PersistedDiagram> {
        self.read_record(DIAGRAMS, id.get())?
            .ok_or(StorageError::DiagramNotFound(id))
    }

    fn save_diagram(&self, diagram: &PersistedDiagram) -> StorageResult<DiagramId> {
        let id = match diagram.id {
            Some(id) => id,
            None => DiagramId(self.allocate_id(IdKind::Diagram)?),
        };

        let mut stored = diagram.clone();
        stored.id = Some(id);
        self.write_record(DIAGRAMS, id.get(), &stored)?;
        Ok(id)
    }

    fn fetch_diagram_item(&self, id: ItemId) -> StorageResult<PersistedItem> {
        self.read_record(ITEMS, id.get())?
            .ok_or(StorageError::ItemNotFound(id))
    }

    fn save_diagram_item(&self, item: &PersistedItem) -> StorageResult<ItemId> {
        self.write_record(ITEMS, item.item_id.get(), item)?;
        Ok(item.item_id)
    }

    fn delete_diagram_item(&self, id: ItemId) -> StorageResult<()> {
        self.remove_record(ITEMS, id.get())
    }

    fn fetch_connection(&self, id: ConnectionId) -> StorageResult<PersistedConnection> {
        self.read_record(CONNECTIONS, id.get())?
            .ok_or(StorageError::ConnectionNotFound(id))
    }

    fn save_connection(&self, connection: &PersistedConnection) -> StorageResult<ConnectionId> {
        self.write_record(CONNECTIONS, connection.connection_id.get(), connection)?;
        Ok(connection.connection_id)
    }

    fn delete_connection(&self, id: ConnectionId) -> StorageResult<()> {
        self.remove_record(CONNECTIONS, id.get())
    }
}
