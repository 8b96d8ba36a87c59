//! Schema versioning for on-disk diagram stores
//!
//! A store records the schema version it was last written with. Opening a
//! store written by an older build replays every step in between; a store
//! written by a newer build is refused, since its records may not decode.

use crate::error::StorageError;
use crate::StorageResult;

/// Schema version this build reads and writes
pub const CURRENT_VERSION: u32 = 1;

/// One step in the schema history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaVersion {
    pub version: u32,
    pub description: &'static str,
}

const HISTORY: &[SchemaVersion] = &[SchemaVersion {
    version: 1,
    description: "diagram, item and connection tables with id sequences",
}];

/// Every schema step, oldest first
pub fn get_migrations() -> &'static [SchemaVersion] {
    HISTORY
}

/// Steps needed to bring a store at `from` up to `to`
pub fn pending_migrations(from: u32, to: u32) -> impl Iterator<Item = &'static SchemaVersion> {
    HISTORY
        .iter()
        .filter(move |step| step.version > from && step.version <= to)
}

/// Implemented by stores that persist a schema version
pub trait Migratable {
    /// Recorded schema version, 0 for a store that was never initialized
    fn get_schema_version(&self) -> StorageResult<u32>;

    fn set_schema_version(&self, version: u32) -> StorageResult<()>;

    /// Apply the changes introduced by `version`
    fn run_migration(&self, version: u32) -> StorageResult<()>;

    /// Bring the store up to `target`, recording the version after each step
    fn migrate_to(&self, target: u32) -> StorageResult<()> {
        let current = self.get_schema_version()?;
        if current > target {
            return Err(StorageError::Migration(format!(
                "store schema v{} is newer than supported v{}",
                current, target
            )));
        }

        for step in pending_migrations(current, target) {
            tracing::info!(
                "Migrating schema to v{}: {}",
                step.version,
                step.description
            );
            self.run_migration(step.version)?;
            self.set_schema_version(step.version)?;
        }
        Ok(())
    }

    fn migrate_to_latest(&self) -> StorageResult<()> {
        self.migrate_to(CURRENT_VERSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    struct Recorder {
        version: Cell<u32>,
        ran: RefCell<Vec<u32>>,
    }

    impl Recorder {
        fn at(version: u32) -> Self {
            Self {
                version: Cell::new(version),
                ran: RefCell::new(Vec::new()),
            }
        }
    }

    impl Migratable for Recorder {
        fn get_schema_version(&self) -> StorageResult<u32> {
            Ok(self.version.get())
        }

        fn set_schema_version(&self, version: u32) -> StorageResult<()> {
            self.version.set(version);
            Ok(())
        }

        fn run_migration(&self, version: u32) -> StorageResult<()> {
            self.ran.borrow_mut().push(version);
            Ok(())
        }
    }

    #[test]
    fn test_history_ends_at_current_version() {
        let history = get_migrations();
        assert_eq!(history.first().map(|s| s.version), Some(1));
        assert_eq!(history.last().map(|s| s.version), Some(CURRENT_VERSION));
    }

    #[test]
    fn test_fresh_store_runs_every_step_once() {
        let recorder = Recorder::at(0);
        recorder.migrate_to_latest().unwrap();
        assert_eq!(recorder.version.get(), CURRENT_VERSION);
        assert_eq!(*recorder.ran.borrow(), vec![1]);

        recorder.migrate_to_latest().unwrap();
        assert_eq!(recorder.ran.borrow().len(), 1);
    }

    #[test]
    fn test_newer_store_is_refused() {
        let recorder = Recorder::at(CURRENT_VERSION + 1);
        let err = recorder.migrate_to_latest().unwrap_err();
        assert!(matches!(err, StorageError::Migration(_)));
        assert!(recorder.ran.borrow().is_empty());
    }
}
