use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::{StorageError, Table, TableBackend};

/// In-process backend holding the encoded bytes of each table.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: Mutex<HashMap<Table, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn raw(&self, table: Table) -> Option<Vec<u8>> {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&table)
            .cloned()
    }

    pub fn put_raw(&self, table: Table, contents: Vec<u8>) {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(table, contents);
    }
}

impl TableBackend for MemoryBackend {
    fn load(&self, table: Table) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.raw(table))
    }

    fn replace(&self, table: Table, contents: &[u8]) -> Result<(), StorageError> {
        self.put_raw(table, contents.to_vec());
        Ok(())
    }
}
