//! Table-oriented persistence with atomic whole-table writes.
//!
//! Each [`Table`] is a single JSON array of flat objects. Readers see either the previous or
//! the next version of a table, never a partial write. Read-modify-write sequences issued
//! through one [`RecordStore`] are serialized per table; two processes sharing the same data
//! directory can still overwrite each other's changes (lost update), because every write
//! replaces the entire table.

mod file;
mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::Clock;

/// Closed set of tables the platform persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Listings,
    Users,
    BlockedUsers,
    Notifications,
    RateLimits,
    SearchLog,
    /// Highest id ever issued per table.
    Sequences,
}

impl Table {
    pub const ALL: [Table; 7] = [
        Table::Listings,
        Table::Users,
        Table::BlockedUsers,
        Table::Notifications,
        Table::RateLimits,
        Table::SearchLog,
        Table::Sequences,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Table::Listings => "listings",
            Table::Users => "users",
            Table::BlockedUsers => "blocked_users",
            Table::Notifications => "notifications",
            Table::RateLimits => "rate_limits",
            Table::SearchLog => "search_log",
            Table::Sequences => "sequences",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.json", self.name())
    }
}

/// High-water mark of the ids [`RecordStore::insert`] has handed out for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct IdSequence {
    table: String,
    last_issued: u64,
}

/// Rows with a store-assigned identifier.
pub trait Record: Serialize + DeserializeOwned + Clone {
    fn id(&self) -> u64;
    fn assign_id(&mut self, id: u64);
    fn stamp_created(&mut self, at: DateTime<Utc>);
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("table {table} could not be read: {source}")]
    Read {
        table: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("table {table} could not be written: {source}")]
    Write {
        table: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("table {table} is corrupt: {source}")]
    Corrupt {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("table {table} could not be encoded: {source}")]
    Encode {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Raw byte storage for whole tables. `replace` must be atomic for concurrent readers.
pub trait TableBackend: Send + Sync {
    /// Returns `None` when the table has never been written.
    fn load(&self, table: Table) -> Result<Option<Vec<u8>>, StorageError>;
    fn replace(&self, table: Table, contents: &[u8]) -> Result<(), StorageError>;
}

/// Handle shared by every component that reads or writes tables.
pub struct RecordStore {
    backend: Arc<dyn TableBackend>,
    clock: Arc<dyn Clock>,
    locks: Mutex<HashMap<Table, Arc<Mutex<()>>>>,
    degraded_reads: AtomicU64,
}

impl RecordStore {
    pub fn new(backend: Arc<dyn TableBackend>, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            clock,
            locks: Mutex::new(HashMap::new()),
            degraded_reads: AtomicU64::new(0),
        }
    }

    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self::new(Arc::new(MemoryBackend::default()), clock)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Number of reads that fell back to an empty table because the stored copy was
    /// unreadable.
    pub fn degraded_reads(&self) -> u64 {
        self.degraded_reads.load(Ordering::Relaxed)
    }

    /// Returns the persisted rows, or an empty collection when the table is missing or
    /// unreadable. Unreadable tables are logged and counted in [`Self::degraded_reads`].
    pub fn read_all<T: DeserializeOwned>(&self, table: Table) -> Vec<T> {
        match self.try_read_all(table) {
            Ok(rows) => rows,
            Err(err) => {
                self.degraded_reads.fetch_add(1, Ordering::Relaxed);
                warn!(table = table.name(), error = %err, "serving empty table after read failure");
                Vec::new()
            }
        }
    }

    pub fn try_read_all<T: DeserializeOwned>(&self, table: Table) -> Result<Vec<T>, StorageError> {
        match self.backend.load(table)? {
            None => Ok(Vec::new()),
            Some(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|source| StorageError::Corrupt {
                table: table.name(),
                source,
            }),
        }
    }

    pub fn write_all<T: Serialize>(&self, table: Table, rows: &[T]) -> Result<(), StorageError> {
        let lock = self.table_lock(table);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.persist(table, rows)
    }

    /// Runs a read-modify-write cycle under the table lock. The table is read strictly so
    /// an unreadable file is never replaced by a fresh collection. Nothing is written when
    /// `apply` fails.
    pub fn modify<T, R, E, F>(&self, table: Table, apply: F) -> Result<R, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<StorageError>,
        F: FnOnce(&mut Vec<T>) -> Result<R, E>,
    {
        let lock = self.table_lock(table);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut rows = self.try_read_all(table)?;
        let result = apply(&mut rows)?;
        self.persist(table, &rows)?;
        Ok(result)
    }

    /// Appends `record` with `id = max(existing) + 1` and a fresh `created_at`. Ids of
    /// deleted rows are never handed out again: the highest id issued is kept in
    /// [`Table::Sequences`] and the new id is always past it.
    pub fn insert<T: Record>(&self, table: Table, mut record: T) -> Result<T, StorageError> {
        let now = self.now();
        self.modify(table, |rows: &mut Vec<T>| {
            let id = self.issue_id(table, next_id(rows))?;
            record.assign_id(id);
            record.stamp_created(now);
            rows.push(record.clone());
            debug!(table = table.name(), id, "record inserted");
            Ok::<_, StorageError>(record)
        })
    }

    pub fn find<T: Record>(&self, table: Table, id: u64) -> Option<T> {
        self.read_all::<T>(table)
            .into_iter()
            .find(|record| record.id() == id)
    }

    /// Physically removes a record. Returns `false` when no row had that id.
    pub fn delete<T: Record>(&self, table: Table, id: u64) -> Result<bool, StorageError> {
        self.modify(table, |rows: &mut Vec<T>| {
            let before = rows.len();
            rows.retain(|record| record.id() != id);
            Ok::<_, StorageError>(rows.len() != before)
        })
    }

    /// Table lock is already held by the caller; sequences are always locked second.
    fn issue_id(&self, table: Table, candidate: u64) -> Result<u64, StorageError> {
        self.modify(Table::Sequences, |sequences: &mut Vec<IdSequence>| {
            let id = match sequences.iter_mut().find(|seq| seq.table == table.name()) {
                Some(seq) => {
                    let id = candidate.max(seq.last_issued + 1);
                    seq.last_issued = id;
                    id
                }
                None => {
                    sequences.push(IdSequence {
                        table: table.name().to_string(),
                        last_issued: candidate,
                    });
                    candidate
                }
            };
            Ok::<_, StorageError>(id)
        })
    }

    fn persist<T: Serialize>(&self, table: Table, rows: &[T]) -> Result<(), StorageError> {
        let encoded = serde_json::to_vec_pretty(rows).map_err(|source| StorageError::Encode {
            table: table.name(),
            source,
        })?;
        self.backend.replace(table, &encoded)
    }

    fn table_lock(&self, table: Table) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(table).or_default())
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("degraded_reads", &self.degraded_reads())
            .finish_non_exhaustive()
    }
}

fn next_id<T: Record>(rows: &[T]) -> u64 {
    rows.iter().map(Record::id).max().map_or(1, |max| max + 1)
}
