use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{RecordStore, StorageError, Table};

/// Entries kept in the query log; older ones are dropped first.
pub const QUERY_LOG_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchLogEntry {
    pub query: String,
    pub result_count: usize,
    pub timestamp: DateTime<Utc>,
    pub client: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryFrequency {
    pub query: String,
    pub count: usize,
}

/// Bounded analytics log of executed searches.
pub struct QueryLog {
    store: Arc<RecordStore>,
}

impl QueryLog {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    pub fn append(&self, entry: SearchLogEntry) -> Result<(), StorageError> {
        self.store
            .modify(Table::SearchLog, |entries: &mut Vec<SearchLogEntry>| {
                entries.push(entry);
                let overflow = entries.len().saturating_sub(QUERY_LOG_CAPACITY);
                entries.drain(..overflow);
                Ok(())
            })
    }

    /// Newest entries first.
    pub fn recent(&self, limit: usize) -> Vec<SearchLogEntry> {
        let mut entries: Vec<SearchLogEntry> = self.store.read_all(Table::SearchLog);
        entries.reverse();
        entries.truncate(limit);
        entries
    }

    /// Most frequent queries, compared case-insensitively.
    pub fn popular(&self, limit: usize) -> Vec<QueryFrequency> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for entry in self.store.read_all::<SearchLogEntry>(Table::SearchLog) {
            *counts.entry(entry.query.trim().to_lowercase()).or_default() += 1;
        }
        let mut ranked: Vec<QueryFrequency> = counts
            .into_iter()
            .map(|(query, count)| QueryFrequency { query, count })
            .collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.query.cmp(&b.query)));
        ranked.truncate(limit);
        ranked
    }
}
