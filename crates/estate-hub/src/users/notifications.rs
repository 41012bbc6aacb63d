use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{Record, RecordStore, StorageError, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ListingApproved,
    ListingRejected,
    AccountBlocked,
    AccountUnblocked,
    #[serde(other)]
    General,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default)]
    pub id: u64,
    pub user_id: u64,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
}

impl Record for Notification {
    fn id(&self) -> u64 {
        self.id
    }

    fn assign_id(&mut self, id: u64) {
        self.id = id;
    }

    fn stamp_created(&mut self, at: DateTime<Utc>) {
        self.created_at = at;
    }
}

/// Per-user inbox backed by the notifications table.
pub struct NotificationFeed {
    store: Arc<RecordStore>,
}

impl NotificationFeed {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    pub fn push(
        &self,
        user_id: u64,
        title: &str,
        message: &str,
        kind: NotificationKind,
    ) -> Result<Notification, StorageError> {
        self.store.insert(
            Table::Notifications,
            Notification {
                id: 0,
                user_id,
                title: title.to_string(),
                message: message.to_string(),
                kind,
                read: false,
                created_at: DateTime::<Utc>::default(),
            },
        )
    }

    /// Returns the user's notifications newest first, as they were before this call, and
    /// marks all of them read.
    pub fn fetch(&self, user_id: u64) -> Result<Vec<Notification>, StorageError> {
        self.store
            .modify(Table::Notifications, |rows: &mut Vec<Notification>| {
                let mut feed: Vec<Notification> = rows
                    .iter()
                    .filter(|item| item.user_id == user_id)
                    .cloned()
                    .collect();
                feed.sort_by(|a, b| b.id.cmp(&a.id));
                rows.iter_mut()
                    .filter(|item| item.user_id == user_id)
                    .for_each(|item| item.read = true);
                Ok(feed)
            })
    }

    pub fn unread_count(&self, user_id: u64) -> usize {
        self.store
            .read_all::<Notification>(Table::Notifications)
            .iter()
            .filter(|item| item.user_id == user_id && !item.read)
            .count()
    }
}
