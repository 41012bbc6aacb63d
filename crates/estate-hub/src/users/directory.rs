use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ServiceError;
use crate::store::{Record, RecordStore, StorageError, Table};

/// A chat-platform user. The id is the platform's own identifier, not store-assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

impl Record for User {
    fn id(&self) -> u64 {
        self.id
    }

    fn assign_id(&mut self, id: u64) {
        self.id = id;
    }

    fn stamp_created(&mut self, at: DateTime<Utc>) {
        self.created_at = at;
        self.updated_at = at;
    }
}

/// Profile details observed when a user contacts the bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContact {
    pub id: u64,
    pub display_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub handle: Option<String>,
}

/// Membership row of the blocked set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedUser {
    pub user_id: u64,
    pub blocked_at: DateTime<Utc>,
}

pub struct UserDirectory {
    store: Arc<RecordStore>,
}

impl UserDirectory {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    /// Creates the user on first contact and refreshes the profile afterwards. Absent
    /// phone/handle values keep what was stored before.
    pub fn touch(&self, contact: UserContact) -> Result<User, StorageError> {
        let now = self.store.now();
        self.store.modify(Table::Users, |rows: &mut Vec<User>| {
            if let Some(user) = rows.iter_mut().find(|user| user.id == contact.id) {
                user.display_name = contact.display_name;
                if contact.phone.is_some() {
                    user.phone = contact.phone;
                }
                if contact.handle.is_some() {
                    user.handle = contact.handle;
                }
                user.updated_at = now;
                return Ok(user.clone());
            }

            let user = User {
                id: contact.id,
                display_name: contact.display_name,
                phone: contact.phone,
                handle: contact.handle,
                created_at: now,
                updated_at: now,
            };
            info!(user_id = user.id, "new user registered");
            rows.push(user.clone());
            Ok(user)
        })
    }

    pub fn get(&self, id: u64) -> Result<User, ServiceError> {
        self.store
            .find(Table::Users, id)
            .ok_or(ServiceError::NotFound { entity: "user", id })
    }

    pub fn is_blocked(&self, id: u64) -> bool {
        self.store
            .read_all::<BlockedUser>(Table::BlockedUsers)
            .iter()
            .any(|entry| entry.user_id == id)
    }

    pub fn blocked_ids(&self) -> BTreeSet<u64> {
        self.store
            .read_all::<BlockedUser>(Table::BlockedUsers)
            .into_iter()
            .map(|entry| entry.user_id)
            .collect()
    }

    /// Adds the user to the blocked set. Returns `false` when they were already in it.
    pub fn block(&self, id: u64) -> Result<bool, StorageError> {
        let now = self.store.now();
        self.store
            .modify(Table::BlockedUsers, |rows: &mut Vec<BlockedUser>| {
                if rows.iter().any(|entry| entry.user_id == id) {
                    return Ok(false);
                }
                rows.push(BlockedUser {
                    user_id: id,
                    blocked_at: now,
                });
                Ok(true)
            })
    }

    /// Removes the user from the blocked set. Returns whether they had been blocked.
    pub fn unblock(&self, id: u64) -> Result<bool, StorageError> {
        self.store
            .modify(Table::BlockedUsers, |rows: &mut Vec<BlockedUser>| {
                let before = rows.len();
                rows.retain(|entry| entry.user_id != id);
                Ok(rows.len() != before)
            })
    }

    /// Known users that outbound broadcasts may target.
    pub fn broadcast_audience(&self) -> Vec<u64> {
        let blocked = self.blocked_ids();
        self.store
            .read_all::<User>(Table::Users)
            .into_iter()
            .map(|user| user.id)
            .filter(|id| !blocked.contains(id))
            .collect()
    }
}
