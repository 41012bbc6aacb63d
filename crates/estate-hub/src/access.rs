use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// The chat-platform user on whose behalf an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: u64,
}

impl Actor {
    pub const fn new(user_id: u64) -> Self {
        Self { user_id }
    }
}

/// Administrator roster deciding who may moderate, delete and block.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    admins: BTreeSet<u64>,
}

impl AccessPolicy {
    pub fn new(admins: impl IntoIterator<Item = u64>) -> Self {
        Self {
            admins: admins.into_iter().collect(),
        }
    }

    pub fn is_admin(&self, actor: Actor) -> bool {
        self.admins.contains(&actor.user_id)
    }

    pub fn require_admin(&self, actor: Actor, action: &'static str) -> Result<(), ServiceError> {
        if self.is_admin(actor) {
            Ok(())
        } else {
            Err(ServiceError::Permission {
                actor: actor.user_id,
                action,
            })
        }
    }

    /// Owners may act on their own records; administrators on any.
    pub fn require_owner_or_admin(
        &self,
        actor: Actor,
        owner_id: u64,
        action: &'static str,
    ) -> Result<(), ServiceError> {
        if actor.user_id == owner_id {
            return Ok(());
        }
        self.require_admin(actor, action)
    }
}
