use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::notifier::Notifier;
use crate::access::{AccessPolicy, Actor};
use crate::error::ServiceError;
use crate::listings::{Listing, ListingStatus};
use crate::store::{RecordStore, Table};
use crate::users::{NotificationFeed, NotificationKind, UserDirectory};

/// Administrator verdict on a pending listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    const fn target(self) -> ListingStatus {
        match self {
            Decision::Approve => ListingStatus::Active,
            Decision::Reject => ListingStatus::Rejected,
        }
    }

    const fn past_tense(self) -> &'static str {
        match self {
            Decision::Approve => "approved",
            Decision::Reject => "rejected",
        }
    }

    const fn action(self) -> &'static str {
        match self {
            Decision::Approve => "approve listings",
            Decision::Reject => "reject listings",
        }
    }

    /// Moves a pending listing to the decision's target state. Repeating a decision that
    /// already took effect changes nothing; reversing a decision is refused.
    fn apply(self, listing: &mut Listing, now: DateTime<Utc>) -> Result<bool, ServiceError> {
        match listing.status {
            ListingStatus::Pending => {
                listing.status = self.target();
                listing.updated_at = now;
                match self {
                    Decision::Approve => listing.approved_at = Some(now),
                    Decision::Reject => listing.rejected_at = Some(now),
                }
                Ok(true)
            }
            current if current == self.target() => Ok(false),
            current => Err(ServiceError::InvalidTransition {
                id: listing.id,
                current,
                attempted: self.past_tense(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "listing", rename_all = "snake_case")]
pub enum TransitionOutcome {
    Applied(Listing),
    /// The listing was already in the requested state; nothing was written or sent.
    Unchanged(Listing),
}

impl TransitionOutcome {
    pub fn listing(&self) -> &Listing {
        match self {
            TransitionOutcome::Applied(listing) | TransitionOutcome::Unchanged(listing) => listing,
        }
    }

    pub fn into_listing(self) -> Listing {
        match self {
            TransitionOutcome::Applied(listing) | TransitionOutcome::Unchanged(listing) => listing,
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockOutcome {
    pub user_id: u64,
    pub blocked: bool,
    pub changed: bool,
}

/// Administrator-driven transitions. Each one persists first and notifies afterwards;
/// delivery failures are logged and never undo a decision.
pub struct ModerationWorkflow<N> {
    store: Arc<RecordStore>,
    users: UserDirectory,
    feed: NotificationFeed,
    access: Arc<AccessPolicy>,
    notifier: Arc<N>,
}

impl<N> ModerationWorkflow<N>
where
    N: Notifier + 'static,
{
    pub fn new(store: Arc<RecordStore>, access: Arc<AccessPolicy>, notifier: Arc<N>) -> Self {
        Self {
            users: UserDirectory::new(Arc::clone(&store)),
            feed: NotificationFeed::new(Arc::clone(&store)),
            store,
            access,
            notifier,
        }
    }

    pub fn approve(&self, actor: Actor, listing_id: u64) -> Result<TransitionOutcome, ServiceError> {
        let outcome = self.decide(actor, listing_id, Decision::Approve)?;
        if let TransitionOutcome::Applied(listing) = &outcome {
            info!(listing_id, admin_id = actor.user_id, "listing approved");
            if let Err(err) = self.notifier.publish_to_channel(listing) {
                warn!(listing_id, error = %err, "channel publication failed");
            }
            let message = format!(
                "Your listing #{} \"{}\" has been approved and is now visible in search.",
                listing.id, listing.title
            );
            self.tell(
                listing.owner_id,
                "Listing approved",
                &message,
                NotificationKind::ListingApproved,
            );
        }
        Ok(outcome)
    }

    pub fn reject(
        &self,
        actor: Actor,
        listing_id: u64,
        reason: Option<&str>,
    ) -> Result<TransitionOutcome, ServiceError> {
        let outcome = self.decide(actor, listing_id, Decision::Reject)?;
        if let TransitionOutcome::Applied(listing) = &outcome {
            info!(listing_id, admin_id = actor.user_id, "listing rejected");
            let mut message = format!(
                "Your listing #{} \"{}\" was rejected by a moderator.",
                listing.id, listing.title
            );
            if let Some(reason) = reason.map(str::trim).filter(|reason| !reason.is_empty()) {
                message.push_str(" Reason: ");
                message.push_str(reason);
            }
            self.tell(
                listing.owner_id,
                "Listing rejected",
                &message,
                NotificationKind::ListingRejected,
            );
        }
        Ok(outcome)
    }

    /// Adds the user to the blocked set. Blocking an already blocked user is a silent no-op.
    /// Listings the user already has stay exactly as they are.
    pub fn block_user(&self, actor: Actor, user_id: u64) -> Result<BlockOutcome, ServiceError> {
        self.access.require_admin(actor, "block users")?;
        let changed = self.users.block(user_id)?;
        if changed {
            info!(user_id, admin_id = actor.user_id, "user blocked");
            self.tell(
                user_id,
                "Account blocked",
                "Your account has been blocked by an administrator.",
                NotificationKind::AccountBlocked,
            );
        }
        Ok(BlockOutcome {
            user_id,
            blocked: true,
            changed,
        })
    }

    /// Removes the user from the blocked set and notifies them, even when they were not
    /// blocked to begin with.
    pub fn unblock_user(&self, actor: Actor, user_id: u64) -> Result<BlockOutcome, ServiceError> {
        self.access.require_admin(actor, "unblock users")?;
        let changed = self.users.unblock(user_id)?;
        info!(user_id, admin_id = actor.user_id, changed, "user unblocked");
        self.tell(
            user_id,
            "Account unblocked",
            "Your account has been unblocked. You can submit listings again.",
            NotificationKind::AccountUnblocked,
        );
        Ok(BlockOutcome {
            user_id,
            blocked: false,
            changed,
        })
    }

    fn decide(
        &self,
        actor: Actor,
        listing_id: u64,
        decision: Decision,
    ) -> Result<TransitionOutcome, ServiceError> {
        self.access.require_admin(actor, decision.action())?;
        let now = self.store.now();
        self.store.modify(Table::Listings, |rows: &mut Vec<Listing>| {
            let listing = rows
                .iter_mut()
                .find(|listing| listing.id == listing_id)
                .ok_or_else(|| ServiceError::listing_not_found(listing_id))?;
            let changed = decision.apply(listing, now)?;
            let snapshot = listing.clone();
            Ok(if changed {
                TransitionOutcome::Applied(snapshot)
            } else {
                TransitionOutcome::Unchanged(snapshot)
            })
        })
    }

    /// Best-effort delivery: the inbox copy and the outbound message fail independently.
    fn tell(&self, user_id: u64, title: &str, message: &str, kind: NotificationKind) {
        if let Err(err) = self.feed.push(user_id, title, message, kind) {
            warn!(user_id, error = %err, "failed to store notification");
        }
        if let Err(err) = self.notifier.notify_user(user_id, title, message) {
            warn!(user_id, error = %err, "user notification failed");
        }
    }
}
