//! The complete core operation surface as one closed enum.
//!
//! Transport layers (the HTTP service, the CLI) translate their input into an [`Operation`]
//! and hand it to [`Marketplace::execute`]; adding an operation means adding a variant and
//! the compiler points at every place that has to handle it.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::access::{AccessPolicy, Actor};
use crate::error::ServiceError;
use crate::listings::{
    Listing, ListingFilter, ListingPage, ListingPatch, ListingService, ListingSubmission,
    PageRequest, SortOrder,
};
use crate::moderation::{BlockOutcome, ModerationWorkflow, Notifier, TransitionOutcome};
use crate::ratelimit::{RateDecision, RateLimiter};
use crate::search::{SearchEngine, SearchOutcome};
use crate::store::RecordStore;
use crate::users::{Notification, NotificationFeed, User, UserContact, UserDirectory};

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    ListCreate {
        submission: ListingSubmission,
    },
    ListRead {
        filter: ListingFilter,
        sort: SortOrder,
        page: PageRequest,
    },
    ListUpdate {
        id: u64,
        patch: ListingPatch,
    },
    ListDelete {
        id: u64,
    },
    Search {
        query: String,
        client: String,
    },
    ModerationApprove {
        id: u64,
    },
    ModerationReject {
        id: u64,
        reason: Option<String>,
    },
    UserBlock {
        user_id: u64,
    },
    UserUnblock {
        user_id: u64,
    },
    RateLimitCheck {
        identifier: String,
        limit: u32,
        window: Duration,
    },
    NotificationsFetch {
        user_id: u64,
    },
    /// Records a user's profile on contact. Only the user or an administrator may do so.
    UserTouch {
        contact: UserContact,
    },
}

impl Operation {
    /// Stable name used in logs and metrics.
    pub const fn name(&self) -> &'static str {
        match self {
            Operation::ListCreate { .. } => "list_create",
            Operation::ListRead { .. } => "list_read",
            Operation::ListUpdate { .. } => "list_update",
            Operation::ListDelete { .. } => "list_delete",
            Operation::Search { .. } => "search",
            Operation::ModerationApprove { .. } => "moderation_approve",
            Operation::ModerationReject { .. } => "moderation_reject",
            Operation::UserBlock { .. } => "user_block",
            Operation::UserUnblock { .. } => "user_unblock",
            Operation::RateLimitCheck { .. } => "rate_limit_check",
            Operation::NotificationsFetch { .. } => "notifications_fetch",
            Operation::UserTouch { .. } => "user_touch",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OperationOutput {
    Listing(Listing),
    Page(ListingPage),
    Deleted { deleted: u64 },
    Search(SearchOutcome),
    Transition(TransitionOutcome),
    Block(BlockOutcome),
    RateLimit(RateDecision),
    Notifications(Vec<Notification>),
    User(User),
}

/// Every core component wired to one shared record store.
pub struct Marketplace<N> {
    store: Arc<RecordStore>,
    access: Arc<AccessPolicy>,
    listings: ListingService,
    search: SearchEngine,
    moderation: ModerationWorkflow<N>,
    users: UserDirectory,
    feed: NotificationFeed,
    limiter: RateLimiter,
}

impl<N> Marketplace<N>
where
    N: Notifier + 'static,
{
    pub fn new(store: Arc<RecordStore>, access: AccessPolicy, notifier: Arc<N>) -> Self {
        let access = Arc::new(access);
        Self {
            listings: ListingService::new(Arc::clone(&store), Arc::clone(&access)),
            search: SearchEngine::new(Arc::clone(&store)),
            moderation: ModerationWorkflow::new(Arc::clone(&store), Arc::clone(&access), notifier),
            users: UserDirectory::new(Arc::clone(&store)),
            feed: NotificationFeed::new(Arc::clone(&store)),
            limiter: RateLimiter::new(Arc::clone(&store)),
            store,
            access,
        }
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    pub fn access(&self) -> &AccessPolicy {
        &self.access
    }

    pub fn listings(&self) -> &ListingService {
        &self.listings
    }

    pub fn search_engine(&self) -> &SearchEngine {
        &self.search
    }

    pub fn moderation(&self) -> &ModerationWorkflow<N> {
        &self.moderation
    }

    pub fn users(&self) -> &UserDirectory {
        &self.users
    }

    pub fn execute(&self, actor: Actor, operation: Operation) -> Result<OperationOutput, ServiceError> {
        let output = match operation {
            Operation::ListCreate { submission } => {
                OperationOutput::Listing(self.listings.create(actor, submission)?)
            }
            Operation::ListRead { filter, sort, page } => {
                OperationOutput::Page(self.listings.read(&filter, sort, page))
            }
            Operation::ListUpdate { id, patch } => {
                OperationOutput::Listing(self.listings.update(actor, id, patch)?)
            }
            Operation::ListDelete { id } => {
                self.listings.delete(actor, id)?;
                OperationOutput::Deleted { deleted: id }
            }
            Operation::Search { query, client } => {
                OperationOutput::Search(self.search.search_store(&query, &client)?)
            }
            Operation::ModerationApprove { id } => {
                OperationOutput::Transition(self.moderation.approve(actor, id)?)
            }
            Operation::ModerationReject { id, reason } => {
                OperationOutput::Transition(self.moderation.reject(actor, id, reason.as_deref())?)
            }
            Operation::UserBlock { user_id } => {
                OperationOutput::Block(self.moderation.block_user(actor, user_id)?)
            }
            Operation::UserUnblock { user_id } => {
                OperationOutput::Block(self.moderation.unblock_user(actor, user_id)?)
            }
            Operation::RateLimitCheck {
                identifier,
                limit,
                window,
            } => OperationOutput::RateLimit(self.limiter.check(&identifier, limit, window)?),
            Operation::NotificationsFetch { user_id } => {
                self.access
                    .require_owner_or_admin(actor, user_id, "read these notifications")?;
                OperationOutput::Notifications(self.feed.fetch(user_id)?)
            }
            Operation::UserTouch { contact } => {
                self.access
                    .require_owner_or_admin(actor, contact.id, "edit this profile")?;
                OperationOutput::User(self.users.touch(contact)?)
            }
        };
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::listings::ListingStatus;
    use crate::moderation::NotifierError;

    struct SilentNotifier;

    impl Notifier for SilentNotifier {
        fn publish_to_channel(&self, _listing: &Listing) -> Result<(), NotifierError> {
            Ok(())
        }

        fn notify_user(&self, _user_id: u64, _title: &str, _message: &str) -> Result<(), NotifierError> {
            Ok(())
        }
    }

    const ADMIN: Actor = Actor::new(1);
    const SELLER: Actor = Actor::new(77);

    fn marketplace() -> Marketplace<SilentNotifier> {
        let clock = Arc::new(ManualClock::at_timestamp(1_700_000_000));
        let store = Arc::new(RecordStore::in_memory(clock));
        Marketplace::new(store, AccessPolicy::new([ADMIN.user_id]), Arc::new(SilentNotifier))
    }

    fn submission() -> ListingSubmission {
        ListingSubmission {
            title: "Hovli in Sergeli with garden".to_string(),
            description: Some("Quiet street".to_string()),
            price: 140_000.0,
            location: "Sergeli".to_string(),
            property_type: "hovli".to_string(),
            rooms: 5,
            area: 210.0,
            images: Vec::new(),
            phone: "+998 90 555 44 33".to_string(),
        }
    }

    fn created_id(output: OperationOutput) -> u64 {
        match output {
            OperationOutput::Listing(listing) => listing.id,
            other => panic!("expected listing, got {other:?}"),
        }
    }

    #[test]
    fn listing_becomes_searchable_only_after_approval() {
        let market = marketplace();
        let id = created_id(
            market
                .execute(SELLER, Operation::ListCreate { submission: submission() })
                .expect("create"),
        );
        let search = || {
            market.execute(
                SELLER,
                Operation::Search {
                    query: "sergeli".to_string(),
                    client: "seller".to_string(),
                },
            )
        };

        match search().expect("search") {
            OperationOutput::Search(outcome) => assert!(outcome.results.is_empty()),
            other => panic!("unexpected {other:?}"),
        }

        market
            .execute(ADMIN, Operation::ModerationApprove { id })
            .expect("approve");
        match search().expect("search") {
            OperationOutput::Search(outcome) => {
                assert_eq!(outcome.results.len(), 1);
                assert_eq!(outcome.results[0].listing.status, ListingStatus::Active);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn errors_propagate_from_each_component() {
        let market = marketplace();
        assert!(matches!(
            market.execute(SELLER, Operation::ListDelete { id: 1 }),
            Err(ServiceError::Permission { .. })
        ));
        assert!(matches!(
            market.execute(
                SELLER,
                Operation::Search {
                    query: "   ".to_string(),
                    client: "seller".to_string(),
                }
            ),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            market.execute(
                SELLER,
                Operation::RateLimitCheck {
                    identifier: "seller".to_string(),
                    limit: 3,
                    window: Duration::ZERO,
                }
            ),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            market.execute(ADMIN, Operation::ModerationReject { id: 9, reason: None }),
            Err(ServiceError::NotFound { id: 9, .. })
        ));
    }

    #[test]
    fn notifications_are_private_to_their_owner() {
        let market = marketplace();
        let id = created_id(
            market
                .execute(SELLER, Operation::ListCreate { submission: submission() })
                .expect("create"),
        );
        market
            .execute(
                ADMIN,
                Operation::ModerationReject {
                    id,
                    reason: Some("duplicate".to_string()),
                },
            )
            .expect("reject");

        assert!(matches!(
            market.execute(Actor::new(5), Operation::NotificationsFetch { user_id: SELLER.user_id }),
            Err(ServiceError::Permission { .. })
        ));
        match market
            .execute(SELLER, Operation::NotificationsFetch { user_id: SELLER.user_id })
            .expect("own inbox")
        {
            OperationOutput::Notifications(items) => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].title, "Listing rejected");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn users_register_themselves_on_first_contact() {
        let market = marketplace();
        let contact = UserContact {
            id: SELLER.user_id,
            display_name: "Dilnoza".to_string(),
            phone: Some("+998901112233".to_string()),
            handle: None,
        };
        assert!(matches!(
            market.execute(Actor::new(5), Operation::UserTouch { contact: contact.clone() }),
            Err(ServiceError::Permission { .. })
        ));
        match market
            .execute(SELLER, Operation::UserTouch { contact })
            .expect("touch")
        {
            OperationOutput::User(user) => assert_eq!(user.display_name, "Dilnoza"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(market.users().broadcast_audience(), vec![SELLER.user_id]);
    }

    #[test]
    fn operation_names_are_stable() {
        assert_eq!(Operation::ListDelete { id: 1 }.name(), "list_delete");
        assert_eq!(
            Operation::RateLimitCheck {
                identifier: String::new(),
                limit: 0,
                window: Duration::ZERO,
            }
            .name(),
            "rate_limit_check"
        );
    }
}
