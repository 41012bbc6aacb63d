use std::sync::Arc;

use tracing::info;

use super::domain::{Listing, ListingPatch, ListingSubmission};
use super::query::{paginate, ListingFilter, ListingPage, PageRequest, SortOrder};
use crate::access::{AccessPolicy, Actor};
use crate::error::{ServiceError, ValidationError};
use crate::store::{RecordStore, Table};

/// Create/read/update/delete operations on the listings table.
pub struct ListingService {
    store: Arc<RecordStore>,
    access: Arc<AccessPolicy>,
}

impl ListingService {
    pub fn new(store: Arc<RecordStore>, access: Arc<AccessPolicy>) -> Self {
        Self { store, access }
    }

    /// Validates the submission and stores it as a pending listing owned by the actor.
    pub fn create(
        &self,
        actor: Actor,
        submission: ListingSubmission,
    ) -> Result<Listing, ServiceError> {
        let listing = submission.into_listing(actor.user_id)?;
        let stored = self.store.insert(Table::Listings, listing)?;
        info!(listing_id = stored.id, owner_id = stored.owner_id, "listing submitted for moderation");
        Ok(stored)
    }

    pub fn read(&self, filter: &ListingFilter, sort: SortOrder, page: PageRequest) -> ListingPage {
        paginate(self.store.read_all(Table::Listings), filter, sort, page)
    }

    pub fn get(&self, id: u64) -> Result<Listing, ServiceError> {
        self.store
            .find(Table::Listings, id)
            .ok_or_else(|| ServiceError::listing_not_found(id))
    }

    pub fn update(
        &self,
        actor: Actor,
        id: u64,
        patch: ListingPatch,
    ) -> Result<Listing, ServiceError> {
        if patch.is_empty() {
            return Err(ValidationError::new("patch", "no fields to update").into());
        }

        let now = self.store.now();
        self.store.modify(Table::Listings, |rows: &mut Vec<Listing>| {
            let listing = rows
                .iter_mut()
                .find(|listing| listing.id == id)
                .ok_or_else(|| ServiceError::listing_not_found(id))?;
            self.access
                .require_owner_or_admin(actor, listing.owner_id, "edit this listing")?;
            patch.apply(listing)?;
            listing.updated_at = now;
            Ok(listing.clone())
        })
    }

    /// Physical removal, reserved for administrators.
    pub fn delete(&self, actor: Actor, id: u64) -> Result<(), ServiceError> {
        self.access.require_admin(actor, "delete listings")?;
        if self.store.delete::<Listing>(Table::Listings, id)? {
            info!(listing_id = id, admin_id = actor.user_id, "listing deleted");
            Ok(())
        } else {
            Err(ServiceError::listing_not_found(id))
        }
    }

    /// Bumps the view counter and returns the new total.
    pub fn record_view(&self, id: u64) -> Result<u64, ServiceError> {
        self.store.modify(Table::Listings, |rows: &mut Vec<Listing>| {
            let listing = rows
                .iter_mut()
                .find(|listing| listing.id == id)
                .ok_or_else(|| ServiceError::listing_not_found(id))?;
            listing.views = listing.views.saturating_add(1);
            Ok(listing.views)
        })
    }

    /// Read-only feed of every listing currently visible to consumers.
    pub fn active_snapshot(&self) -> Vec<Listing> {
        self.store
            .read_all::<Listing>(Table::Listings)
            .into_iter()
            .filter(Listing::is_active)
            .collect()
    }
}
