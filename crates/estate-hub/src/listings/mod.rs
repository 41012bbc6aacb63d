//! Listing records, submission validation and the browse operations.

pub mod domain;
pub mod query;
pub mod service;

pub use domain::{Listing, ListingPatch, ListingStatus, ListingSubmission, PropertyType};
pub use query::{ListingFilter, ListingPage, PageRequest, SortOrder, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use service::ListingService;
