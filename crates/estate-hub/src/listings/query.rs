use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::domain::{Listing, ListingStatus, PropertyType};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Browse filter. Every present field must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingFilter {
    #[serde(default)]
    pub status: Option<ListingStatus>,
    #[serde(default)]
    pub property_type: Option<PropertyType>,
    #[serde(default)]
    pub owner_id: Option<u64>,
    /// Case-insensitive substring of the location.
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub min_price: Option<f64>,
    #[serde(default)]
    pub max_price: Option<f64>,
    #[serde(default)]
    pub min_rooms: Option<u32>,
}

impl ListingFilter {
    pub fn active() -> Self {
        Self {
            status: Some(ListingStatus::Active),
            ..Self::default()
        }
    }

    pub fn matches(&self, listing: &Listing) -> bool {
        if self.status.is_some_and(|status| listing.status != status) {
            return false;
        }
        if self
            .property_type
            .is_some_and(|kind| listing.property_type != kind)
        {
            return false;
        }
        if self.owner_id.is_some_and(|owner| listing.owner_id != owner) {
            return false;
        }
        if let Some(location) = self.location.as_deref().map(str::trim) {
            if !location.is_empty()
                && !listing
                    .location
                    .to_lowercase()
                    .contains(&location.to_lowercase())
            {
                return false;
            }
        }
        if self.min_price.is_some_and(|min| listing.price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| listing.price > max) {
            return false;
        }
        if self.min_rooms.is_some_and(|rooms| listing.rooms < rooms) {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    PriceAsc,
    PriceDesc,
    MostViewed,
}

impl SortOrder {
    pub fn compare(self, a: &Listing, b: &Listing) -> Ordering {
        match self {
            SortOrder::Newest => b.id.cmp(&a.id),
            SortOrder::Oldest => a.id.cmp(&b.id),
            SortOrder::PriceAsc => a.price.total_cmp(&b.price).then(b.id.cmp(&a.id)),
            SortOrder::PriceDesc => b.price.total_cmp(&a.price).then(b.id.cmp(&a.id)),
            SortOrder::MostViewed => b.views.cmp(&a.views).then(b.id.cmp(&a.id)),
        }
    }
}

/// One-based page request. Out-of-range values are clamped rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_PAGE_SIZE),
        }
    }

    fn normalized(self) -> Self {
        Self::new(self.page, self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

fn first_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingPage {
    pub items: Vec<Listing>,
    pub total: usize,
    pub page: u32,
    pub limit: u32,
}

/// Filters, sorts and slices an in-memory table snapshot.
pub fn paginate(
    listings: Vec<Listing>,
    filter: &ListingFilter,
    sort: SortOrder,
    page: PageRequest,
) -> ListingPage {
    let page = page.normalized();
    let mut matching: Vec<Listing> = listings
        .into_iter()
        .filter(|listing| filter.matches(listing))
        .collect();
    matching.sort_by(|a, b| sort.compare(a, b));

    let total = matching.len();
    let offset = (page.page as usize - 1).saturating_mul(page.limit as usize);
    let items = matching
        .into_iter()
        .skip(offset)
        .take(page.limit as usize)
        .collect();

    ListingPage {
        items,
        total,
        page: page.page,
        limit: page.limit,
    }
}
