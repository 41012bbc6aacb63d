//! Relevance search over active listings.
//!
//! Scores are additive per field (see [`scoring`]); listings scoring zero are dropped, the
//! rest are ordered by descending score with newer listings first on ties and capped at
//! [`MAX_RESULTS`]. Facets describe the returned results only, not the whole corpus.

pub mod facets;
pub mod log;
pub mod scoring;
pub mod suggest;

pub use facets::{Facets, LocationCount, RangeCount};
pub use log::{QueryFrequency, QueryLog, SearchLogEntry};

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ValidationError;
use crate::listings::Listing;
use crate::store::{RecordStore, Table};

pub const MAX_RESULTS: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredListing {
    pub score: f64,
    pub listing: Listing,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub query: String,
    pub results: Vec<ScoredListing>,
    pub suggestions: Vec<String>,
    pub facets: Facets,
}

pub struct SearchEngine {
    store: Arc<RecordStore>,
    log: QueryLog,
}

impl SearchEngine {
    pub fn new(store: Arc<RecordStore>) -> Self {
        let log = QueryLog::new(Arc::clone(&store));
        Self { store, log }
    }

    pub fn query_log(&self) -> &QueryLog {
        &self.log
    }

    /// Searches the current active-listing snapshot of the store.
    pub fn search_store(&self, query: &str, client: &str) -> Result<SearchOutcome, ValidationError> {
        let listings: Vec<Listing> = self
            .store
            .read_all::<Listing>(Table::Listings)
            .into_iter()
            .filter(Listing::is_active)
            .collect();
        self.search(&listings, query, client)
    }

    /// Ranks `listings` for `query` and records the search in the query log. Listings that
    /// are not active are ignored even when passed in.
    pub fn search(
        &self,
        listings: &[Listing],
        query: &str,
        client: &str,
    ) -> Result<SearchOutcome, ValidationError> {
        let normalized = query.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(ValidationError::new("query", "must not be empty"));
        }

        let eligible: Vec<&Listing> = listings.iter().filter(|listing| listing.is_active()).collect();
        let results = rank(&eligible, &normalized);
        let facets = Facets::from_results(results.iter().map(|scored| &scored.listing));
        let suggestions = suggest::suggestions(eligible.iter().copied(), &normalized);

        debug!(query = %normalized, results = results.len(), "search executed");
        let entry = SearchLogEntry {
            query: query.trim().to_string(),
            result_count: results.len(),
            timestamp: self.store.now(),
            client: client.to_string(),
        };
        if let Err(err) = self.log.append(entry) {
            warn!(error = %err, "failed to record search in query log");
        }

        Ok(SearchOutcome {
            query: query.trim().to_string(),
            results,
            suggestions,
            facets,
        })
    }
}

/// Scores, filters, orders and caps. Ties keep newer listings first.
pub fn rank(listings: &[&Listing], normalized_query: &str) -> Vec<ScoredListing> {
    let mut scored: Vec<ScoredListing> = listings
        .iter()
        .filter_map(|listing| {
            let score = scoring::score_listing(listing, normalized_query);
            (score > 0.0).then(|| ScoredListing {
                score,
                listing: (*listing).clone(),
            })
        })
        .collect();
    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.listing.id.cmp(&a.listing.id))
    });
    scored.truncate(MAX_RESULTS);
    scored
}
