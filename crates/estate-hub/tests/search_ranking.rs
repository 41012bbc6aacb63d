//! Ranking, facet and query-log behavior of the search engine seen through its public API.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use estate_hub::clock::ManualClock;
use estate_hub::listings::{Listing, ListingStatus, PropertyType};
use estate_hub::search::{SearchEngine, MAX_RESULTS};
use estate_hub::store::RecordStore;

fn engine() -> SearchEngine {
    let clock = Arc::new(ManualClock::at_timestamp(1_700_000_000));
    SearchEngine::new(Arc::new(RecordStore::in_memory(clock)))
}

fn listing(id: u64, title: &str, location: &str, description: Option<&str>, price: f64) -> Listing {
    Listing {
        id,
        title: title.to_string(),
        description: description.map(str::to_string),
        price,
        location: location.to_string(),
        property_type: PropertyType::Apartment,
        rooms: 2,
        area: 60.0,
        images: Vec::new(),
        phone: "+998901234567".to_string(),
        owner_id: 10 + id,
        status: ListingStatus::Active,
        views: 0,
        created_at: DateTime::<Utc>::default(),
        updated_at: DateTime::<Utc>::default(),
        approved_at: None,
        rejected_at: None,
    }
}

#[test]
fn exact_title_outranks_location_only_match() {
    let corpus = vec![
        listing(1, "Flat near the park", "Yunusobod", None, 70_000.0),
        listing(2, "Yunusobod", "Chilonzor", None, 70_000.0),
    ];
    let outcome = engine()
        .search(&corpus, "Yunusobod", "test")
        .expect("valid query");

    assert_eq!(outcome.results.len(), 2);
    let (a, b) = (&outcome.results[0], &outcome.results[1]);
    assert_eq!(a.listing.id, 2);
    assert!(a.score <= 100.0);
    assert!(a.score > b.score);
    assert!(b.score <= 80.0);
}

#[test]
fn exact_kvartira_title_beats_fuzzy_description() {
    let corpus = vec![
        listing(1, "Cozy home in Sergeli", "Sergeli", Some("kvaxxira near metro"), 55_000.0),
        listing(2, "3 xonali kvartira", "Yunusobod", None, 90_000.0),
    ];
    let outcome = engine().search(&corpus, "kvartira", "test").expect("valid query");

    let ids: Vec<u64> = outcome.results.iter().map(|scored| scored.listing.id).collect();
    assert_eq!(ids, vec![2, 1]);
    assert_eq!(outcome.results[0].score, 100.0);
    assert_eq!(outcome.results[1].score, 37.5);
}

#[test]
fn only_active_listings_are_eligible() {
    let mut pending = listing(1, "Kvartira pending review", "Mirobod", None, 50_000.0);
    pending.status = ListingStatus::Pending;
    let mut rejected = listing(2, "Kvartira rejected", "Mirobod", None, 50_000.0);
    rejected.status = ListingStatus::Rejected;
    let active = listing(3, "Kvartira approved", "Mirobod", None, 50_000.0);

    let outcome = engine()
        .search(&[pending, rejected, active], "kvartira", "test")
        .expect("valid query");
    let ids: Vec<u64> = outcome.results.iter().map(|scored| scored.listing.id).collect();
    assert_eq!(ids, vec![3]);
}

#[test]
fn facets_bucket_the_result_prices() {
    let corpus = vec![
        listing(1, "Flat one", "Sergeli", None, 40_000.0),
        listing(2, "Flat two", "Sergeli", None, 120_000.0),
        listing(3, "Flat three", "Olmazor", None, 600_000.0),
    ];
    let outcome = engine().search(&corpus, "flat", "test").expect("valid query");
    let facets = &outcome.facets;

    assert_eq!(facets.price_count("0-50000"), Some(1));
    assert_eq!(facets.price_count("50000-100000"), Some(0));
    assert_eq!(facets.price_count("100000-200000"), Some(1));
    assert_eq!(facets.price_count("200000-500000"), Some(0));
    assert_eq!(facets.price_count("500000+"), Some(1));
    assert_eq!(facets.top_locations[0].location, "Sergeli");
    assert_eq!(facets.top_locations[0].count, 2);
}

#[test]
fn results_are_capped_and_ties_prefer_newer_listings() {
    let corpus: Vec<Listing> = (1..=30)
        .map(|id| listing(id, &format!("Studio flat #{id}"), "Yakkasaroy", None, 30_000.0))
        .collect();
    let outcome = engine().search(&corpus, "studio", "test").expect("valid query");

    assert_eq!(outcome.results.len(), MAX_RESULTS);
    assert_eq!(outcome.results[0].listing.id, 30);
    assert_eq!(outcome.results[MAX_RESULTS - 1].listing.id, 11);
}

#[test]
fn every_search_is_logged_and_blank_queries_are_not() {
    let engine = engine();
    let corpus = vec![listing(1, "Kvartira Chilonzor", "Chilonzor", None, 45_000.0)];

    engine.search(&corpus, "kvartira", "kiosk").expect("valid");
    engine.search(&corpus, "Kvartira", "bot").expect("valid");
    engine.search(&corpus, "ofis", "bot").expect("valid");
    assert!(engine.search(&corpus, "   ", "bot").is_err());

    let recent = engine.query_log().recent(10);
    assert_eq!(recent.len(), 3);
    assert_eq!(recent[0].query, "ofis");
    assert_eq!(recent[0].result_count, 0);
    assert_eq!(recent[2].client, "kiosk");

    let popular = engine.query_log().popular(1);
    assert_eq!(popular[0].query, "kvartira");
    assert_eq!(popular[0].count, 2);
}

#[test]
fn multi_word_query_finds_listings_containing_every_word() {
    let corpus = vec![
        listing(1, "Kvartira in Chilonzor", "Chilonzor", None, 65_000.0),
        listing(2, "Hovli with garden", "Bektemir", None, 65_000.0),
    ];
    let engine = engine();

    let exact = engine
        .search(&corpus, "kvartira chilonzor", "test")
        .expect("valid query");
    let ids: Vec<u64> = exact.results.iter().map(|scored| scored.listing.id).collect();
    assert_eq!(ids, vec![1]);
    assert_eq!(exact.results[0].score, 100.0);

    let misspelled = engine
        .search(&corpus, "kvartra chilonzr", "test")
        .expect("valid query");
    assert_eq!(misspelled.results.len(), 1);
    assert!(exact.results[0].score > misspelled.results[0].score);
}
