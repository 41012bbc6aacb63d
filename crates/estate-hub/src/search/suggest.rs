use crate::listings::{Listing, PropertyType};

pub const MAX_SUGGESTIONS: usize = 5;

/// Queries people run often enough to offer as completions.
pub const POPULAR_QUERIES: &[&str] = &[
    "1 xonali kvartira",
    "2 xonali kvartira",
    "3 xonali kvartira",
    "hovli",
    "yangi uy",
    "ofis",
    "apartment in city center",
    "house with garden",
    "commercial space",
    "office for rent",
];

/// Completions for `query` (lowercased, trimmed): matching locations from `listings`, then
/// property-type synonyms, then popular queries. Case-insensitive duplicates are dropped.
pub fn suggestions<'a>(listings: impl IntoIterator<Item = &'a Listing>, query: &str) -> Vec<String> {
    if query.is_empty() {
        return Vec::new();
    }

    let locations = listings.into_iter().map(|listing| listing.location.as_str());
    let synonyms = PropertyType::ALL
        .into_iter()
        .flat_map(|kind| kind.synonyms().iter().copied());
    let popular = POPULAR_QUERIES.iter().copied();

    let mut picked: Vec<String> = Vec::with_capacity(MAX_SUGGESTIONS);
    for candidate in locations.chain(synonyms).chain(popular) {
        if picked.len() == MAX_SUGGESTIONS {
            break;
        }
        let lowered = candidate.to_lowercase();
        if !lowered.contains(query) {
            continue;
        }
        if picked.iter().any(|seen| seen.to_lowercase() == lowered) {
            continue;
        }
        picked.push(candidate.to_string());
    }
    picked
}
