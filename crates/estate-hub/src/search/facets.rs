use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::listings::Listing;

pub const TOP_LOCATIONS: usize = 5;

/// Price histogram buckets: `[min, max)`, the last one open-ended.
pub const PRICE_RANGES: [(&str, f64, Option<f64>); 5] = [
    ("0-50000", 0.0, Some(50_000.0)),
    ("50000-100000", 50_000.0, Some(100_000.0)),
    ("100000-200000", 100_000.0, Some(200_000.0)),
    ("200000-500000", 200_000.0, Some(500_000.0)),
    ("500000+", 500_000.0, None),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeCount {
    pub label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationCount {
    pub location: String,
    pub count: usize,
}

/// Aggregates over one result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Facets {
    pub price_ranges: Vec<RangeCount>,
    pub top_locations: Vec<LocationCount>,
    pub property_types: BTreeMap<String, usize>,
}

impl Facets {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a Listing>) -> Self {
        let mut prices = [0usize; PRICE_RANGES.len()];
        let mut locations: HashMap<&str, usize> = HashMap::new();
        let mut property_types = BTreeMap::new();

        for listing in results {
            if let Some(slot) = PRICE_RANGES.iter().position(|(_, min, max)| {
                listing.price >= *min && max.map_or(true, |max| listing.price < max)
            }) {
                prices[slot] += 1;
            }
            *locations.entry(listing.location.as_str()).or_default() += 1;
            *property_types
                .entry(listing.property_type.label().to_string())
                .or_default() += 1;
        }

        let mut top_locations: Vec<LocationCount> = locations
            .into_iter()
            .map(|(location, count)| LocationCount {
                location: location.to_string(),
                count,
            })
            .collect();
        top_locations.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.location.cmp(&b.location)));
        top_locations.truncate(TOP_LOCATIONS);

        Self {
            price_ranges: PRICE_RANGES
                .iter()
                .zip(prices)
                .map(|(&(label, _, _), count)| RangeCount { label, count })
                .collect(),
            top_locations,
            property_types,
        }
    }

    pub fn price_count(&self, label: &str) -> Option<usize> {
        self.price_ranges
            .iter()
            .find(|range| range.label == label)
            .map(|range| range.count)
    }
}
