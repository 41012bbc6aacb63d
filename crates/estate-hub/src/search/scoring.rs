use crate::listings::Listing;

pub const TITLE_WEIGHT: f64 = 100.0;
pub const LOCATION_WEIGHT: f64 = 80.0;
pub const PROPERTY_TYPE_WEIGHT: f64 = 70.0;
pub const DESCRIPTION_WEIGHT: f64 = 60.0;
pub const NUMERIC_WEIGHT: f64 = 90.0;
/// Tokens must be longer than this to earn a fuzzy bonus.
pub const FUZZY_MIN_TOKEN_CHARS: usize = 3;
/// Similarity percentage a token must exceed to earn a fuzzy bonus.
pub const FUZZY_THRESHOLD: f64 = 70.0;

/// Additive relevance of `listing` for an already lowercased, trimmed query.
pub fn score_listing(listing: &Listing, query: &str) -> f64 {
    if query.is_empty() {
        return 0.0;
    }

    let mut score = 0.0;
    if listing.title.to_lowercase().contains(query) {
        score += TITLE_WEIGHT;
    }
    if listing.location.to_lowercase().contains(query) {
        score += LOCATION_WEIGHT;
    }
    if listing.property_type.label().contains(query) {
        score += PROPERTY_TYPE_WEIGHT;
    }
    if listing
        .description
        .as_deref()
        .is_some_and(|description| description.to_lowercase().contains(query))
    {
        score += DESCRIPTION_WEIGHT;
    }
    if let Some(number) = numeric_query(query) {
        if listing.price == number || f64::from(listing.rooms) == number || listing.area == number
        {
            score += NUMERIC_WEIGHT;
        }
    }

    if score > 0.0 {
        return score;
    }
    fuzzy_bonus(&listing.searchable_text(), query)
}

fn numeric_query(query: &str) -> Option<f64> {
    let purely_numeric = query.chars().any(|c| c.is_ascii_digit())
        && query.chars().all(|c| c.is_ascii_digit() || c == '.');
    if purely_numeric {
        query.parse().ok()
    } else {
        None
    }
}

/// Typo tolerance for queries that matched no field as a whole: each token earns half of its
/// best similarity against the words of the listing, when that similarity exceeds
/// [`FUZZY_THRESHOLD`]. A token present verbatim counts as 100% similar.
fn fuzzy_bonus(haystack: &str, query: &str) -> f64 {
    let words: Vec<&str> = haystack
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect();

    query
        .split_whitespace()
        .filter(|token| token.chars().count() > FUZZY_MIN_TOKEN_CHARS)
        .map(|token| {
            words
                .iter()
                .map(|word| similarity_percent(token, word))
                .fold(0.0_f64, f64::max)
        })
        .filter(|similarity| *similarity > FUZZY_THRESHOLD)
        .map(|similarity| similarity / 2.0)
        .sum()
}

/// Character similarity as a percentage: twice the number of characters shared by the
/// recursive longest-common-substring decomposition, over the combined length.
pub fn similarity_percent(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 0.0;
    }
    (common_chars(&a, &b) * 2) as f64 * 100.0 / total as f64
}

fn common_chars(a: &[char], b: &[char]) -> usize {
    let (mut best, mut at_a, mut at_b) = (0, 0, 0);
    for i in 0..a.len() {
        for j in 0..b.len() {
            let run = a[i..]
                .iter()
                .zip(&b[j..])
                .take_while(|(x, y)| x == y)
                .count();
            if run > best {
                (best, at_a, at_b) = (run, i, j);
            }
        }
    }
    if best == 0 {
        return 0;
    }
    best + common_chars(&a[..at_a], &b[..at_b])
        + common_chars(&a[at_a + best..], &b[at_b + best..])
}
