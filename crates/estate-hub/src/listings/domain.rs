use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::store::Record;

pub const MAX_IMAGES: usize = 10;
pub const MIN_TITLE_CHARS: usize = 5;
pub const MAX_TITLE_CHARS: usize = 200;

/// Moderation state of a listing. Only `active` listings are searchable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    #[default]
    Pending,
    #[serde(alias = "approved")]
    Active,
    Rejected,
}

impl ListingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ListingStatus::Pending => "pending",
            ListingStatus::Active => "active",
            ListingStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Apartment,
    House,
    Commercial,
    Office,
}

impl PropertyType {
    pub const ALL: [PropertyType; 4] = [
        PropertyType::Apartment,
        PropertyType::House,
        PropertyType::Commercial,
        PropertyType::Office,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            PropertyType::Apartment => "apartment",
            PropertyType::House => "house",
            PropertyType::Commercial => "commercial",
            PropertyType::Office => "office",
        }
    }

    /// Words users type for each category, canonical label first.
    pub const fn synonyms(self) -> &'static [&'static str] {
        match self {
            PropertyType::Apartment => &["apartment", "flat", "kvartira", "квартира"],
            PropertyType::House => &["house", "home", "uy", "hovli", "dom", "дом"],
            PropertyType::Commercial => &["commercial", "shop", "store", "tijorat", "магазин"],
            PropertyType::Office => &["office", "ofis", "офис"],
        }
    }

    /// Accepts the canonical label or any synonym, case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        let needle = raw.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.synonyms().iter().any(|word| *word == needle))
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    #[serde(default)]
    pub id: u64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: f64,
    pub location: String,
    pub property_type: PropertyType,
    #[serde(default)]
    pub rooms: u32,
    #[serde(default)]
    pub area: f64,
    #[serde(default)]
    pub images: Vec<String>,
    pub phone: String,
    pub owner_id: u64,
    #[serde(default)]
    pub status: ListingStatus,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
}

impl Listing {
    pub fn is_active(&self) -> bool {
        self.status == ListingStatus::Active
    }

    /// Text fields the search engine matches against, lowercased and space separated.
    pub fn searchable_text(&self) -> String {
        let mut text = String::with_capacity(self.title.len() + self.location.len() + 32);
        text.push_str(&self.title);
        text.push(' ');
        if let Some(description) = &self.description {
            text.push_str(description);
            text.push(' ');
        }
        text.push_str(&self.location);
        text.push(' ');
        text.push_str(self.property_type.label());
        text.to_lowercase()
    }
}

impl Record for Listing {
    fn id(&self) -> u64 {
        self.id
    }

    fn assign_id(&mut self, id: u64) {
        self.id = id;
    }

    fn stamp_created(&mut self, at: DateTime<Utc>) {
        self.created_at = at;
        self.updated_at = at;
    }
}

/// Raw listing fields as collected by the submission front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingSubmission {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    pub location: String,
    pub property_type: String,
    #[serde(default)]
    pub rooms: u32,
    #[serde(default)]
    pub area: f64,
    #[serde(default)]
    pub images: Vec<String>,
    pub phone: String,
}

impl ListingSubmission {
    /// Validates every field and produces a pending listing owned by `owner_id`. The id and
    /// creation timestamps are filled in by the store.
    pub fn into_listing(self, owner_id: u64) -> Result<Listing, ValidationError> {
        let property_type = parse_property_type(&self.property_type)?;

        Ok(Listing {
            id: 0,
            title: validate_title(&self.title)?,
            description: normalize_description(self.description),
            price: validate_amount("price", self.price)?,
            location: validate_location(&self.location)?,
            property_type,
            rooms: self.rooms,
            area: validate_amount("area", self.area)?,
            images: validate_images(self.images)?,
            phone: validate_phone(&self.phone)?,
            owner_id,
            status: ListingStatus::Pending,
            views: 0,
            created_at: DateTime::<Utc>::default(),
            updated_at: DateTime::<Utc>::default(),
            approved_at: None,
            rejected_at: None,
        })
    }
}

/// Partial edit of the descriptive fields. Status and counters are not editable here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingPatch {
    #[serde(default)]
    pub title: Option<String>,
    /// An empty string clears the description.
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub property_type: Option<String>,
    #[serde(default)]
    pub rooms: Option<u32>,
    #[serde(default)]
    pub area: Option<f64>,
    #[serde(default)]
    pub images: Option<Vec<String>>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl ListingPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Applies every present field, or none of them when any fails validation.
    pub fn apply(self, listing: &mut Listing) -> Result<(), ValidationError> {
        let mut next = listing.clone();
        if let Some(title) = self.title {
            next.title = validate_title(&title)?;
        }
        if let Some(description) = self.description {
            next.description = normalize_description(Some(description));
        }
        if let Some(price) = self.price {
            next.price = validate_amount("price", price)?;
        }
        if let Some(location) = self.location {
            next.location = validate_location(&location)?;
        }
        if let Some(kind) = self.property_type {
            next.property_type = parse_property_type(&kind)?;
        }
        if let Some(rooms) = self.rooms {
            next.rooms = rooms;
        }
        if let Some(area) = self.area {
            next.area = validate_amount("area", area)?;
        }
        if let Some(images) = self.images {
            next.images = validate_images(images)?;
        }
        if let Some(phone) = self.phone {
            next.phone = validate_phone(&phone)?;
        }
        *listing = next;
        Ok(())
    }
}

fn validate_title(raw: &str) -> Result<String, ValidationError> {
    let title = raw.trim();
    let chars = title.chars().count();
    if chars < MIN_TITLE_CHARS {
        return Err(ValidationError::new(
            "title",
            format!("must be at least {MIN_TITLE_CHARS} characters"),
        ));
    }
    if chars > MAX_TITLE_CHARS {
        return Err(ValidationError::new(
            "title",
            format!("must be at most {MAX_TITLE_CHARS} characters"),
        ));
    }
    Ok(title.to_string())
}

fn validate_amount(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::new(field, "must be a number"));
    }
    if value < 0.0 {
        return Err(ValidationError::new(field, "must not be negative"));
    }
    Ok(value)
}

fn validate_location(raw: &str) -> Result<String, ValidationError> {
    let location = raw.trim();
    if location.is_empty() {
        return Err(ValidationError::new("location", "is required"));
    }
    Ok(location.to_string())
}

fn validate_images(images: Vec<String>) -> Result<Vec<String>, ValidationError> {
    if images.len() > MAX_IMAGES {
        return Err(ValidationError::new(
            "images",
            format!("at most {MAX_IMAGES} images are allowed"),
        ));
    }
    Ok(images)
}

fn validate_phone(raw: &str) -> Result<String, ValidationError> {
    let phone = raw.trim();
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    let allowed = phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')'));
    if !allowed || !(7..=15).contains(&digits) {
        return Err(ValidationError::new(
            "phone",
            "must contain 7 to 15 digits",
        ));
    }
    Ok(phone.to_string())
}

fn parse_property_type(raw: &str) -> Result<PropertyType, ValidationError> {
    PropertyType::parse(raw).ok_or_else(|| {
        ValidationError::new(
            "property_type",
            format!("'{}' is not one of apartment, house, commercial, office", raw.trim()),
        )
    })
}

fn normalize_description(raw: Option<String>) -> Option<String> {
    raw.map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission() -> ListingSubmission {
        ListingSubmission {
            title: "  2 xonali kvartira Chilonzor  ".to_string(),
            description: Some("   ".to_string()),
            price: 65_000.0,
            location: "Chilonzor".to_string(),
            property_type: "Kvartira".to_string(),
            rooms: 2,
            area: 54.5,
            images: vec!["photo-1".to_string()],
            phone: "+998 90 123-45-67".to_string(),
        }
    }

    #[test]
    fn submission_becomes_pending_listing() {
        let listing = submission().into_listing(77).expect("valid submission");
        assert_eq!(listing.title, "2 xonali kvartira Chilonzor");
        assert_eq!(listing.description, None);
        assert_eq!(listing.property_type, PropertyType::Apartment);
        assert_eq!(listing.status, ListingStatus::Pending);
        assert_eq!(listing.owner_id, 77);
        assert_eq!(listing.views, 0);
    }

    #[test]
    fn submission_rejects_bad_fields() {
        let cases: Vec<(ListingSubmission, &str)> = vec![
            (
                ListingSubmission {
                    title: "Flat".to_string(),
                    ..submission()
                },
                "title",
            ),
            (
                ListingSubmission {
                    price: -1.0,
                    ..submission()
                },
                "price",
            ),
            (
                ListingSubmission {
                    price: f64::NAN,
                    ..submission()
                },
                "price",
            ),
            (
                ListingSubmission {
                    location: " ".to_string(),
                    ..submission()
                },
                "location",
            ),
            (
                ListingSubmission {
                    property_type: "castle".to_string(),
                    ..submission()
                },
                "property_type",
            ),
            (
                ListingSubmission {
                    images: vec!["img".to_string(); MAX_IMAGES + 1],
                    ..submission()
                },
                "images",
            ),
            (
                ListingSubmission {
                    phone: "call me".to_string(),
                    ..submission()
                },
                "phone",
            ),
        ];

        for (input, field) in cases {
            let err = input.into_listing(1).expect_err("invalid submission");
            assert_eq!(err.field, field);
        }
    }

    #[test]
    fn failed_patch_changes_nothing() {
        let mut listing = submission().into_listing(1).expect("valid");
        let original = listing.clone();
        let patch = ListingPatch {
            title: Some("Renovated flat near metro".to_string()),
            price: Some(-5.0),
            ..ListingPatch::default()
        };
        assert!(patch.apply(&mut listing).is_err());
        assert_eq!(listing, original);
    }

    #[test]
    fn status_accepts_legacy_approved_label() {
        let status: ListingStatus = serde_json::from_str("\"approved\"").expect("parses");
        assert_eq!(status, ListingStatus::Active);
        assert_eq!(serde_json::to_string(&status).expect("encodes"), "\"active\"");
    }

    #[test]
    fn missing_optional_fields_fall_back_to_defaults() {
        let raw = r#"{
            "id": 3,
            "title": "Office in Mirobod",
            "price": 90000,
            "location": "Mirobod",
            "property_type": "office",
            "phone": "998901234567",
            "owner_id": 5
        }"#;
        let listing: Listing = serde_json::from_str(raw).expect("parses");
        assert_eq!(listing.status, ListingStatus::Pending);
        assert!(listing.images.is_empty());
        assert_eq!(listing.rooms, 0);
        assert!(listing.approved_at.is_none());
    }
}
