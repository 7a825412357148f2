//! Core domain model for guest reviews and per-category rating resolution.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

pub const CRATE_NAME: &str = "rvw-core";

/// Opaque review identifier, compared by value and used as a lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ReviewId(String);

impl ReviewId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReviewId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ReviewId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Published,
    #[default]
    Unpublished,
}

impl ReviewStatus {
    /// Only the exact string `published` counts as published.
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            Some("published") => Self::Published,
            _ => Self::Unpublished,
        }
    }

    pub fn is_published(self) -> bool {
        matches!(self, Self::Published)
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Published => Self::Unpublished,
            Self::Unpublished => Self::Published,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::Unpublished => "unpublished",
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rating exactly as received from the source. Numeric coercion happens on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct RawRating(JsonValue);

impl RawRating {
    pub fn new(value: JsonValue) -> Self {
        Self(value)
    }

    pub fn raw(&self) -> &JsonValue {
        &self.0
    }

    /// Numeric value of the rating; anything non-numeric reads as `0`.
    pub fn coerce(&self) -> f64 {
        let value = match &self.0 {
            JsonValue::Number(n) => n.as_f64().unwrap_or(0.0),
            JsonValue::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(0.0)
                }
            }
            JsonValue::Bool(true) => 1.0,
            _ => 0.0,
        };
        if value.is_finite() {
            value
        } else {
            0.0
        }
    }
}

impl From<f64> for RawRating {
    fn from(value: f64) -> Self {
        Self(serde_json::json!(value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CategoryRating {
    pub category: String,
    pub rating: RawRating,
}

impl CategoryRating {
    pub fn new(category: impl Into<String>, rating: impl Into<RawRating>) -> Self {
        Self {
            category: category.into(),
            rating: rating.into(),
        }
    }
}

/// Which rating a review is measured by: the mean of all categories, or one named category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum CategorySelector {
    #[default]
    Average,
    Named(String),
}

impl CategorySelector {
    pub fn named(category: impl Into<String>) -> Self {
        Self::Named(category.into())
    }
}

impl From<String> for CategorySelector {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Average" | "All Categories" => Self::Average,
            _ => Self::Named(value),
        }
    }
}

impl From<CategorySelector> for String {
    fn from(value: CategorySelector) -> Self {
        value.to_string()
    }
}

impl FromStr for CategorySelector {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s.to_string()))
    }
}

impl fmt::Display for CategorySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Average => f.write_str("Average"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// Canonical review produced by normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    pub guest_name: Option<String>,
    pub listing_name: Option<String>,
    pub channel: Option<String>,
    /// Timestamp text as received; may be malformed.
    pub submitted_at: Option<String>,
    pub status: ReviewStatus,
    pub categories: Vec<CategoryRating>,
    pub text: Option<String>,
}

impl Review {
    pub fn is_published(&self) -> bool {
        self.status.is_published()
    }

    pub fn submitted_instant(&self) -> Option<DateTime<Utc>> {
        self.submitted_at.as_deref().and_then(parse_timestamp)
    }

    /// Single numeric rating for this review under `selector`.
    ///
    /// `Average` is the mean of every category rating (non-numeric counts as `0`).
    /// A named selector reads the first category with exactly that name; a missing
    /// category, like an empty category list, resolves to `0`.
    pub fn category_value(&self, selector: &CategorySelector) -> f64 {
        if self.categories.is_empty() {
            return 0.0;
        }
        match selector {
            CategorySelector::Average => mean(self.categories.iter().map(|c| c.rating.coerce())),
            CategorySelector::Named(name) => self
                .categories
                .iter()
                .find(|c| &c.category == name)
                .map(|c| c.rating.coerce())
                .unwrap_or(0.0),
        }
    }

    pub fn average_rating(&self) -> f64 {
        self.category_value(&CategorySelector::Average)
    }

    /// Average shown on the public page: zero ratings are left out of the mean.
    pub fn public_average(&self) -> f64 {
        mean(
            self.categories
                .iter()
                .map(|c| c.rating.coerce())
                .filter(|v| *v != 0.0),
        )
    }
}

/// Arithmetic mean, `0` for an empty input.
pub fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Round half away from zero to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Parse a submission timestamp. Offset-less forms are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
