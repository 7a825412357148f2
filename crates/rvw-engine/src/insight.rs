//! On-demand per-listing summary: overall average and weakest category.

use std::collections::BTreeMap;
use std::fmt;

use rvw_core::{mean, round2, Review};
use serde::{Serialize, Serializer};

/// Listing average rounded to two decimals, or `N/A` when the listing has no reviews.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ListingAverage {
    Rated(f64),
    NotAvailable,
}

impl Serialize for ListingAverage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Rated(value) => serializer.serialize_f64(*value),
            Self::NotAvailable => serializer.serialize_str("N/A"),
        }
    }
}

impl fmt::Display for ListingAverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rated(value) => write!(f, "{value:.2}"),
            Self::NotAvailable => f.write_str("N/A"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeakestCategory {
    pub category: String,
    pub avg: f64,
}

impl WeakestCategory {
    pub fn none() -> Self {
        Self {
            category: "None".to_string(),
            avg: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingInsight {
    pub avg_rating: ListingAverage,
    pub weakest_category: WeakestCategory,
}

/// Summarise the reviews whose listing name equals `listing_name` exactly (`None` matches
/// reviews without a listing name).
///
/// The average is a mean of per-review averages. The weakest category is the one with the
/// lowest mean rating across those reviews; equal means resolve to the lexically smallest name.
pub fn listing_insight(reviews: &[Review], listing_name: Option<&str>) -> ListingInsight {
    let matched = reviews
        .iter()
        .filter(|r| r.listing_name.as_deref() == listing_name)
        .collect::<Vec<_>>();

    let avg_rating = if matched.is_empty() {
        ListingAverage::NotAvailable
    } else {
        ListingAverage::Rated(round2(mean(matched.iter().map(|r| r.average_rating()))))
    };

    let mut by_category: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for category in matched.iter().flat_map(|r| r.categories.iter()) {
        by_category
            .entry(category.category.as_str())
            .or_default()
            .push(category.rating.coerce());
    }

    let mut weakest: Option<(&str, f64)> = None;
    for (name, ratings) in by_category {
        let avg = mean(ratings);
        if weakest.map_or(true, |(_, lowest)| avg < lowest) {
            weakest = Some((name, avg));
        }
    }

    ListingInsight {
        avg_rating,
        weakest_category: weakest
            .map(|(category, avg)| WeakestCategory {
                category: category.to_string(),
                avg,
            })
            .unwrap_or_else(WeakestCategory::none),
    }
}
