//! Review aggregation and filtering engine.
//!
//! Every view here is a pure recomputation over the current review collection and an
//! explicit options struct. [`ReviewSession`] owns that collection and is the only
//! place it changes: wholesale on refresh, or one status at a time through a toggle.

pub mod channel;
pub mod filter;
pub mod insight;
pub mod options;
pub mod session;
pub mod trend;

pub use channel::{channel_distribution, ChannelDistributionRow, RatingBand};
pub use filter::{apply_filters, available_channels, public_listing};
pub use insight::{listing_insight, ListingAverage, ListingInsight, WeakestCategory};
pub use options::{
    ChannelFilter, DashboardOptions, FilterOptions, Granularity, OptionParseError,
    PublicFilterOptions, RatingThreshold, SortOrder, TimeRange, TrendOptions, TrendWindow,
};
pub use session::{ReviewSession, ToggleError, ToggleOutcome, ToggleTransition};
pub use trend::{rating_trend, tenant_trend, CountPeriod, RatingPeriod};

pub const CRATE_NAME: &str = "rvw-engine";

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, TimeZone, Utc};
    use rvw_core::{CategoryRating, Review, ReviewId, ReviewStatus};

    pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).single().unwrap()
    }

    pub fn review(id: &str, submitted_at: &str, ratings: &[(&str, f64)]) -> Review {
        Review {
            id: ReviewId::new(id),
            submitted_at: Some(submitted_at.to_string()),
            categories: ratings
                .iter()
                .map(|(name, rating)| CategoryRating::new(*name, *rating))
                .collect(),
            ..Default::default()
        }
    }

    pub fn listed(mut review: Review, listing: &str, channel: Option<&str>) -> Review {
        review.listing_name = Some(listing.to_string());
        review.channel = channel.map(ToString::to_string);
        review
    }

    pub fn published(mut review: Review) -> Review {
        review.status = ReviewStatus::Published;
        review
    }

    pub fn ids<'a>(reviews: impl IntoIterator<Item = &'a Review>) -> Vec<&'a str> {
        reviews.into_iter().map(|r| r.id.as_str()).collect()
    }
}
