//! Per-channel distribution of listings across average-rating bands.

use std::collections::HashMap;

use rvw_core::{mean, Review, ReviewId};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RatingBand {
    #[serde(rename = "<5")]
    BelowFive,
    #[serde(rename = "5-6")]
    FiveToSix,
    #[serde(rename = "7-8")]
    SevenToEight,
    #[serde(rename = "9-10")]
    NineToTen,
}

impl RatingBand {
    /// `[7, 8]` is closed on both ends; anything above 8 lands in the top band.
    pub fn classify(average: f64) -> Self {
        if average < 5.0 {
            Self::BelowFive
        } else if average < 7.0 {
            Self::FiveToSix
        } else if average <= 8.0 {
            Self::SevenToEight
        } else {
            Self::NineToTen
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::BelowFive => "<5",
            Self::FiveToSix => "5-6",
            Self::SevenToEight => "7-8",
            Self::NineToTen => "9-10",
        }
    }
}

/// Listing counts per band for one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelDistributionRow {
    pub channel: String,
    #[serde(rename = "<5")]
    pub below_five: usize,
    #[serde(rename = "5-6")]
    pub five_to_six: usize,
    #[serde(rename = "7-8")]
    pub seven_to_eight: usize,
    #[serde(rename = "9-10")]
    pub nine_to_ten: usize,
}

impl ChannelDistributionRow {
    fn empty(channel: String) -> Self {
        Self {
            channel,
            below_five: 0,
            five_to_six: 0,
            seven_to_eight: 0,
            nine_to_ten: 0,
        }
    }

    pub fn count(&self, band: RatingBand) -> usize {
        match band {
            RatingBand::BelowFive => self.below_five,
            RatingBand::FiveToSix => self.five_to_six,
            RatingBand::SevenToEight => self.seven_to_eight,
            RatingBand::NineToTen => self.nine_to_ten,
        }
    }

    pub fn total(&self) -> usize {
        self.below_five + self.five_to_six + self.seven_to_eight + self.nine_to_ten
    }

    fn increment(&mut self, band: RatingBand) {
        let slot = match band {
            RatingBand::BelowFive => &mut self.below_five,
            RatingBand::FiveToSix => &mut self.five_to_six,
            RatingBand::SevenToEight => &mut self.seven_to_eight,
            RatingBand::NineToTen => &mut self.nine_to_ten,
        };
        *slot += 1;
    }
}

/// Reviews without a listing name each form their own listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ListingKey<'a> {
    Named(&'a str),
    Unnamed(&'a ReviewId),
}

const UNKNOWN_CHANNEL: &str = "Unknown";

/// Group reviews into `(listing, channel)` listings, average each listing's review
/// averages, and count listings per band for every channel. Rows and groups keep
/// first-seen order.
pub fn channel_distribution(reviews: &[Review]) -> Vec<ChannelDistributionRow> {
    let mut group_index: HashMap<(ListingKey<'_>, &str), usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<f64>)> = Vec::new();

    for review in reviews {
        let listing = match review.listing_name.as_deref() {
            Some(name) if !name.is_empty() => ListingKey::Named(name),
            _ => ListingKey::Unnamed(&review.id),
        };
        let channel = review
            .channel
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(UNKNOWN_CHANNEL);
        let idx = *group_index.entry((listing, channel)).or_insert_with(|| {
            groups.push((channel, Vec::new()));
            groups.len() - 1
        });
        groups[idx].1.push(review.average_rating());
    }

    let mut rows: Vec<ChannelDistributionRow> = Vec::new();
    let mut row_index: HashMap<&str, usize> = HashMap::new();
    for (channel, ratings) in groups {
        let band = RatingBand::classify(mean(ratings));
        let idx = *row_index.entry(channel).or_insert_with(|| {
            rows.push(ChannelDistributionRow::empty(channel.to_string()));
            rows.len() - 1
        });
        rows[idx].increment(band);
    }
    rows
}
