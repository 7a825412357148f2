//! Filter/sort pipeline for the manager list and the public list.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rvw_core::Review;

use crate::options::{ChannelFilter, FilterOptions, PublicFilterOptions, SortOrder};

/// Run the manager list pipeline: channel, unpublished-only, time window, rating threshold,
/// then exactly one sort.
///
/// With a time window active, reviews whose timestamp does not parse are dropped; without
/// one they are kept and sort after every dated review. A window reaching past the earliest
/// representable instant has no lower bound.
pub fn apply_filters<'a>(
    reviews: &'a [Review],
    options: &FilterOptions,
    now: DateTime<Utc>,
) -> Vec<&'a Review> {
    let cutoff = options
        .time_range
        .window()
        .map(|window| now.checked_sub_signed(window));

    let filtered = reviews
        .iter()
        .filter(|r| match &options.channel {
            ChannelFilter::All => true,
            ChannelFilter::Only(channel) => r.channel.as_deref() == Some(channel.as_str()),
        })
        .filter(|r| !options.only_unpublished || !r.is_published())
        .filter(|r| match cutoff {
            None => true,
            Some(lower) => r
                .submitted_instant()
                .is_some_and(|ts| lower.map_or(true, |lower| ts >= lower) && ts <= now),
        })
        .filter(|r| {
            options
                .rating_threshold
                .admits(r.category_value(&options.category))
        })
        .collect::<Vec<_>>();

    sort_reviews(filtered, options.sort, |r| r.category_value(&options.category))
}

/// Published reviews only, thresholded and rating-sorted by their public average.
pub fn public_listing<'a>(reviews: &'a [Review], options: &PublicFilterOptions) -> Vec<&'a Review> {
    let filtered = reviews
        .iter()
        .filter(|r| r.is_published())
        .filter(|r| options.rating_threshold.admits(r.public_average()))
        .collect::<Vec<_>>();
    sort_reviews(filtered, options.sort, Review::public_average)
}

/// Channel choices: the `All` sentinel followed by distinct channels in first-seen order.
pub fn available_channels(reviews: &[Review]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = vec!["All".to_string()];
    for channel in reviews.iter().filter_map(|r| r.channel.as_deref()) {
        if !channel.is_empty() && seen.insert(channel) {
            out.push(channel.to_string());
        }
    }
    out
}

fn sort_reviews<'a>(
    reviews: Vec<&'a Review>,
    order: SortOrder,
    rating: impl Fn(&Review) -> f64,
) -> Vec<&'a Review> {
    match order {
        SortOrder::RatingAsc | SortOrder::RatingDesc => {
            let mut keyed = reviews.into_iter().map(|r| (rating(r), r)).collect::<Vec<_>>();
            keyed.sort_by(|(a, _), (b, _)| match order {
                SortOrder::RatingDesc => b.total_cmp(a),
                _ => a.total_cmp(b),
            });
            keyed.into_iter().map(|(_, r)| r).collect()
        }
        SortOrder::TimeAsc | SortOrder::TimeDesc => {
            let descending = order == SortOrder::TimeDesc;
            let mut keyed = reviews
                .into_iter()
                .map(|r| (r.submitted_instant(), r))
                .collect::<Vec<_>>();
            keyed.sort_by(|(a, _), (b, _)| compare_instants(*a, *b, descending));
            keyed.into_iter().map(|(_, r)| r).collect()
        }
    }
}

/// Undated reviews always sort last, whichever direction is requested.
fn compare_instants(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) if descending => b.cmp(&a),
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
