//! Calendar bucketing for the rating trend and the tenant-count trend.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use rvw_core::{round2, Review};
use serde::Serialize;

use crate::options::{Granularity, TrendOptions, TrendWindow};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingPeriod {
    pub period: String,
    pub avg_rating: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountPeriod {
    pub period: String,
    pub count: usize,
}

/// Average rating per period, oldest period first.
pub fn rating_trend(reviews: &[Review], options: &TrendOptions, now: DateTime<Utc>) -> Vec<RatingPeriod> {
    bucket_reviews(reviews, options, now)
        .into_iter()
        .map(|(start, members)| {
            let sum: f64 = members.iter().map(|r| r.average_rating()).sum();
            RatingPeriod {
                period: period_key(start, options.granularity),
                avg_rating: round2(sum / members.len() as f64),
                count: members.len(),
            }
        })
        .collect()
}

/// Number of reviews per period, oldest period first.
pub fn tenant_trend(reviews: &[Review], options: &TrendOptions, now: DateTime<Utc>) -> Vec<CountPeriod> {
    bucket_reviews(reviews, options, now)
        .into_iter()
        .map(|(start, members)| CountPeriod {
            period: period_key(start, options.granularity),
            count: members.len(),
        })
        .collect()
}

/// Group dated, in-window reviews by the first day of their period. Only non-empty
/// buckets exist, and the map's ordering is chronological.
fn bucket_reviews<'a>(
    reviews: &'a [Review],
    options: &TrendOptions,
    now: DateTime<Utc>,
) -> BTreeMap<NaiveDate, Vec<&'a Review>> {
    let lower_bound = match options.window {
        TrendWindow::LastMonths(months) => now.checked_sub_months(Months::new(months)),
        _ => None,
    };

    let mut buckets: BTreeMap<NaiveDate, Vec<&Review>> = BTreeMap::new();
    for review in reviews {
        let Some(ts) = review.submitted_instant() else {
            continue;
        };
        let in_window = match options.window {
            TrendWindow::All => true,
            TrendWindow::LastMonths(_) => lower_bound.map_or(true, |start| ts >= start),
            TrendWindow::Year(year) => ts.year() == year,
        };
        if !in_window {
            continue;
        }
        buckets
            .entry(period_start(ts.date_naive(), options.granularity))
            .or_default()
            .push(review);
    }
    buckets
}

/// First day of the period containing `date`. Weeks start on Sunday.
pub(crate) fn period_start(date: NaiveDate, granularity: Granularity) -> NaiveDate {
    match granularity {
        Granularity::Daily => date,
        Granularity::Weekly => {
            let back = u64::from(date.weekday().num_days_from_sunday());
            date.checked_sub_days(Days::new(back)).unwrap_or(date)
        }
        Granularity::Monthly => date.with_day(1).unwrap_or(date),
        Granularity::Yearly => date.with_ordinal(1).unwrap_or(date),
    }
}

pub(crate) fn period_key(start: NaiveDate, granularity: Granularity) -> String {
    match granularity {
        Granularity::Daily | Granularity::Weekly => start.format("%Y-%m-%d").to_string(),
        Granularity::Monthly => start.format("%Y-%m").to_string(),
        Granularity::Yearly => start.format("%Y").to_string(),
    }
}
