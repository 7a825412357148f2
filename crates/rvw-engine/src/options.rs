//! Immutable selections driving each computation, parsed from the dashboard's wire values.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use chrono::Duration;
use rvw_core::CategorySelector;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} value: {value:?}")]
pub struct OptionParseError {
    pub kind: &'static str,
    pub value: String,
}

impl OptionParseError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ChannelFilter {
    #[default]
    All,
    Only(String),
}

impl FromStr for ChannelFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "All" => Self::All,
            other => Self::Only(other.to_string()),
        })
    }
}

/// Listing time window, counted back from "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeRange {
    #[default]
    All,
    LastDays(u32),
}

impl TimeRange {
    /// Window length; day counts beyond what a `Duration` holds saturate to `Duration::MAX`.
    pub fn window(self) -> Option<Duration> {
        match self {
            Self::All => None,
            Self::LastDays(days) => {
                Some(Duration::try_days(i64::from(days)).unwrap_or(Duration::MAX))
            }
        }
    }
}

impl FromStr for TimeRange {
    type Err = OptionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(Self::All);
        }
        match s.parse::<u32>() {
            Ok(days) if days > 0 => Ok(Self::LastDays(days)),
            _ => Err(OptionParseError::new("time range", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum RatingThreshold {
    #[default]
    All,
    AtLeast(f64),
}

impl RatingThreshold {
    /// Inclusive comparison; `All` admits everything.
    pub fn admits(self, value: f64) -> bool {
        match self {
            Self::All => true,
            Self::AtLeast(threshold) => value >= threshold,
        }
    }
}

impl FromStr for RatingThreshold {
    type Err = OptionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "All" {
            return Ok(Self::All);
        }
        match s.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Self::AtLeast(v)),
            _ => Err(OptionParseError::new("rating threshold", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    RatingAsc,
    RatingDesc,
    TimeAsc,
    #[default]
    TimeDesc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RatingAsc => "rating_asc",
            Self::RatingDesc => "rating_desc",
            Self::TimeAsc => "time_asc",
            Self::TimeDesc => "time_desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = OptionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rating_asc" => Ok(Self::RatingAsc),
            "rating_desc" => Ok(Self::RatingDesc),
            "time_asc" => Ok(Self::TimeAsc),
            "time_desc" => Ok(Self::TimeDesc),
            _ => Err(OptionParseError::new("sort order", s)),
        }
    }
}

/// Trend window: everything, a rolling number of months, or one calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrendWindow {
    #[default]
    All,
    LastMonths(u32),
    Year(i32),
}

impl FromStr for TrendWindow {
    type Err = OptionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(Self::All);
        }
        if let Some(months) = s.strip_suffix('m') {
            return match months.parse::<u32>() {
                Ok(n) if n > 0 => Ok(Self::LastMonths(n)),
                _ => Err(OptionParseError::new("trend window", s)),
            };
        }
        if s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(year) = s.parse::<i32>() {
                return Ok(Self::Year(year));
            }
        }
        Err(OptionParseError::new("trend window", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Granularity {
    Daily,
    Weekly,
    #[default]
    Monthly,
    Yearly,
}

impl Granularity {
    /// Lenient parse: anything unrecognised groups by month.
    pub fn parse_or_default(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl FromStr for Granularity {
    type Err = OptionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            _ => Err(OptionParseError::new("granularity", s)),
        }
    }
}

/// Selections for the manager's review list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterOptions {
    pub channel: ChannelFilter,
    pub only_unpublished: bool,
    pub time_range: TimeRange,
    pub rating_threshold: RatingThreshold,
    pub sort: SortOrder,
    pub category: CategorySelector,
}

/// Selections for the public, published-only list.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PublicFilterOptions {
    pub rating_threshold: RatingThreshold,
    pub sort: SortOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrendOptions {
    pub window: TrendWindow,
    pub granularity: Granularity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionEntry {
    pub value: String,
    pub label: String,
}

/// Preset choices a dashboard offers, loaded from `config/dashboard.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardOptions {
    pub categories: Vec<OptionEntry>,
    pub rating_thresholds: Vec<OptionEntry>,
    pub time_ranges: Vec<OptionEntry>,
    pub sort_orders: Vec<OptionEntry>,
    pub trend_windows: Vec<OptionEntry>,
    pub trend_groupings: Vec<OptionEntry>,
}

impl DashboardOptions {
    pub fn from_workspace_root(root: &Path) -> Result<Self> {
        let path = root.join("config").join("dashboard.yaml");
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let options: Self = serde_yaml::from_str(text)?;
        options.validate()?;
        Ok(options)
    }

    /// Every preset value must parse as the selector it feeds.
    pub fn validate(&self) -> Result<()> {
        for entry in &self.rating_thresholds {
            entry.value.parse::<RatingThreshold>()?;
        }
        for entry in &self.time_ranges {
            entry.value.parse::<TimeRange>()?;
        }
        for entry in &self.sort_orders {
            entry.value.parse::<SortOrder>()?;
        }
        for entry in &self.trend_windows {
            entry.value.parse::<TrendWindow>()?;
        }
        for entry in &self.trend_groupings {
            entry.value.parse::<Granularity>()?;
        }
        if self.categories.is_empty() {
            bail!("at least one category selector is required");
        }
        Ok(())
    }
}
