//! Time and category filters for heat maps

use chrono::{DateTime, Duration, Months, TimeZone};
use serde::Deserialize;

use crate::types::Event;

/// Optional restrictions on which clicks are counted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeatmapFilter {
    /// Inclusive lower bound, Unix milliseconds
    pub start_time: Option<i64>,
    /// Inclusive upper bound, Unix milliseconds
    pub end_time: Option<i64>,
    /// Allowed target categories; empty allows all
    pub categories: Vec<String>,
}

impl HeatmapFilter {
    /// Filter counting clicks at or after `start_time`
    pub fn since(start_time: i64) -> Self {
        Self {
            start_time: Some(start_time),
            ..Default::default()
        }
    }

    /// Check an event against the time window and category allow-list
    ///
    /// Events whose target has no category pass the category check.
    pub fn matches(&self, event: &Event) -> bool {
        if self.start_time.is_some_and(|start| event.timestamp < start) {
            return false;
        }
        if self.end_time.is_some_and(|end| event.timestamp > end) {
            return false;
        }
        if self.categories.is_empty() {
            return true;
        }
        match event.category() {
            Some(category) => self.categories.iter().any(|c| c == category),
            None => true,
        }
    }
}

/// Preset time windows offered to heat map viewers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    #[default]
    All,
    /// Since local midnight
    Today,
    /// The last 7 days
    Week,
    /// The last calendar month
    Month,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::All => "all",
            TimeRange::Today => "today",
            TimeRange::Week => "week",
            TimeRange::Month => "month",
        }
    }

    /// Start of the window relative to `now`, in Unix milliseconds
    pub fn start_time<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<i64> {
        match self {
            TimeRange::All => None,
            TimeRange::Today => {
                let midnight = now.date_naive().and_hms_opt(0, 0, 0)?;
                now.timezone()
                    .from_local_datetime(&midnight)
                    .earliest()
                    .map(|dt| dt.timestamp_millis())
            }
            TimeRange::Week => Some((now.clone() - Duration::days(7)).timestamp_millis()),
            TimeRange::Month => now
                .clone()
                .checked_sub_months(Months::new(1))
                .map(|dt| dt.timestamp_millis()),
        }
    }

    /// Filter for this window, `None` for [`TimeRange::All`]
    pub fn filter_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<HeatmapFilter> {
        self.start_time(now).map(HeatmapFilter::since)
    }
}

impl std::str::FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(TimeRange::All),
            "today" => Ok(TimeRange::Today),
            "week" => Ok(TimeRange::Week),
            "month" => Ok(TimeRange::Month),
            _ => Err(format!("unknown time range: {}", s)),
        }
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
