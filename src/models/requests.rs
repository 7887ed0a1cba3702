//! Request types for the data service
//!
//! A [`DataRequest`] is what a consumer issues. It carries the resource kind as
//! the consumer's own string so that the router can reject unknown kinds;
//! [`ResourceType`] and [`Frequency`] are the closed, typed forms the router
//! resolves them into.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::DataServiceError;

// == Resource Type ==
/// The closed set of data kinds the service knows how to fetch and validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    DailyBar,
    MinuteBar,
    AdjustFactor,
    BasicInfo,
    IndexBar,
}

impl ResourceType {
    /// Every supported kind, in declaration order.
    pub const ALL: [ResourceType; 5] = [
        ResourceType::DailyBar,
        ResourceType::MinuteBar,
        ResourceType::AdjustFactor,
        ResourceType::BasicInfo,
        ResourceType::IndexBar,
    ];

    /// Canonical name, used in cache keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::DailyBar => "daily_bar",
            ResourceType::MinuteBar => "minute_bar",
            ResourceType::AdjustFactor => "adjust_factor",
            ResourceType::BasicInfo => "basic_info",
            ResourceType::IndexBar => "index_bar",
        }
    }

    /// Columns a payload of this kind must carry before it may be cached.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            ResourceType::DailyBar | ResourceType::IndexBar => &[
                "ts_code",
                "trade_date",
                "open",
                "high",
                "low",
                "close",
                "vol",
            ],
            ResourceType::MinuteBar => &[
                "ts_code",
                "trade_time",
                "open",
                "high",
                "low",
                "close",
                "vol",
            ],
            ResourceType::AdjustFactor => &["ts_code", "trade_date", "adj_factor"],
            ResourceType::BasicInfo => &[
                "ts_code",
                "trade_date",
                "close",
                "turnover_rate",
                "total_mv",
            ],
        }
    }

    /// Expected upstream updates per trading day for this data class.
    ///
    /// Minute bars refresh once per bar (240 trading minutes a day); adjust
    /// factors only move on corporate actions.
    pub fn update_frequency(&self, frequency: Option<Frequency>) -> f64 {
        match self {
            ResourceType::MinuteBar => {
                let minutes = frequency.map(|f| f.minutes()).unwrap_or(1);
                240.0 / f64::from(minutes)
            }
            ResourceType::DailyBar | ResourceType::IndexBar | ResourceType::BasicInfo => 1.0,
            ResourceType::AdjustFactor => 0.1,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = DataServiceError;

    /// Parses canonical names case-insensitively, plus the upstream tool
    /// names (`daily`, `adj_factor`, `daily_basic`, `index_daily`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily_bar" | "daily" => Ok(ResourceType::DailyBar),
            "minute_bar" | "mins" | "stk_mins" => Ok(ResourceType::MinuteBar),
            "adjust_factor" | "adj_factor" => Ok(ResourceType::AdjustFactor),
            "basic_info" | "daily_basic" => Ok(ResourceType::BasicInfo),
            "index_bar" | "index_daily" => Ok(ResourceType::IndexBar),
            _ => Err(DataServiceError::UnsupportedRequestKind(s.to_string())),
        }
    }
}

// == Frequency ==
/// Bar width for minute-level data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    Min1,
    Min5,
    Min15,
    Min30,
    Min60,
}

impl Frequency {
    /// Maps a width in minutes onto the supported set.
    pub fn from_minutes(minutes: u32) -> Option<Self> {
        match minutes {
            1 => Some(Frequency::Min1),
            5 => Some(Frequency::Min5),
            15 => Some(Frequency::Min15),
            30 => Some(Frequency::Min30),
            60 => Some(Frequency::Min60),
            _ => None,
        }
    }

    pub fn minutes(&self) -> u32 {
        match self {
            Frequency::Min1 => 1,
            Frequency::Min5 => 5,
            Frequency::Min15 => 15,
            Frequency::Min30 => 30,
            Frequency::Min60 => 60,
        }
    }
}

// == Date Range ==
/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// True when `start <= end`.
    pub fn is_ordered(&self) -> bool {
        self.start <= self.end
    }

    /// Iterates every calendar day in the range, both ends included.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |d| *d <= self.end)
    }

    /// Number of Monday-to-Friday days in the range.
    pub fn weekday_count(&self) -> u64 {
        if !self.is_ordered() {
            return 0;
        }
        let total = (self.end - self.start).num_days() as u64 + 1;
        let full_weeks = total / 7;
        let tail = match self.start.checked_add_days(Days::new(full_weeks * 7)) {
            Some(tail_start) => DateRange::new(tail_start, self.end)
                .days()
                .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
                .count() as u64,
            None => 0,
        };
        full_weeks * 5 + tail
    }
}

// == Data Request ==
/// A consumer's request for one slice of time-series data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRequest {
    /// Requested data kind, e.g. `daily_bar`
    pub resource_type: String,
    /// Instrument code such as `600519.SH`; a bare six-digit code is accepted
    pub instrument_code: String,
    /// Inclusive date range
    pub date_range: DateRange,
    /// Bar width in minutes, only meaningful for minute bars
    #[serde(default)]
    pub frequency: Option<u32>,
    /// Optional exchange restriction
    #[serde(default)]
    pub exchange_filter: Option<String>,
}

impl DataRequest {
    /// Creates a request without frequency or exchange filter.
    pub fn new(
        resource_type: impl Into<String>,
        instrument_code: impl Into<String>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            instrument_code: instrument_code.into(),
            date_range: DateRange::new(start, end),
            frequency: None,
            exchange_filter: None,
        }
    }

    /// Shorthand for a daily bar request.
    pub fn daily_bar(instrument_code: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self::new(ResourceType::DailyBar.as_str(), instrument_code, start, end)
    }

    pub fn with_frequency(mut self, minutes: u32) -> Self {
        self.frequency = Some(minutes);
        self
    }

    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange_filter = Some(exchange.into());
        self
    }
}
