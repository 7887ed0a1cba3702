//! Synthetic provider
//!
//! Deterministic offline data source. Serves every resource kind for any
//! instrument by generating one record per weekday (or per bar for minute
//! data). Prices are derived from the instrument code, so repeated calls
//! return identical tables.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde_json::{json, Value};

use crate::error::FetchFailure;
use crate::fetch::{DataProvider, FetchParams};
use crate::models::{Frequency, RawPayload};

/// Trading minutes in the morning session (09:30 to 11:30).
const MORNING_MINUTES: u32 = 120;

#[derive(Debug, Default)]
pub struct SyntheticProvider {
    latency: Duration,
    calls: AtomicU64,
}

impl SyntheticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated round-trip time added to every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of calls served so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    async fn begin(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

fn fields(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn trading_days(params: &FetchParams) -> impl Iterator<Item = NaiveDate> + '_ {
    params
        .date_range
        .days()
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
}

/// Stable base price in [10, 1010) derived from the instrument code.
fn base_price(code: &str) -> f64 {
    let seed = code
        .bytes()
        .fold(17u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)));
    10.0 + (seed % 100_000) as f64 / 100.0
}

/// Small deterministic drift for the `n`th record.
fn price_at(code: &str, n: u32) -> f64 {
    let drift = f64::from(n % 20) * 0.01 - 0.1;
    (base_price(code) * (1.0 + drift) * 100.0).round() / 100.0
}

fn bar_row(code: &str, stamp: String, n: u32) -> Vec<Value> {
    let close = price_at(code, n);
    let open = price_at(code, n.wrapping_add(7));
    let high = open.max(close) * 1.01;
    let low = open.min(close) * 0.99;
    let vol = 10_000 + u64::from(n % 50) * 250;
    vec![
        json!(code),
        json!(stamp),
        json!(open),
        json!((high * 100.0).round() / 100.0),
        json!((low * 100.0).round() / 100.0),
        json!(close),
        json!(vol),
    ]
}

/// Closing times of the bars of one trading day.
fn bar_times(frequency: Frequency) -> Vec<NaiveTime> {
    let width = frequency.minutes();
    let bars = 240 / width;
    (1..=bars)
        .filter_map(|i| {
            let offset = i * width;
            let minute_of_day = if offset <= MORNING_MINUTES {
                9 * 60 + 30 + offset
            } else {
                13 * 60 + offset - MORNING_MINUTES
            };
            let (h, m) = (minute_of_day / 60, minute_of_day % 60);
            NaiveTime::from_hms_opt(h, m, 0)
        })
        .collect()
}

#[async_trait]
impl DataProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    async fn daily_bar(&self, params: &FetchParams) -> Result<RawPayload, FetchFailure> {
        self.begin().await;
        let code = &params.instrument_code;
        let items = trading_days(params)
            .map(|day| bar_row(code, day.format("%Y%m%d").to_string(), day.ordinal()))
            .collect();
        Ok(RawPayload::new(
            fields(&["ts_code", "trade_date", "open", "high", "low", "close", "vol"]),
            items,
        ))
    }

    async fn minute_bar(
        &self,
        params: &FetchParams,
        frequency: Frequency,
    ) -> Result<RawPayload, FetchFailure> {
        self.begin().await;
        let code = &params.instrument_code;
        let times = bar_times(frequency);
        let items = trading_days(params)
            .flat_map(|day| {
                times.iter().enumerate().map(move |(i, t)| {
                    let stamp = format!("{} {}", day.format("%Y-%m-%d"), t.format("%H:%M:%S"));
                    bar_row(code, stamp, day.ordinal().wrapping_mul(240).wrapping_add(i as u32))
                })
            })
            .collect();
        Ok(RawPayload::new(
            fields(&["ts_code", "trade_time", "open", "high", "low", "close", "vol"]),
            items,
        ))
    }

    async fn adjust_factor(&self, params: &FetchParams) -> Result<RawPayload, FetchFailure> {
        self.begin().await;
        let code = &params.instrument_code;
        let factor = 1.0 + (base_price(code) % 7.0).floor() / 10.0;
        let items = trading_days(params)
            .map(|day| vec![json!(code), json!(day.format("%Y%m%d").to_string()), json!(factor)])
            .collect();
        Ok(RawPayload::new(
            fields(&["ts_code", "trade_date", "adj_factor"]),
            items,
        ))
    }

    async fn basic_info(&self, params: &FetchParams) -> Result<RawPayload, FetchFailure> {
        self.begin().await;
        let code = &params.instrument_code;
        let items = trading_days(params)
            .map(|day| {
                let close = price_at(code, day.ordinal());
                let turnover = 0.5 + f64::from(day.ordinal() % 10) / 10.0;
                vec![
                    json!(code),
                    json!(day.format("%Y%m%d").to_string()),
                    json!(close),
                    json!(turnover),
                    json!((close * 1_000_000.0).round()),
                ]
            })
            .collect();
        Ok(RawPayload::new(
            fields(&["ts_code", "trade_date", "close", "turnover_rate", "total_mv"]),
            items,
        ))
    }

    async fn index_bar(&self, params: &FetchParams) -> Result<RawPayload, FetchFailure> {
        self.daily_bar(params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DateRange, ResourceType};
    use crate::validator::DataValidator;

    fn params(start: (i32, u32, u32), end: (i32, u32, u32)) -> FetchParams {
        FetchParams {
            instrument_code: "600519.SH".to_string(),
            date_range: DateRange::new(
                NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
                NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
            ),
            exchange: None,
        }
    }

    #[tokio::test]
    async fn test_daily_bars_skip_weekends() {
        // 2024-01-01 is a Monday; two full weeks
        let raw = SyntheticProvider::new()
            .daily_bar(&params((2024, 1, 1), (2024, 1, 14)))
            .await
            .unwrap();
        assert_eq!(raw.row_count(), 10);
    }

    #[tokio::test]
    async fn test_deterministic() {
        let provider = SyntheticProvider::new();
        let p = params((2024, 1, 1), (2024, 1, 31));
        let a = provider.daily_bar(&p).await.unwrap();
        let b = provider.daily_bar(&p).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_minute_bars_per_day() {
        let raw = SyntheticProvider::new()
            .minute_bar(&params((2024, 1, 2), (2024, 1, 2)), Frequency::Min30)
            .await
            .unwrap();
        assert_eq!(raw.row_count(), 8);
        let time = raw.column_index("trade_time").unwrap();
        assert_eq!(raw.items[0][time], json!("2024-01-02 10:00:00"));
        assert_eq!(raw.items[3][time], json!("2024-01-02 11:30:00"));
        assert_eq!(raw.items[4][time], json!("2024-01-02 13:30:00"));
        assert_eq!(raw.items[7][time], json!("2024-01-02 15:00:00"));
    }

    #[tokio::test]
    async fn test_every_kind_passes_validation() {
        let provider = SyntheticProvider::new();
        let p = params((2024, 1, 1), (2024, 1, 10));
        let validator = DataValidator::default();

        let cases = [
            (provider.daily_bar(&p).await, ResourceType::DailyBar),
            (provider.minute_bar(&p, Frequency::Min60).await, ResourceType::MinuteBar),
            (provider.adjust_factor(&p).await, ResourceType::AdjustFactor),
            (provider.basic_info(&p).await, ResourceType::BasicInfo),
            (provider.index_bar(&p).await, ResourceType::IndexBar),
        ];
        for (raw, kind) in cases {
            let raw = raw.unwrap();
            assert!(raw.row_count() > 0);
            assert!(validator.validate(raw, kind).is_ok(), "{kind} should validate");
        }
    }
}
