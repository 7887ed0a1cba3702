//! Request Router
//!
//! Maps a consumer's [`DataRequest`] onto exactly one [`FetchOperation`] and
//! the [`CacheKey`] its result is stored under. Pure: no I/O, no shared state.

use crate::cache::CacheKey;
use crate::error::{DataServiceError, Result};
use crate::fetch::{FetchOperation, FetchParams};
use crate::models::{DataRequest, DateRange, Frequency, ResourceType};

/// Row estimate above which a request is rejected unless configured otherwise.
pub const DEFAULT_MAX_ROWS: usize = 100_000;

/// Trading minutes in one session day (09:30-11:30, 13:00-15:00).
const TRADING_MINUTES_PER_DAY: u64 = 240;

/// Resolves requests into fetch operations and cache keys.
#[derive(Debug, Clone, Copy)]
pub struct RequestRouter {
    max_rows: usize,
}

impl Default for RequestRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestRouter {
    pub fn new() -> Self {
        Self::with_max_rows(DEFAULT_MAX_ROWS)
    }

    /// Router that rejects requests estimated to exceed `max_rows` rows.
    pub fn with_max_rows(max_rows: usize) -> Self {
        Self { max_rows }
    }

    // == Resolve ==
    /// Validates a request and derives its operation and key.
    ///
    /// # Errors
    /// - `UnsupportedRequestKind` for an unknown `resource_type`
    /// - `InvalidRequestParameters` for an inverted date range, a missing or
    ///   unsupported minute-bar frequency, an unrecognizable instrument code,
    ///   or a range whose estimated row count exceeds the configured maximum
    pub fn resolve(&self, request: &DataRequest) -> Result<(FetchOperation, CacheKey)> {
        let resource_type: ResourceType = request.resource_type.parse()?;

        if !request.date_range.is_ordered() {
            return Err(DataServiceError::InvalidRequestParameters(format!(
                "start date {} is after end date {}",
                request.date_range.start, request.date_range.end
            )));
        }

        let frequency = match resource_type {
            ResourceType::MinuteBar => {
                let minutes = request.frequency.ok_or_else(|| {
                    DataServiceError::InvalidRequestParameters(
                        "minute_bar requires a frequency of 1, 5, 15, 30 or 60".to_string(),
                    )
                })?;
                Some(Frequency::from_minutes(minutes).ok_or_else(|| {
                    DataServiceError::InvalidRequestParameters(format!(
                        "unsupported minute_bar frequency: {minutes}"
                    ))
                })?)
            }
            // Frequency does not affect other kinds, so it stays out of the key
            _ => None,
        };

        let rows = estimated_rows(&request.date_range, frequency);
        if rows > self.max_rows as u64 {
            return Err(DataServiceError::InvalidRequestParameters(format!(
                "request covers about {rows} rows, more than the limit of {}",
                self.max_rows
            )));
        }

        let instrument_code = normalize_instrument_code(&request.instrument_code)?;
        let exchange = normalize_exchange(request.exchange_filter.as_deref());

        let key = CacheKey::compose(
            resource_type,
            &instrument_code,
            &request.date_range,
            frequency,
            exchange.as_deref(),
        );

        let params = FetchParams {
            instrument_code,
            date_range: request.date_range,
            exchange,
        };
        let operation = match (resource_type, frequency) {
            (ResourceType::DailyBar, _) => FetchOperation::DailyBar(params),
            (ResourceType::MinuteBar, Some(freq)) => FetchOperation::MinuteBar(params, freq),
            (ResourceType::MinuteBar, None) => {
                return Err(DataServiceError::InvalidRequestParameters(
                    "minute_bar requires a frequency".to_string(),
                ))
            }
            (ResourceType::AdjustFactor, _) => FetchOperation::AdjustFactor(params),
            (ResourceType::BasicInfo, _) => FetchOperation::BasicInfo(params),
            (ResourceType::IndexBar, _) => FetchOperation::IndexBar(params),
        };

        Ok((operation, key))
    }
}

/// Upper estimate of the rows a range yields: one per weekday, or one per
/// bar for minute data. Holidays are not known here.
fn estimated_rows(range: &DateRange, frequency: Option<Frequency>) -> u64 {
    let per_day = frequency.map_or(1, |f| TRADING_MINUTES_PER_DAY / u64::from(f.minutes()));
    range.weekday_count().saturating_mul(per_day)
}

/// Trims and uppercases an instrument code, inferring the exchange suffix
/// for bare six-digit mainland codes.
pub fn normalize_instrument_code(raw: &str) -> Result<String> {
    let code = raw.trim().to_ascii_uppercase();
    if code.is_empty() {
        return Err(DataServiceError::InvalidRequestParameters(
            "instrument code cannot be empty".to_string(),
        ));
    }

    if let Some((symbol, market)) = code.split_once('.') {
        let well_formed = !symbol.is_empty()
            && !market.is_empty()
            && symbol.chars().all(|c| c.is_ascii_alphanumeric())
            && market.chars().all(|c| c.is_ascii_alphabetic());
        if !well_formed {
            return Err(DataServiceError::InvalidRequestParameters(format!(
                "malformed instrument code: {raw}"
            )));
        }
        return Ok(code);
    }

    if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(DataServiceError::InvalidRequestParameters(format!(
            "cannot infer exchange for instrument code: {raw}"
        )));
    }

    let suffix = match &code[..2] {
        "60" | "68" | "90" => "SH",
        "00" | "30" | "20" => "SZ",
        _ => {
            return Err(DataServiceError::InvalidRequestParameters(format!(
                "cannot infer exchange for instrument code: {raw}"
            )))
        }
    };
    Ok(format!("{code}.{suffix}"))
}

/// Blank filters are treated exactly like absent ones.
fn normalize_exchange(raw: Option<&str>) -> Option<String> {
    raw.map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
}
