//! Provider boundary
//!
//! The only contract the core has with the remote data source: one async
//! method per resource kind, each returning a raw table or a typed failure.
//! [`FetchOperation`] is the closed set of calls the router can select.

use async_trait::async_trait;

use crate::error::FetchFailure;
use crate::models::{DateRange, Frequency, RawPayload, ResourceType};

/// Normalized arguments shared by every fetch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchParams {
    pub instrument_code: String,
    pub date_range: DateRange,
    pub exchange: Option<String>,
}

/// One provider call, bound to its resource kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOperation {
    DailyBar(FetchParams),
    MinuteBar(FetchParams, Frequency),
    AdjustFactor(FetchParams),
    BasicInfo(FetchParams),
    IndexBar(FetchParams),
}

impl FetchOperation {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            FetchOperation::DailyBar(_) => ResourceType::DailyBar,
            FetchOperation::MinuteBar(..) => ResourceType::MinuteBar,
            FetchOperation::AdjustFactor(_) => ResourceType::AdjustFactor,
            FetchOperation::BasicInfo(_) => ResourceType::BasicInfo,
            FetchOperation::IndexBar(_) => ResourceType::IndexBar,
        }
    }

    pub fn params(&self) -> &FetchParams {
        match self {
            FetchOperation::DailyBar(p)
            | FetchOperation::MinuteBar(p, _)
            | FetchOperation::AdjustFactor(p)
            | FetchOperation::BasicInfo(p)
            | FetchOperation::IndexBar(p) => p,
        }
    }

    pub fn frequency(&self) -> Option<Frequency> {
        match self {
            FetchOperation::MinuteBar(_, freq) => Some(*freq),
            _ => None,
        }
    }

    /// Dispatches to the provider method bound to this operation.
    pub async fn invoke(&self, provider: &dyn DataProvider) -> Result<RawPayload, FetchFailure> {
        match self {
            FetchOperation::DailyBar(p) => provider.daily_bar(p).await,
            FetchOperation::MinuteBar(p, freq) => provider.minute_bar(p, *freq).await,
            FetchOperation::AdjustFactor(p) => provider.adjust_factor(p).await,
            FetchOperation::BasicInfo(p) => provider.basic_info(p).await,
            FetchOperation::IndexBar(p) => provider.index_bar(p).await,
        }
    }
}

/// A remote (or local) source of raw tables.
///
/// Providers often serve only part of the catalogue; unimplemented kinds
/// report a [`FetchFailure::Provider`].
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    async fn daily_bar(&self, params: &FetchParams) -> Result<RawPayload, FetchFailure> {
        Err(unsupported(self.name(), ResourceType::DailyBar, params))
    }

    async fn minute_bar(
        &self,
        params: &FetchParams,
        _frequency: Frequency,
    ) -> Result<RawPayload, FetchFailure> {
        Err(unsupported(self.name(), ResourceType::MinuteBar, params))
    }

    async fn adjust_factor(&self, params: &FetchParams) -> Result<RawPayload, FetchFailure> {
        Err(unsupported(self.name(), ResourceType::AdjustFactor, params))
    }

    async fn basic_info(&self, params: &FetchParams) -> Result<RawPayload, FetchFailure> {
        Err(unsupported(self.name(), ResourceType::BasicInfo, params))
    }

    async fn index_bar(&self, params: &FetchParams) -> Result<RawPayload, FetchFailure> {
        Err(unsupported(self.name(), ResourceType::IndexBar, params))
    }
}

fn unsupported(provider: &str, kind: ResourceType, params: &FetchParams) -> FetchFailure {
    FetchFailure::Provider(format!(
        "{provider} does not serve {kind} (requested {})",
        params.instrument_code
    ))
}
