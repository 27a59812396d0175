//! Data products served by the dashboard and their request/result unions.

use serde::Serialize;

use marketscope_api_types::{
    ForecastRequest, ForecastResponse, InsightRequest, InsightResponse, MarketDataRequest,
    MarketDataResponse, StrategyRequest, StrategyResponse,
};

/// Every data product a panel can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Product {
    MarketMetrics,
    Insights,
    Forecast,
    SwotAnalysis,
    GrowthPlan,
}

impl Product {
    pub const ALL: [Product; 5] = [
        Product::MarketMetrics,
        Product::Insights,
        Product::Forecast,
        Product::SwotAnalysis,
        Product::GrowthPlan,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::MarketMetrics => "market_metrics",
            Self::Insights => "insights",
            Self::Forecast => "forecast",
            Self::SwotAnalysis => "swot_analysis",
            Self::GrowthPlan => "growth_plan",
        }
    }
}

impl std::fmt::Display for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Request payload for one product fetch.
///
/// Built exclusively by a query spec's `build_request`, which is a pure
/// function of (selection, upstream values); the serialized form of this
/// enum is what derived-product fingerprints are computed over.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ProductRequest {
    Market(MarketDataRequest),
    Insights(InsightRequest),
    Strategy(StrategyRequest),
    Forecast(ForecastRequest),
}

/// Resolved value of one product fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum ProductOutput {
    Market(MarketDataResponse),
    Insights(InsightResponse),
    Strategy(StrategyResponse),
    Forecast(ForecastResponse),
}

impl ProductOutput {
    pub fn as_market(&self) -> Option<&MarketDataResponse> {
        match self {
            Self::Market(response) => Some(response),
            _ => None,
        }
    }

    pub fn as_insights(&self) -> Option<&InsightResponse> {
        match self {
            Self::Insights(response) => Some(response),
            _ => None,
        }
    }

    pub fn as_strategy(&self) -> Option<&StrategyResponse> {
        match self {
            Self::Strategy(response) => Some(response),
            _ => None,
        }
    }

    pub fn as_forecast(&self) -> Option<&ForecastResponse> {
        match self {
            Self::Forecast(response) => Some(response),
            _ => None,
        }
    }
}
