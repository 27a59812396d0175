//! Request and response types for the marketscope analytics API.
//!
//! Four logical operations are exposed by the remote service: market data
//! lookup, insight generation, strategy generation, and trend forecasting.
//! Responses are deliberately lenient to decode: every metric field falls
//! back to zero/empty when the upstream source omits it, so downstream
//! formatting is total.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

pub const DEFAULT_TIMEFRAME: &str = "1y";
pub const DEFAULT_FORECAST_PERIODS: u32 = 12;

// ============================================================================
// Market data
// ============================================================================

/// Request body for the `market` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDataRequest {
    pub industry: Option<String>,
    pub company: Option<String>,
    pub timeframe: String,
}

impl MarketDataRequest {
    /// Build a request for a single industry-or-company selector.
    pub fn for_selector(industry: Option<String>, company: Option<String>) -> Self {
        Self {
            industry,
            company,
            timeframe: DEFAULT_TIMEFRAME.to_string(),
        }
    }
}

/// Core market indicators for the selected subject.
///
/// Aggregators upstream frequently omit fields; all of them default so that
/// a sparse payload still produces a usable (zeroed) metrics row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MarketMetrics {
    #[serde(default)]
    pub growth_rate: f64,
    #[serde(default)]
    pub funding_volume: f64,
    #[serde(default)]
    pub market_size: f64,
    #[serde(default)]
    pub top_sectors: Vec<String>,
    #[serde(default)]
    pub competition_level: String,
}

/// Response body for the `market` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDataResponse {
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    /// Source metadata (timeframe, timestamp, upstream providers).
    #[serde(default)]
    pub data: Value,
    /// Raw news articles as returned by the aggregator.
    #[serde(default)]
    pub news: Vec<Value>,
    #[serde(default)]
    pub metrics: MarketMetrics,
}

// ============================================================================
// Insights
// ============================================================================

/// Request body for the `insights` operation.
///
/// `data` carries the market metrics the insight generator should analyze.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightRequest {
    pub industry: Option<String>,
    pub company: Option<String>,
    pub data: MarketMetrics,
}

/// Response body for the `insights` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightResponse {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub key_takeaways: Vec<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

// ============================================================================
// Strategy
// ============================================================================

/// Kind of strategic analysis to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    Swot,
    Growth,
}

impl AnalysisType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Swot => "swot",
            Self::Growth => "growth",
        }
    }
}

/// Request body for the `strategy` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyRequest {
    pub industry: Option<String>,
    pub company: Option<String>,
    pub analysis_type: AnalysisType,
}

/// Response body for the `strategy` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyResponse {
    /// Echo of the requested analysis type ("swot", "growth").
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Analysis payload; shape depends on the analysis type.
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

impl StrategyResponse {
    /// Interpret `content` as a SWOT matrix; quadrants missing from the
    /// payload come back empty.
    pub fn swot_matrix(&self) -> SwotMatrix {
        SwotMatrix::from_value(&self.content)
    }
}

/// SWOT quadrants extracted from a strategy response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SwotMatrix {
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub opportunities: Vec<String>,
    #[serde(default)]
    pub threats: Vec<String>,
}

impl SwotMatrix {
    /// Total conversion from an arbitrary JSON value. Non-object values and
    /// non-string quadrant entries yield empty quadrants rather than errors.
    pub fn from_value(value: &Value) -> Self {
        fn quadrant(value: &Value, name: &str) -> Vec<String> {
            value
                .get(name)
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()
        }

        Self {
            strengths: quadrant(value, "strengths"),
            weaknesses: quadrant(value, "weaknesses"),
            opportunities: quadrant(value, "opportunities"),
            threats: quadrant(value, "threats"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.strengths.is_empty()
            && self.weaknesses.is_empty()
            && self.opportunities.is_empty()
            && self.threats.is_empty()
    }
}

// ============================================================================
// Forecast
// ============================================================================

/// Request body for the `forecast` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub metric: String,
    /// Historical observations to fit; the service falls back to its own
    /// sources when empty.
    #[serde(default)]
    pub data: Vec<Value>,
    pub periods: u32,
    pub industry: Option<String>,
    pub company: Option<String>,
}

/// One historical observation in a forecast response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPoint {
    #[serde(default)]
    pub ds: String,
    #[serde(default)]
    pub y: f64,
}

/// One predicted point in a forecast response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    #[serde(default)]
    pub ds: String,
    #[serde(default)]
    pub yhat: f64,
    #[serde(default)]
    pub yhat_lower: f64,
    #[serde(default)]
    pub yhat_upper: f64,
}

/// Mean confidence band over the forecast horizon.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    #[serde(default)]
    pub lower: f64,
    #[serde(default)]
    pub upper: f64,
}

/// Response body for the `forecast` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResponse {
    #[serde(default)]
    pub metric: String,
    #[serde(default)]
    pub historical: Vec<HistoricalPoint>,
    #[serde(default)]
    pub forecast: Vec<ForecastPoint>,
    #[serde(default)]
    pub confidence_interval: ConfidenceInterval,
}
