//! HTTP client for the remote analytics API.
//!
//! The query layer consumes the [`AnalyticsApi`] trait; [`ApiClient`] is
//! the reqwest-backed implementation. Failures map onto the three classes
//! the cache surfaces: no response, non-2xx status, malformed payload.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use marketscope_api_types::{
    ForecastRequest, ForecastResponse, InsightRequest, InsightResponse, MarketDataRequest,
    MarketDataResponse, StrategyRequest, StrategyResponse,
};

use crate::config::ApiSettings;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("server returned status {status}")]
    Http { status: u16 },
    #[error("failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

/// The four remote operations the dependent-query graph requires.
#[async_trait]
pub trait AnalyticsApi: Send + Sync {
    async fn market_data(&self, request: &MarketDataRequest)
    -> Result<MarketDataResponse, ClientError>;

    async fn generate_insights(
        &self,
        request: &InsightRequest,
    ) -> Result<InsightResponse, ClientError>;

    async fn generate_strategy(
        &self,
        request: &StrategyRequest,
    ) -> Result<StrategyResponse, ClientError>;

    async fn generate_forecast(
        &self,
        request: &ForecastRequest,
    ) -> Result<ForecastResponse, ClientError>;
}

/// reqwest-backed [`AnalyticsApi`] implementation.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
}

impl ApiClient {
    pub fn new(settings: &ApiSettings) -> Result<Self, ClientError> {
        let base = Url::parse(&settings.base_url)?.join("/")?;
        let http = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(ClientError::Network)?;
        Ok(Self { http, base })
    }

    pub fn user_agent() -> &'static str {
        concat!("marketscope/", env!("CARGO_PKG_VERSION"))
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = self.base.join(path)?;
        debug!(%url, "Analytics API request");

        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(ClientError::Network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Http {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(ClientError::Network)?;
        serde_json::from_slice(&bytes).map_err(ClientError::Decode)
    }
}

#[async_trait]
impl AnalyticsApi for ApiClient {
    async fn market_data(
        &self,
        request: &MarketDataRequest,
    ) -> Result<MarketDataResponse, ClientError> {
        self.post("api/market/", request).await
    }

    async fn generate_insights(
        &self,
        request: &InsightRequest,
    ) -> Result<InsightResponse, ClientError> {
        self.post("api/insights/", request).await
    }

    async fn generate_strategy(
        &self,
        request: &StrategyRequest,
    ) -> Result<StrategyResponse, ClientError> {
        self.post("api/strategy/", request).await
    }

    async fn generate_forecast(
        &self,
        request: &ForecastRequest,
    ) -> Result<ForecastResponse, ClientError> {
        self.post("api/forecast/", request).await
    }
}
