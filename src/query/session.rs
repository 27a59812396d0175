//! Analysis session: the orchestrator.
//!
//! Owns the wiring between selection, graph, store, and client. Every
//! evaluation derives the desired key per product from scratch and
//! reconciles store subscriptions against it; panels only ever see the
//! entry at the currently desired key, so a resolution for a key that is no
//! longer desired is unreachable by construction.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::client::{AnalyticsApi, ClientError};
use crate::domain::{Product, ProductOutput, ProductRequest, Selection, SelectionState};
use crate::util::lock;

use super::events::{EventBus, QueryEventKind};
use super::graph::QueryGraph;
use super::key::QueryKey;
use super::store::{ErrorInfo, QueryStatus, QueryStore, SubscriptionHandle};

const SOURCE: &str = "query::session";

/// Everything a presentational consumer may depend on for one product.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryView {
    pub enabled: bool,
    pub status: QueryStatus,
    pub value: Option<ProductOutput>,
    pub error: Option<ErrorInfo>,
}

impl QueryView {
    fn disabled() -> Self {
        Self {
            enabled: false,
            status: QueryStatus::Idle,
            value: None,
            error: None,
        }
    }

    fn pending() -> Self {
        Self {
            enabled: true,
            status: QueryStatus::Idle,
            value: None,
            error: None,
        }
    }
}

/// Composes selection state, query graph, cache store, and API client into
/// one dashboard session. Dependency-injected throughout so lifecycle and
/// tests stay explicit.
pub struct AnalysisSession {
    graph: QueryGraph,
    store: Arc<QueryStore>,
    selection: Arc<SelectionState>,
    api: Arc<dyn AnalyticsApi>,
    events: Arc<EventBus>,
    active: Mutex<HashMap<Product, SubscriptionHandle>>,
    event_batch_limit: usize,
}

impl AnalysisSession {
    pub fn new(
        graph: QueryGraph,
        store: Arc<QueryStore>,
        selection: Arc<SelectionState>,
        api: Arc<dyn AnalyticsApi>,
        event_batch_limit: usize,
    ) -> Arc<Self> {
        let events = store.events().clone();
        let bus = events.clone();
        selection.observe(move |_| bus.publish(QueryEventKind::SelectionChanged));

        Arc::new(Self {
            graph,
            store,
            selection,
            api,
            events,
            active: Mutex::new(HashMap::new()),
            event_batch_limit,
        })
    }

    pub fn selection(&self) -> Selection {
        self.selection.get()
    }

    /// Change the analysis subject. Idempotent.
    pub fn select(&self, selection: Selection) -> bool {
        self.selection.select(selection)
    }

    fn lookup_resolved(&self, key: &QueryKey) -> Option<ProductOutput> {
        self.store
            .get(key)
            .filter(|entry| entry.status == QueryStatus::Success)
            .and_then(|entry| entry.value)
    }

    /// Pure derivation of the current per-product views.
    ///
    /// Reads the store without side effects; a panel rendering from this
    /// never sees data belonging to a key that is no longer desired.
    pub fn views(&self) -> BTreeMap<Product, QueryView> {
        let selection = self.selection.get();
        let plan = self
            .graph
            .evaluate(&selection, |key| self.lookup_resolved(key));

        plan.products
            .into_iter()
            .map(|product_plan| {
                let view = match product_plan.desired {
                    None => QueryView::disabled(),
                    Some(desired) => match self.store.get(&desired.key) {
                        None => QueryView::pending(),
                        Some(entry) => QueryView {
                            enabled: true,
                            status: entry.status,
                            value: entry.value,
                            error: entry.error,
                        },
                    },
                };
                (product_plan.product, view)
            })
            .collect()
    }

    /// Re-derive desired queries and reconcile store subscriptions.
    ///
    /// Disabled products are unsubscribed; products whose desired key moved
    /// are re-subscribed under the new key (the old entry is released and
    /// evicted once idle). Returns how many desired entries are still
    /// Loading.
    pub fn evaluate(&self) -> usize {
        let selection = self.selection.get();
        let plan = self
            .graph
            .evaluate(&selection, |key| self.lookup_resolved(key));

        let mut active = lock::acquire(&self.active, SOURCE, "evaluate");
        let mut pending = 0;

        for product_plan in plan.products {
            let product = product_plan.product;
            match product_plan.desired {
                None => {
                    if let Some(stale) = active.remove(&product) {
                        debug!(product = %product, "Product disabled; releasing subscription");
                        self.store.unsubscribe(stale);
                    }
                }
                Some(desired) => {
                    let key_moved = active
                        .get(&product)
                        .is_none_or(|handle| handle.key != desired.key);
                    if key_moved {
                        if let Some(stale) = active.remove(&product) {
                            debug!(
                                product = %product,
                                from = %stale.key,
                                to = %desired.key,
                                "Desired key moved; releasing stale subscription"
                            );
                            self.store.unsubscribe(stale);
                        }
                        let fetch = dispatch(self.api.clone(), desired.request);
                        let handle = self.store.subscribe(desired.key.clone(), fetch);
                        active.insert(product, handle);
                    }
                    if self
                        .store
                        .get(&desired.key)
                        .is_some_and(|entry| entry.status == QueryStatus::Loading)
                    {
                        pending += 1;
                    }
                }
            }
        }

        pending
    }

    /// Evaluate, then keep re-evaluating on every store or selection event
    /// until no desired query is in flight.
    pub async fn run_until_settled(&self) {
        loop {
            let wake = self.events.changed();
            let pending = self.evaluate();
            let drained = self.events.drain(self.event_batch_limit);
            if !drained.is_empty() {
                debug!(count = drained.len(), "Consumed query events");
            }
            if pending == 0 {
                info!(selection = %self.selection.get().label(), "Session settled");
                break;
            }
            wake.await;
        }
    }
}

/// Execute one product request against the API, erasing the per-operation
/// response type into [`ProductOutput`].
fn dispatch(
    api: Arc<dyn AnalyticsApi>,
    request: ProductRequest,
) -> impl std::future::Future<Output = Result<ProductOutput, ClientError>> + Send + 'static {
    async move {
        match request {
            ProductRequest::Market(request) => {
                api.market_data(&request).await.map(ProductOutput::Market)
            }
            ProductRequest::Insights(request) => api
                .generate_insights(&request)
                .await
                .map(ProductOutput::Insights),
            ProductRequest::Strategy(request) => api
                .generate_strategy(&request)
                .await
                .map(ProductOutput::Strategy),
            ProductRequest::Forecast(request) => api
                .generate_forecast(&request)
                .await
                .map(ProductOutput::Forecast),
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use marketscope_api_types::{
        ForecastRequest, ForecastResponse, InsightRequest, InsightResponse, MarketDataRequest,
        MarketDataResponse, MarketMetrics, StrategyRequest, StrategyResponse,
    };

    use super::*;

    /// Immediate canned responses; requests are recorded for inspection.
    struct CannedApi {
        calls: Mutex<Vec<String>>,
        fail_strategy: bool,
    }

    impl CannedApi {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_strategy: false,
            }
        }

        fn failing_strategy() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_strategy: true,
            }
        }

        fn record(&self, operation: &str) {
            self.calls.lock().unwrap().push(operation.to_string());
        }
    }

    #[async_trait]
    impl AnalyticsApi for CannedApi {
        async fn market_data(
            &self,
            request: &MarketDataRequest,
        ) -> Result<MarketDataResponse, ClientError> {
            self.record("market");
            Ok(MarketDataResponse {
                industry: request.industry.clone(),
                company: request.company.clone(),
                data: json!({"timeframe": request.timeframe}),
                news: vec![],
                metrics: MarketMetrics {
                    growth_rate: 12.4,
                    funding_volume: 500_000_000.0,
                    market_size: 900_000_000_000.0,
                    top_sectors: vec!["AI".to_string(), "Cloud".to_string()],
                    competition_level: "High".to_string(),
                },
            })
        }

        async fn generate_insights(
            &self,
            request: &InsightRequest,
        ) -> Result<InsightResponse, ClientError> {
            self.record("insights");
            Ok(InsightResponse {
                summary: format!("Growth at {:.1}%.", request.data.growth_rate),
                key_takeaways: vec!["Momentum is strong".to_string()],
                created_at: None,
            })
        }

        async fn generate_strategy(
            &self,
            request: &StrategyRequest,
        ) -> Result<StrategyResponse, ClientError> {
            self.record("strategy");
            if self.fail_strategy {
                return Err(ClientError::Http { status: 500 });
            }
            Ok(StrategyResponse {
                kind: request.analysis_type.as_str().to_string(),
                content: json!({"strengths": ["Scale"]}),
                recommendations: vec!["Expand".to_string()],
                created_at: None,
            })
        }

        async fn generate_forecast(
            &self,
            _request: &ForecastRequest,
        ) -> Result<ForecastResponse, ClientError> {
            self.record("forecast");
            Ok(ForecastResponse {
                metric: "growth".to_string(),
                historical: vec![],
                forecast: vec![],
                confidence_interval: Default::default(),
            })
        }
    }

    fn session_with(api: Arc<dyn AnalyticsApi>) -> Arc<AnalysisSession> {
        let events = Arc::new(EventBus::new());
        let store = Arc::new(QueryStore::new(events));
        AnalysisSession::new(
            QueryGraph::standard().expect("standard graph"),
            store,
            Arc::new(SelectionState::new()),
            api,
            100,
        )
    }

    #[tokio::test]
    async fn no_selection_means_no_fetches_and_disabled_views() {
        let api = Arc::new(CannedApi::new());
        let session = session_with(api.clone());

        assert_eq!(session.evaluate(), 0);
        let views = session.views();
        assert_eq!(views.len(), Product::ALL.len());
        for view in views.values() {
            assert!(!view.enabled);
            assert_eq!(view.status, QueryStatus::Idle);
        }
        assert!(api.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn selection_drives_the_full_chain_to_success() {
        let api = Arc::new(CannedApi::new());
        let session = session_with(api.clone());

        session.select(Selection::industry("Technology"));
        session.run_until_settled().await;

        let views = session.views();
        for (product, view) in &views {
            assert!(view.enabled, "{product} should be enabled");
            assert_eq!(view.status, QueryStatus::Success, "{product}");
        }

        let metrics = views[&Product::MarketMetrics]
            .value
            .as_ref()
            .and_then(|value| value.as_market())
            .expect("market value");
        assert_eq!(metrics.metrics.growth_rate, 12.4);

        // Insights were generated from the resolved metrics.
        let insights = views[&Product::Insights]
            .value
            .as_ref()
            .and_then(|value| value.as_insights())
            .expect("insight value");
        assert_eq!(insights.summary, "Growth at 12.4%.");

        // market, insights, forecast, strategy x2 — each exactly once.
        let calls = api.calls.lock().unwrap();
        assert_eq!(calls.iter().filter(|c| *c == "market").count(), 1);
        assert_eq!(calls.iter().filter(|c| *c == "insights").count(), 1);
        assert_eq!(calls.iter().filter(|c| *c == "strategy").count(), 2);
        assert_eq!(calls.iter().filter(|c| *c == "forecast").count(), 1);
    }

    #[tokio::test]
    async fn settled_session_does_not_refetch_on_reevaluation() {
        let api = Arc::new(CannedApi::new());
        let session = session_with(api.clone());

        session.select(Selection::industry("Technology"));
        session.run_until_settled().await;
        let calls_before = api.calls.lock().unwrap().len();

        // Same selection, same upstream: same keys, zero new fetches.
        assert_eq!(session.evaluate(), 0);
        session.run_until_settled().await;
        assert_eq!(api.calls.lock().unwrap().len(), calls_before);
    }

    #[tokio::test]
    async fn clearing_selection_disables_everything() {
        let api = Arc::new(CannedApi::new());
        let session = session_with(api);

        session.select(Selection::industry("Technology"));
        session.run_until_settled().await;

        session.select(Selection::None);
        session.run_until_settled().await;

        for view in session.views().values() {
            assert!(!view.enabled);
            assert_eq!(view.status, QueryStatus::Idle);
            assert!(view.value.is_none());
        }
    }

    #[tokio::test]
    async fn strategy_failure_is_isolated_to_strategy_panels() {
        let api = Arc::new(CannedApi::failing_strategy());
        let session = session_with(api);

        session.select(Selection::industry("Finance"));
        session.run_until_settled().await;

        let views = session.views();
        assert_eq!(views[&Product::SwotAnalysis].status, QueryStatus::Failure);
        assert_eq!(views[&Product::GrowthPlan].status, QueryStatus::Failure);
        let error = views[&Product::SwotAnalysis]
            .error
            .as_ref()
            .expect("error info");
        assert!(error.message.contains("500"));

        // Independent products are unaffected.
        assert_eq!(views[&Product::MarketMetrics].status, QueryStatus::Success);
        assert_eq!(views[&Product::Insights].status, QueryStatus::Success);
        assert_eq!(views[&Product::Forecast].status, QueryStatus::Success);
    }

    #[tokio::test]
    async fn switching_selection_rekeys_every_product() {
        let api = Arc::new(CannedApi::new());
        let session = session_with(api.clone());

        session.select(Selection::industry("Technology"));
        session.run_until_settled().await;
        session.select(Selection::industry("Finance"));
        session.run_until_settled().await;

        // Every product refetched under the new keys.
        let calls = api.calls.lock().unwrap();
        assert_eq!(calls.iter().filter(|c| *c == "market").count(), 2);
        assert_eq!(calls.iter().filter(|c| *c == "insights").count(), 2);

        let views = session.views();
        let metrics = views[&Product::MarketMetrics]
            .value
            .as_ref()
            .and_then(|value| value.as_market())
            .expect("market value");
        assert_eq!(metrics.industry.as_deref(), Some("Finance"));
    }
}
