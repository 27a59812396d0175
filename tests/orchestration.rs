//! End-to-end orchestration scenarios driven through a hand-paced analytics
//! stub: market fetches block until the test releases them, so response
//! ordering is fully controlled.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

use marketscope::api_types::{
    ConfidenceInterval, ForecastRequest, ForecastResponse, InsightRequest, InsightResponse,
    MarketDataRequest, MarketDataResponse, MarketMetrics, StrategyRequest, StrategyResponse,
};
use marketscope::client::{AnalyticsApi, ClientError};
use marketscope::domain::{Product, Selection, SelectionState};
use marketscope::presentation::dashboard;
use marketscope::query::{
    AnalysisSession, EventBus, QueryGraph, QueryKey, QueryStatus, QueryStore,
};

const WAIT: Duration = Duration::from_secs(5);

/// A market-metrics call parked until the test answers it.
struct PendingMarket {
    request: MarketDataRequest,
    respond: oneshot::Sender<Result<MarketDataResponse, ClientError>>,
}

/// Stub API: market calls are handed to the test for manual release; the
/// other operations answer immediately with data derived from the request.
struct GatedApi {
    pending: mpsc::UnboundedSender<PendingMarket>,
}

impl GatedApi {
    fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<PendingMarket>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { pending: tx }), rx)
    }
}

fn market_response(
    industry: Option<&str>,
    company: Option<&str>,
    growth_rate: f64,
) -> MarketDataResponse {
    MarketDataResponse {
        industry: industry.map(str::to_string),
        company: company.map(str::to_string),
        data: json!({"timeframe": "1y"}),
        news: vec![],
        metrics: MarketMetrics {
            growth_rate,
            funding_volume: 500_000_000.0,
            market_size: 900_000_000_000.0,
            top_sectors: vec!["AI".to_string()],
            competition_level: "High".to_string(),
        },
    }
}

#[async_trait]
impl AnalyticsApi for GatedApi {
    async fn market_data(
        &self,
        request: &MarketDataRequest,
    ) -> Result<MarketDataResponse, ClientError> {
        let (tx, rx) = oneshot::channel();
        self.pending
            .send(PendingMarket {
                request: request.clone(),
                respond: tx,
            })
            .expect("test keeps the receiver alive");
        rx.await.expect("test answers every pending call")
    }

    async fn generate_insights(
        &self,
        request: &InsightRequest,
    ) -> Result<InsightResponse, ClientError> {
        Ok(InsightResponse {
            summary: format!("Growth running at {:.1}%.", request.data.growth_rate),
            key_takeaways: vec!["Watch the funding pipeline".to_string()],
            created_at: None,
        })
    }

    async fn generate_strategy(
        &self,
        request: &StrategyRequest,
    ) -> Result<StrategyResponse, ClientError> {
        Ok(StrategyResponse {
            kind: request.analysis_type.as_str().to_string(),
            content: json!({"strengths": ["Established demand"]}),
            recommendations: vec!["Prioritize retention".to_string()],
            created_at: None,
        })
    }

    async fn generate_forecast(
        &self,
        request: &ForecastRequest,
    ) -> Result<ForecastResponse, ClientError> {
        Ok(ForecastResponse {
            metric: request.metric.clone(),
            historical: vec![],
            forecast: vec![],
            confidence_interval: ConfidenceInterval::default(),
        })
    }
}

struct Harness {
    session: Arc<AnalysisSession>,
    store: Arc<QueryStore>,
    pending: mpsc::UnboundedReceiver<PendingMarket>,
}

fn harness() -> Harness {
    let (api, pending) = GatedApi::new();
    let events = Arc::new(EventBus::new());
    let store = Arc::new(QueryStore::new(events));
    let session = AnalysisSession::new(
        QueryGraph::standard().expect("standard graph is acyclic"),
        store.clone(),
        Arc::new(SelectionState::new()),
        api,
        100,
    );
    Harness {
        session,
        store,
        pending,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stale_market_response_never_surfaces_under_a_newer_selection() {
    let mut harness = harness();
    let session = harness.session.clone();

    session.select(Selection::company("Apple"));
    let runner = {
        let session = session.clone();
        tokio::spawn(async move { session.run_until_settled().await })
    };

    // The Apple market fetch is in flight; park it.
    let apple_call = timeout(WAIT, harness.pending.recv())
        .await
        .expect("apple call arrives")
        .expect("sender alive");
    assert_eq!(apple_call.request.company.as_deref(), Some("Apple"));

    // Switch subjects before Apple resolves.
    session.select(Selection::industry("Finance"));
    let finance_call = timeout(WAIT, harness.pending.recv())
        .await
        .expect("finance call arrives")
        .expect("sender alive");
    assert_eq!(finance_call.request.industry.as_deref(), Some("Finance"));

    // Finance resolves first; the stale Apple response lands afterwards.
    finance_call
        .respond
        .send(Ok(market_response(Some("Finance"), None, 5.5)))
        .expect("store task is waiting");
    apple_call
        .respond
        .send(Ok(market_response(None, Some("Apple"), 99.9)))
        .expect("store task is waiting");

    timeout(WAIT, runner)
        .await
        .expect("session settles")
        .expect("runner task completes");

    // Every visible panel belongs to Finance; Apple's numbers are gone.
    let views = session.views();
    let market = views[&Product::MarketMetrics]
        .value
        .as_ref()
        .and_then(|value| value.as_market())
        .expect("market view populated");
    assert_eq!(market.industry.as_deref(), Some("Finance"));
    assert_eq!(market.metrics.growth_rate, 5.5);

    let rendered = dashboard::render(&Selection::industry("Finance"), &views);
    assert!(rendered.contains("industry Finance"));
    assert!(rendered.contains("5.5%"));
    assert!(!rendered.contains("99.9"));

    // The Apple entry had no subscribers left when its resolution arrived,
    // so it was evicted on the spot.
    let apple_key = QueryKey::root(Product::MarketMetrics, Selection::company("Apple"));
    for _ in 0..100 {
        if harness.store.get(&apple_key).is_none() {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(harness.store.get(&apple_key).is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn insights_chain_on_resolved_metrics() {
    let mut harness = harness();
    let session = harness.session.clone();

    session.select(Selection::industry("Technology"));
    let runner = {
        let session = session.clone();
        tokio::spawn(async move { session.run_until_settled().await })
    };

    let market_call = timeout(WAIT, harness.pending.recv())
        .await
        .expect("market call arrives")
        .expect("sender alive");
    assert_eq!(market_call.request.industry.as_deref(), Some("Technology"));
    assert_eq!(market_call.request.timeframe, "1y");

    // While metrics are in flight, insights stay disabled.
    let views = session.views();
    assert!(!views[&Product::Insights].enabled);
    assert_eq!(views[&Product::MarketMetrics].status, QueryStatus::Loading);

    market_call
        .respond
        .send(Ok(market_response(Some("Technology"), None, 12.4)))
        .expect("store task is waiting");

    timeout(WAIT, runner)
        .await
        .expect("session settles")
        .expect("runner task completes");

    let views = session.views();
    let insights = views[&Product::Insights]
        .value
        .as_ref()
        .and_then(|value| value.as_insights())
        .expect("insights resolved");
    assert_eq!(insights.summary, "Growth running at 12.4%.");

    let rendered = dashboard::render(&Selection::industry("Technology"), &views);
    assert!(rendered.contains("12.4%"));
    assert!(rendered.contains("$500.0M"));
    assert!(rendered.contains("$900.0B"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reselecting_the_same_subject_does_not_refetch() {
    let mut harness = harness();
    let session = harness.session.clone();

    session.select(Selection::industry("Technology"));
    let runner = {
        let session = session.clone();
        tokio::spawn(async move { session.run_until_settled().await })
    };
    let market_call = timeout(WAIT, harness.pending.recv())
        .await
        .expect("market call arrives")
        .expect("sender alive");
    market_call
        .respond
        .send(Ok(market_response(Some("Technology"), None, 12.4)))
        .expect("store task is waiting");
    timeout(WAIT, runner)
        .await
        .expect("session settles")
        .expect("runner task completes");

    // Idempotent selection: no notification, no new desired keys.
    session.select(Selection::industry("Technology"));
    session.run_until_settled().await;

    assert!(
        harness.pending.try_recv().is_err(),
        "no second market fetch may be issued"
    );
}
