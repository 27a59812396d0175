//! Declarative dependency graph over data products.
//!
//! Each product declares its upstream dependencies, an enablement rule, and
//! a pure request builder. Evaluation walks the products in topological
//! order and derives, for the current selection, which queries are desired
//! and under which keys. The graph is validated once at startup; a cycle or
//! an undeclared dependency is a fatal configuration error.

use std::collections::{BTreeMap, HashMap, VecDeque};

use thiserror::Error;

use marketscope_api_types::{
    AnalysisType, ForecastRequest, InsightRequest, MarketDataRequest, StrategyRequest,
};

use crate::domain::{Product, ProductOutput, ProductRequest, Selection};

use super::key::{QueryKey, fingerprint_of};

/// Metric and horizon for the trend forecast. Fixed so that the query key
/// fully determines the request.
pub const FORECAST_METRIC: &str = "growth";
pub const FORECAST_PERIODS: u32 = marketscope_api_types::DEFAULT_FORECAST_PERIODS;

/// Latest Success values of upstream products, keyed by product.
pub type Upstream = BTreeMap<Product, ProductOutput>;

/// Declarative description of one product's query.
///
/// `is_enabled` and `build_request` are plain function pointers: they cannot
/// capture ambient state, so the request is a pure function of (selection,
/// upstream values) and the derived key fully determines it.
pub struct QuerySpec {
    pub product: Product,
    pub depends_on: &'static [Product],
    pub is_enabled: fn(&Selection, &Upstream) -> bool,
    pub build_request: fn(&Selection, &Upstream) -> ProductRequest,
}

/// Malformed spec table, detected at startup. Unrecoverable.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("duplicate query spec for product `{product}`")]
    Duplicate { product: &'static str },
    #[error("query spec `{product}` depends on `{dependency}`, which has no spec")]
    UnknownDependency {
        product: &'static str,
        dependency: &'static str,
    },
    #[error("dependency cycle among query specs: {products:?}")]
    Cycle { products: Vec<&'static str> },
}

/// What the graph wants fetched for one product.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredQuery {
    pub key: QueryKey,
    pub request: ProductRequest,
}

/// Per-product outcome of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductPlan {
    pub product: Product,
    /// `None` when the product is disabled for the current inputs.
    pub desired: Option<DesiredQuery>,
}

/// Full outcome of one evaluation, in topological order.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationPlan {
    pub products: Vec<ProductPlan>,
}

impl EvaluationPlan {
    pub fn desired_key(&self, product: Product) -> Option<&QueryKey> {
        self.products
            .iter()
            .find(|plan| plan.product == product)
            .and_then(|plan| plan.desired.as_ref())
            .map(|desired| &desired.key)
    }
}

/// Validated, immutable set of query specs.
pub struct QueryGraph {
    specs: HashMap<Product, QuerySpec>,
    order: Vec<Product>,
}

impl QueryGraph {
    /// Validate the spec table and fix a topological evaluation order.
    pub fn new(specs: Vec<QuerySpec>) -> Result<Self, GraphError> {
        let mut table: HashMap<Product, QuerySpec> = HashMap::with_capacity(specs.len());
        for spec in specs {
            let product = spec.product;
            if table.insert(product, spec).is_some() {
                return Err(GraphError::Duplicate {
                    product: product.name(),
                });
            }
        }

        for spec in table.values() {
            for dependency in spec.depends_on {
                if !table.contains_key(dependency) {
                    return Err(GraphError::UnknownDependency {
                        product: spec.product.name(),
                        dependency: dependency.name(),
                    });
                }
            }
        }

        // Kahn's algorithm; deterministic order via sorted product keys.
        let mut in_degree: BTreeMap<Product, usize> = table
            .keys()
            .map(|&product| (product, table[&product].depends_on.len()))
            .collect();
        let mut ready: VecDeque<Product> = in_degree
            .iter()
            .filter(|&(_, &degree)| degree == 0)
            .map(|(&product, _)| product)
            .collect();
        let mut order = Vec::with_capacity(table.len());

        while let Some(product) = ready.pop_front() {
            order.push(product);
            for (&dependent, spec) in &table {
                if spec.depends_on.contains(&product)
                    && let Some(degree) = in_degree.get_mut(&dependent)
                {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push_back(dependent);
                    }
                }
            }
        }

        if order.len() < table.len() {
            let mut stuck: Vec<&'static str> = table
                .keys()
                .filter(|&product| !order.contains(product))
                .map(|product| product.name())
                .collect();
            stuck.sort_unstable();
            return Err(GraphError::Cycle { products: stuck });
        }

        Ok(Self {
            specs: table,
            order,
        })
    }

    /// The product spec table the dashboard ships with.
    ///
    /// Insights depend on market metrics; forecast and both strategy
    /// products are fetched independently of metrics, gated only on having
    /// a selection.
    pub fn standard() -> Result<Self, GraphError> {
        Self::new(vec![
            QuerySpec {
                product: Product::MarketMetrics,
                depends_on: &[],
                is_enabled: |selection, _| !selection.is_none(),
                build_request: |selection, _| {
                    let (industry, company) = selection.selector();
                    ProductRequest::Market(MarketDataRequest::for_selector(industry, company))
                },
            },
            QuerySpec {
                product: Product::Insights,
                depends_on: &[Product::MarketMetrics],
                is_enabled: |selection, upstream| {
                    !selection.is_none() && upstream.contains_key(&Product::MarketMetrics)
                },
                build_request: |selection, upstream| {
                    let (industry, company) = selection.selector();
                    let metrics = upstream
                        .get(&Product::MarketMetrics)
                        .and_then(ProductOutput::as_market)
                        .map(|market| market.metrics.clone())
                        .unwrap_or_default();
                    ProductRequest::Insights(InsightRequest {
                        industry,
                        company,
                        data: metrics,
                    })
                },
            },
            QuerySpec {
                product: Product::Forecast,
                depends_on: &[],
                is_enabled: |selection, _| !selection.is_none(),
                build_request: |selection, _| {
                    let (industry, company) = selection.selector();
                    ProductRequest::Forecast(ForecastRequest {
                        metric: FORECAST_METRIC.to_string(),
                        data: Vec::new(),
                        periods: FORECAST_PERIODS,
                        industry,
                        company,
                    })
                },
            },
            QuerySpec {
                product: Product::SwotAnalysis,
                depends_on: &[],
                is_enabled: |selection, _| !selection.is_none(),
                build_request: |selection, _| {
                    let (industry, company) = selection.selector();
                    ProductRequest::Strategy(StrategyRequest {
                        industry,
                        company,
                        analysis_type: AnalysisType::Swot,
                    })
                },
            },
            QuerySpec {
                product: Product::GrowthPlan,
                depends_on: &[],
                is_enabled: |selection, _| !selection.is_none(),
                build_request: |selection, _| {
                    let (industry, company) = selection.selector();
                    ProductRequest::Strategy(StrategyRequest {
                        industry,
                        company,
                        analysis_type: AnalysisType::Growth,
                    })
                },
            },
        ])
    }

    pub fn order(&self) -> &[Product] {
        &self.order
    }

    pub fn spec(&self, product: Product) -> Option<&QuerySpec> {
        self.specs.get(&product)
    }

    /// Derive the desired queries for `selection`.
    ///
    /// `resolved` supplies the latest Success value for a key, if any; a
    /// product that resolves feeds the upstream map of everything evaluated
    /// after it, so dependent keys pick up a fresh fingerprint the moment
    /// their upstream changes.
    pub fn evaluate<R>(&self, selection: &Selection, resolved: R) -> EvaluationPlan
    where
        R: Fn(&QueryKey) -> Option<ProductOutput>,
    {
        let mut upstream = Upstream::new();
        let mut products = Vec::with_capacity(self.order.len());

        for &product in &self.order {
            let spec = &self.specs[&product];
            if !(spec.is_enabled)(selection, &upstream) {
                products.push(ProductPlan {
                    product,
                    desired: None,
                });
                continue;
            }

            let request = (spec.build_request)(selection, &upstream);
            let key = if spec.depends_on.is_empty() {
                QueryKey::root(product, selection.clone())
            } else {
                QueryKey::derived(product, selection.clone(), fingerprint_of(&request))
            };

            if let Some(value) = resolved(&key) {
                upstream.insert(product, value);
            }

            products.push(ProductPlan {
                product,
                desired: Some(DesiredQuery { key, request }),
            });
        }

        EvaluationPlan { products }
    }
}
