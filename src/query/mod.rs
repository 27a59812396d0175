//! Dependent-query orchestration.
//!
//! - **store**: process-wide keyed cache with subscriber counting and
//!   at-most-one in-flight fetch per key
//! - **graph**: declarative product DAG with enablement and fingerprinting
//! - **session**: reconciles subscriptions and derives panel views
//! - **events**: monotonic epochs and wakeups tying the pieces together

mod events;
mod graph;
mod key;
mod session;
mod store;

pub use events::{Epoch, EventBus, QueryEvent, QueryEventKind};
pub use graph::{
    DesiredQuery, EvaluationPlan, FORECAST_METRIC, FORECAST_PERIODS, GraphError, ProductPlan,
    QueryGraph, QuerySpec, Upstream,
};
pub use key::{Fingerprint, QueryKey, fingerprint_of};
pub use session::{AnalysisSession, QueryView};
pub use store::{
    ErrorInfo, FailureKind, QueryEntry, QueryStatus, QueryStore, SubscriptionHandle,
};
