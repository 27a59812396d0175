//! marketscope: dependent-query orchestration for a market-intelligence
//! dashboard.
//!
//! The core is the query layer: a keyed cache with subscriber counting and
//! in-flight deduplication ([`query::QueryStore`]), a declarative dependency
//! graph over data products ([`query::QueryGraph`]), and a session that
//! reconciles the two against the current selection
//! ([`query::AnalysisSession`]). Panels consume nothing but
//! [`query::QueryView`] snapshots, so a resolution whose key is no longer
//! desired can never reach the screen.

pub mod client;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
pub mod query;
pub(crate) mod util;

pub use marketscope_api_types as api_types;
