//! Presentational consumers of the query-view contract.

pub mod dashboard;
