//! Data layer for the class dashboard.
//!
//! Fetches raw cell grids, resolves headers, normalises and enriches rows
//! into records, and provides the query and aggregation engines the views
//! are built on.

pub mod aggregator;
pub mod enricher;
pub mod headers;
pub mod normalizer;
pub mod pipeline;
pub mod query;
pub mod source;

pub use dashboard_core as core;
