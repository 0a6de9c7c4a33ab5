//! Runtime layer for the class dashboard.
//!
//! Owns the published record set and runs imports and edits on a background
//! tokio task on behalf of the UI.

pub mod data_manager;
pub mod orchestrator;

pub use dashboard_core as core;
pub use dashboard_data as data;
