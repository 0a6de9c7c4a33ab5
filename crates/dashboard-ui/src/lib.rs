//! Terminal UI layer for the class dashboard.
//!
//! Provides themes, header and status components, the record table and
//! teacher views, and the application event loop built on top of
//! [`ratatui`].

pub mod app;
pub mod components;
pub mod table_view;
pub mod teachers_view;
pub mod themes;

pub use dashboard_core as core;
