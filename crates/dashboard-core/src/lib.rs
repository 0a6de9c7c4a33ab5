//! Core types for the class dashboard.
//!
//! Holds the canonical field registry and record model, the numeric and date
//! parsing rules shared by every layer, display formatting, CLI settings and
//! the error types.

pub mod data_processors;
pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
