//! # slices
//!
//! HTTP service and CLI over `slices-core`.
//!
//! - `api`: axum router mounted under `/api/slices`
//! - `search`: gateway to the external full-text search service
//! - `config`: TOML configuration with environment overrides
//! - `cli`: clap commands driving the same engine locally

pub mod api;
pub mod cli;
pub mod config;
pub mod search;
