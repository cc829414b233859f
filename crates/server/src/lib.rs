//! HTTP read API for the scratcher change aggregator.
//!
//! This crate provides:
//! - Recent-change and per-sandbox change listings
//! - The active sandbox listing
//! - On-demand poll triggering
//! - Health and Prometheus endpoints

pub mod auth;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
