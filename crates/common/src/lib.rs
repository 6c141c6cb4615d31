//! Noe Ops Common Library
//!
//! Shared code for the Noe Sushi Bar back office including:
//! - Domain models (recipes, documents, Odoo and Toast shapes)
//! - Recipe costing with the Q-factor
//! - Persistence (in-memory and PostgreSQL via SeaORM)
//! - Odoo and Toast clients
//! - Error types and response envelopes
//! - Configuration management
//! - Sessions, caching, metrics

pub mod auth;
pub mod cache;
pub mod config;
pub mod costing;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod odoo;
pub mod response;
pub mod toast;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::Store;
pub use errors::{AppError, Result};
pub use response::ApiResponse;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
