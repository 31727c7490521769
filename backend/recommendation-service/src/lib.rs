//! Hybrid internship recommendation engine
//!
//! Blends TF-IDF content similarity with user-user collaborative filtering
//! over implicit "saved" signals, then persists the top-N per user.

pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod models;
pub mod services;

pub use config::Config;
pub use db::{PgRecommendationStore, RecommendationStore};
pub use error::{AppError, Result};
pub use services::recommendation::{GenerationOutcome, PersistenceReport, RecommendationEngine};
