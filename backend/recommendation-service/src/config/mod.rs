use crate::error::{AppError, Result};
use crate::models::EngagementPolicy;
use std::env;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub recommendation: RecommendationConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub service_name: String,
    pub log_format: LogFormat,
    /// Prometheus text dump written on exit; stderr when unset
    pub metrics_file: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(AppError::InvalidParameter(format!(
                "unknown log format: {}",
                other
            ))),
        }
    }
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub run_migrations: bool,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .field("run_migrations", &self.run_migrations)
            .finish()
    }
}

/// Tunables for the hybrid engine
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationConfig {
    /// Weight of the content score in the blend (collaborative gets 1 - alpha)
    pub default_alpha: f64,
    pub default_top_n: usize,
    pub k_neighbors: usize,
    /// Upper bound on the active listings read per run
    pub listing_limit: i64,
    /// Blended scores at or below this are never returned
    pub min_score: f64,
    pub engagement_policy: EngagementPolicy,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            default_alpha: 0.6,
            default_top_n: 10,
            k_neighbors: 10,
            listing_limit: 5000,
            min_score: 1e-6,
            engagement_policy: EngagementPolicy::Reset,
        }
    }
}

impl RecommendationConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.default_alpha) {
            return Err(AppError::InvalidParameter(format!(
                "RECOMMENDATION_ALPHA must be within [0, 1], got {}",
                self.default_alpha
            )));
        }
        if self.k_neighbors == 0 {
            return Err(AppError::InvalidParameter(
                "RECOMMENDATION_K_NEIGHBORS must be at least 1".to_string(),
            ));
        }
        if self.listing_limit <= 0 {
            return Err(AppError::InvalidParameter(
                "RECOMMENDATION_LISTING_LIMIT must be positive".to_string(),
            ));
        }
        if !self.min_score.is_finite() || self.min_score < 0.0 {
            return Err(AppError::InvalidParameter(
                "RECOMMENDATION_MIN_SCORE must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = RecommendationConfig::default();
        let recommendation = RecommendationConfig {
            default_alpha: parse_env("RECOMMENDATION_ALPHA", defaults.default_alpha)?,
            default_top_n: parse_env("RECOMMENDATION_TOP_N", defaults.default_top_n)?,
            k_neighbors: parse_env("RECOMMENDATION_K_NEIGHBORS", defaults.k_neighbors)?,
            listing_limit: parse_env("RECOMMENDATION_LISTING_LIMIT", defaults.listing_limit)?,
            min_score: parse_env("RECOMMENDATION_MIN_SCORE", defaults.min_score)?,
            engagement_policy: parse_env(
                "RECOMMENDATION_ENGAGEMENT_POLICY",
                defaults.engagement_policy,
            )?,
        };
        recommendation.validate()?;

        Ok(Config {
            app: AppConfig {
                service_name: env::var("SERVICE_NAME")
                    .unwrap_or_else(|_| "recommendation-service".to_string()),
                log_format: parse_env("LOG_FORMAT", LogFormat::Text)?,
                metrics_file: env::var("METRICS_FILE")
                    .ok()
                    .map(|path| path.trim().to_string())
                    .filter(|path| !path.is_empty()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| {
                    AppError::InvalidParameter(
                        "DATABASE_URL environment variable not set".to_string(),
                    )
                })?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 10)?,
                acquire_timeout_secs: parse_env("DATABASE_ACQUIRE_TIMEOUT_SECS", 10)?,
                run_migrations: parse_env("RUN_MIGRATIONS", false)?,
            },
            recommendation,
        })
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|e: T::Err| {
            AppError::InvalidParameter(format!("{} has invalid value {:?}: {}", key, raw, e))
        }),
        _ => Ok(default),
    }
}
