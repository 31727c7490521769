use anyhow::{bail, Context};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use recommendation_service::config::{Config, LogFormat};
use recommendation_service::db::{self, PgRecommendationStore};
use recommendation_service::metrics;
use recommendation_service::models::UserId;
use recommendation_service::RecommendationEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,sqlx=warn".into());
    match config.app.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }

    tracing::info!(
        "Starting {} v{}",
        config.app.service_name,
        env!("CARGO_PKG_VERSION")
    );

    let user_ids = parse_user_ids(std::env::args().skip(1))?;
    if user_ids.is_empty() {
        bail!("usage: recommendation-service <user_id> [<user_id> ...]");
    }

    // Initialize database
    let pool = db::create_pool(&config.database)
        .await
        .context("Failed to create database pool")?;
    if config.database.run_migrations {
        db::run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;
    }

    let store = Arc::new(PgRecommendationStore::new(pool));
    let engine = RecommendationEngine::new(store, config.recommendation.clone());

    for user_id in user_ids {
        let outcome = engine
            .run(
                user_id,
                config.recommendation.default_alpha,
                config.recommendation.default_top_n,
            )
            .await;

        for view in &outcome.recommendations {
            println!(
                "{}",
                serde_json::json!({ "user_id": user_id, "recommendation": view })
            );
        }

        if outcome.persistence.failed > 0 {
            tracing::warn!(
                user_id = user_id,
                failed = outcome.persistence.failed,
                "Some recommendations were not persisted"
            );
        }
    }

    let exported = metrics::render().context("Failed to render metrics")?;
    match &config.app.metrics_file {
        Some(path) => std::fs::write(path, exported)
            .with_context(|| format!("Failed to write metrics to {}", path))?,
        None => eprint!("{}", exported),
    }

    Ok(())
}

fn parse_user_ids(args: impl Iterator<Item = String>) -> anyhow::Result<Vec<UserId>> {
    args.map(|arg| {
        arg.parse::<UserId>()
            .with_context(|| format!("invalid user id: {}", arg))
    })
    .collect()
}
