//! Storage collaborator for the recommendation engine
//!
//! `RecommendationStore` is the seam the engine depends on; the Postgres
//! implementation composes one repository per table group.

pub mod listing_repo;
pub mod profile_repo;
pub mod recommendation_repo;

pub use listing_repo::ListingRepository;
pub use profile_repo::ProfileRepository;
pub use recommendation_repo::RecommendationRepository;

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::models::{
    EngagementPolicy, Interaction, Listing, ListingId, RawUserPreferences, RawUserProfile,
    RecommendationRecord, RecommendationView, UserId,
};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::HashSet;
use std::time::Duration;
use tracing::info;

#[async_trait]
pub trait RecommendationStore: Send + Sync {
    async fn fetch_user_profile(&self, user_id: UserId) -> Result<Option<RawUserProfile>>;

    async fn fetch_user_preferences(&self, user_id: UserId) -> Result<Option<RawUserPreferences>>;

    /// Active listings, most recently scraped first
    async fn fetch_active_listings(&self, limit: i64) -> Result<Vec<Listing>>;

    /// Every saved `(user, listing)` pair across all users
    async fn fetch_saved_interactions(&self) -> Result<Vec<Interaction>>;

    async fn fetch_recommended_listing_ids(&self, user_id: UserId) -> Result<HashSet<ListingId>>;

    async fn upsert_recommendation(
        &self,
        record: &RecommendationRecord,
        policy: EngagementPolicy,
    ) -> Result<()>;

    /// Current recommendations joined with listing detail, best score first
    async fn fetch_recommendations(&self, user_id: UserId, limit: i64) -> Result<Vec<RecommendationView>>;

    async fn mark_viewed(&self, user_id: UserId, listing_id: ListingId) -> Result<bool>;

    async fn set_saved(&self, user_id: UserId, listing_id: ListingId, saved: bool) -> Result<bool>;
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgRecommendationStore {
    listings: ListingRepository,
    profiles: ProfileRepository,
    recommendations: RecommendationRepository,
}

impl PgRecommendationStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            listings: ListingRepository::new(pool.clone()),
            profiles: ProfileRepository::new(pool.clone()),
            recommendations: RecommendationRepository::new(pool),
        }
    }
}

#[async_trait]
impl RecommendationStore for PgRecommendationStore {
    async fn fetch_user_profile(&self, user_id: UserId) -> Result<Option<RawUserProfile>> {
        self.profiles.get_profile(user_id).await
    }

    async fn fetch_user_preferences(&self, user_id: UserId) -> Result<Option<RawUserPreferences>> {
        self.profiles.get_preferences(user_id).await
    }

    async fn fetch_active_listings(&self, limit: i64) -> Result<Vec<Listing>> {
        self.listings.list_active(limit).await
    }

    async fn fetch_saved_interactions(&self) -> Result<Vec<Interaction>> {
        self.recommendations.list_saved_interactions().await
    }

    async fn fetch_recommended_listing_ids(&self, user_id: UserId) -> Result<HashSet<ListingId>> {
        self.recommendations.list_recommended_ids(user_id).await
    }

    async fn upsert_recommendation(
        &self,
        record: &RecommendationRecord,
        policy: EngagementPolicy,
    ) -> Result<()> {
        self.recommendations.upsert(record, policy).await
    }

    async fn fetch_recommendations(&self, user_id: UserId, limit: i64) -> Result<Vec<RecommendationView>> {
        self.recommendations.list_for_user(user_id, limit).await
    }

    async fn mark_viewed(&self, user_id: UserId, listing_id: ListingId) -> Result<bool> {
        self.recommendations.mark_viewed(user_id, listing_id).await
    }

    async fn set_saved(&self, user_id: UserId, listing_id: ListingId, saved: bool) -> Result<bool> {
        self.recommendations.set_saved(user_id, listing_id, saved).await
    }
}

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(&config.url)
        .await?;

    info!(
        max_connections = config.max_connections,
        "Database pool created"
    );
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations applied");
    Ok(())
}
