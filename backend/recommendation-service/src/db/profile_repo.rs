use crate::error::Result;
use crate::models::{RawUserPreferences, RawUserProfile, UserId};
use sqlx::PgPool;

/// Keyword profiles and ranking preferences, both keyed by user
#[derive(Clone)]
pub struct ProfileRepository {
    pool: PgPool,
}

impl ProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Latest keyword profile; keywords stay raw JSON
    pub async fn get_profile(&self, user_id: UserId) -> Result<Option<RawUserProfile>> {
        let profile = sqlx::query_as::<_, RawUserProfile>(
            r#"
            SELECT user_id, keywords
            FROM cv_analysis
            WHERE user_id = $1
            ORDER BY updated_at DESC NULLS LAST
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    pub async fn get_preferences(&self, user_id: UserId) -> Result<Option<RawUserPreferences>> {
        let preferences = sqlx::query_as::<_, RawUserPreferences>(
            r#"
            SELECT country_weights, platform_weights
            FROM user_preferences
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(preferences)
    }
}
