use crate::error::Result;
use crate::models::{
    EngagementPolicy, Interaction, ListingId, RecommendationRecord, RecommendationView, UserId,
};
use sqlx::PgPool;
use std::collections::HashSet;

/// Repository for user_recommendations: ranking output plus the
/// viewed/saved engagement flags set by users.
#[derive(Clone)]
pub struct RecommendationRepository {
    pool: PgPool,
}

impl RecommendationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or overwrite the record for `(user_id, listing_id)`.
    ///
    /// `Reset` clears engagement flags and their timestamps on overwrite,
    /// `Preserve` only refreshes score and timestamp.
    pub async fn upsert(&self, record: &RecommendationRecord, policy: EngagementPolicy) -> Result<()> {
        let sql = match policy {
            EngagementPolicy::Reset => {
                r#"
                INSERT INTO user_recommendations
                    (user_id, internship_id, similarity_score, recommended_at,
                     is_viewed, is_saved, viewed_at, saved_at)
                VALUES ($1, $2, $3, $4, $5, $6, NULL, NULL)
                ON CONFLICT (user_id, internship_id) DO UPDATE SET
                    similarity_score = EXCLUDED.similarity_score,
                    recommended_at = EXCLUDED.recommended_at,
                    is_viewed = FALSE,
                    is_saved = FALSE,
                    viewed_at = NULL,
                    saved_at = NULL
                "#
            }
            EngagementPolicy::Preserve => {
                r#"
                INSERT INTO user_recommendations
                    (user_id, internship_id, similarity_score, recommended_at,
                     is_viewed, is_saved, viewed_at, saved_at)
                VALUES ($1, $2, $3, $4, $5, $6, NULL, NULL)
                ON CONFLICT (user_id, internship_id) DO UPDATE SET
                    similarity_score = EXCLUDED.similarity_score,
                    recommended_at = EXCLUDED.recommended_at
                "#
            }
        };

        sqlx::query(sql)
            .bind(record.user_id)
            .bind(record.listing_id)
            .bind(record.similarity_score)
            .bind(record.recommended_at)
            .bind(record.is_viewed)
            .bind(record.is_saved)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Listing ids already surfaced to the user
    pub async fn list_recommended_ids(&self, user_id: UserId) -> Result<HashSet<ListingId>> {
        let ids: Vec<ListingId> = sqlx::query_scalar(
            r#"
            SELECT internship_id
            FROM user_recommendations
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().collect())
    }

    pub async fn list_saved_interactions(&self) -> Result<Vec<Interaction>> {
        let interactions = sqlx::query_as::<_, Interaction>(
            r#"
            SELECT user_id, internship_id AS listing_id
            FROM user_recommendations
            WHERE is_saved = TRUE
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(interactions)
    }

    pub async fn list_for_user(&self, user_id: UserId, limit: i64) -> Result<Vec<RecommendationView>> {
        let views = sqlx::query_as::<_, RecommendationView>(
            r#"
            SELECT l.id,
                   l.title,
                   COALESCE(l.company, '') AS company,
                   COALESCE(l.location, '') AS location,
                   COALESCE(l.country, '') AS country,
                   COALESCE(l.platform, '') AS platform,
                   COALESCE(l.description, '') AS description,
                   COALESCE(l.skills, '') AS skills,
                   COALESCE(l.domain, '') AS domain,
                   COALESCE(l.link, '') AS link,
                   COALESCE(r.similarity_score, 0) AS similarity_score,
                   r.recommended_at,
                   r.is_viewed,
                   r.is_saved
            FROM user_recommendations r
            JOIN internship_listings l ON l.id = r.internship_id
            WHERE r.user_id = $1
              AND l.is_active = TRUE
            ORDER BY similarity_score DESC, l.id ASC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(views)
    }

    /// Flag an existing recommendation as viewed. Returns false when the
    /// listing was never recommended to the user.
    pub async fn mark_viewed(&self, user_id: UserId, listing_id: ListingId) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE user_recommendations
            SET is_viewed = TRUE, viewed_at = NOW()
            WHERE user_id = $1 AND internship_id = $2
            "#,
        )
        .bind(user_id)
        .bind(listing_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Saved listings feed collaborative filtering for every other user.
    /// Only existing recommendations can be saved.
    pub async fn set_saved(&self, user_id: UserId, listing_id: ListingId, saved: bool) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE user_recommendations
            SET is_saved = $3,
                saved_at = CASE WHEN $3 THEN NOW() ELSE NULL END
            WHERE user_id = $1 AND internship_id = $2
            "#,
        )
        .bind(user_id)
        .bind(listing_id)
        .bind(saved)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
