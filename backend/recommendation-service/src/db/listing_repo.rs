use crate::error::Result;
use crate::models::Listing;
use sqlx::PgPool;

/// Read access to scraped internship listings
#[derive(Clone)]
pub struct ListingRepository {
    pool: PgPool,
}

impl ListingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Active, unexpired listings, newest first
    pub async fn list_active(&self, limit: i64) -> Result<Vec<Listing>> {
        let listings = sqlx::query_as::<_, Listing>(
            r#"
            SELECT id, title, company, location, country, platform,
                   description, skills, domain, link
            FROM internship_listings
            WHERE is_active = TRUE
              AND (expires_at IS NULL OR expires_at > NOW())
            ORDER BY scraped_at DESC NULLS LAST, id ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(listings)
    }
}
