//! Hybrid recommendation engine
//!
//! Fetches inputs from the store, ranks them with the pure [`rank`] core
//! and writes the result back best-effort. Callers always get a list.

use super::collaborative_filtering::{InteractionMatrix, NeighborhoodScorer};
use super::content_based::TextCorpusIndex;
use super::hybrid_ranker::{RankedListing, ScoreBlender};
use super::preference_weighter::PreferenceWeighter;
use super::score_vector::ListingDomain;
use crate::config::RecommendationConfig;
use crate::db::RecommendationStore;
use crate::error::Result;
use crate::metrics;
use crate::models::{
    normalize_keywords, Interaction, ListingCorpus, ListingId, RecommendationRecord,
    RecommendationView, UserId, UserPreferences,
};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Everything one ranking run reads, already normalized
#[derive(Debug, Clone, Default)]
pub struct RankingInputs {
    pub user_id: UserId,
    pub corpus: ListingCorpus,
    pub keywords: Vec<String>,
    pub preferences: UserPreferences,
    pub interactions: Vec<Interaction>,
    /// Listings already surfaced to the user
    pub excluded: HashSet<ListingId>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingParams {
    pub alpha: f64,
    pub top_n: usize,
    pub k_neighbors: usize,
    pub min_score: f64,
}

impl From<&RecommendationConfig> for RankingParams {
    fn from(config: &RecommendationConfig) -> Self {
        Self {
            alpha: config.default_alpha,
            top_n: config.default_top_n,
            k_neighbors: config.k_neighbors,
            min_score: config.min_score,
        }
    }
}

/// Deterministic ranking over in-memory inputs.
///
/// Content and collaborative scoring share no state; both produce vectors
/// over the active listing domain which are then blended and filtered.
pub fn rank(inputs: &RankingInputs, params: &RankingParams) -> Result<Vec<RankedListing>> {
    let domain = ListingDomain::new(inputs.corpus.ids());
    if domain.is_empty() || params.top_n == 0 {
        return Ok(Vec::new());
    }

    let content = TextCorpusIndex::score(&inputs.corpus, &inputs.keywords, &domain);
    let content = PreferenceWeighter::new(&inputs.preferences).apply(&content, &inputs.corpus);

    let matrix = InteractionMatrix::build(&inputs.interactions, &domain);
    let collaborative =
        NeighborhoodScorer::new(params.k_neighbors).score(&matrix, inputs.user_id, &domain);

    debug!(
        user_id = inputs.user_id,
        listings = domain.len(),
        matrix_users = matrix.user_count(),
        content_signal = !content.is_all_zero(),
        collaborative_signal = !collaborative.is_all_zero(),
        "Scored listings"
    );

    ScoreBlender::new(params.alpha, params.top_n, params.min_score).rank(
        &content,
        &collaborative,
        &domain,
        &inputs.excluded,
    )
}

/// Per-record write results; failures never abort the batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistenceReport {
    pub persisted: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct GenerationOutcome {
    pub recommendations: Vec<RecommendationView>,
    pub persistence: PersistenceReport,
}

pub struct RecommendationEngine {
    store: Arc<dyn RecommendationStore>,
    config: RecommendationConfig,
}

impl RecommendationEngine {
    pub fn new(store: Arc<dyn RecommendationStore>, config: RecommendationConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RecommendationConfig {
        &self.config
    }

    /// Ranked, persisted recommendations for `user_id`.
    ///
    /// Never fails: missing inputs fall back to defaults, and a failed
    /// profile or listing read yields an empty list.
    pub async fn generate_recommendations(
        &self,
        user_id: UserId,
        alpha: f64,
        top_n: usize,
    ) -> Vec<RecommendationView> {
        self.run(user_id, alpha, top_n).await.recommendations
    }

    pub async fn generate_with_defaults(&self, user_id: UserId) -> Vec<RecommendationView> {
        self.generate_recommendations(user_id, self.config.default_alpha, self.config.default_top_n)
            .await
    }

    /// Same as [`Self::generate_recommendations`] but also reports how many
    /// records were written.
    pub async fn run(&self, user_id: UserId, alpha: f64, top_n: usize) -> GenerationOutcome {
        let started = Instant::now();
        let params = self.resolve_params(user_id, alpha, top_n);

        if params.top_n == 0 {
            debug!(user_id = user_id, "Requested zero recommendations");
            metrics::record_generation_run("empty");
            return GenerationOutcome::default();
        }

        let Some(inputs) = self.load_inputs(user_id).await else {
            metrics::record_generation_run("aborted");
            metrics::record_generation_duration(started.elapsed());
            return GenerationOutcome::default();
        };

        let ranked = match rank(&inputs, &params) {
            Ok(ranked) => ranked,
            Err(e) => {
                error!(user_id = user_id, error = %e, error_kind = e.kind(), "Ranking failed");
                metrics::record_generation_run("aborted");
                metrics::record_generation_duration(started.elapsed());
                return GenerationOutcome::default();
            }
        };

        if ranked.is_empty() {
            info!(
                user_id = user_id,
                listings = inputs.corpus.len(),
                "No listing scored above threshold"
            );
            metrics::record_generation_run("empty");
            metrics::record_generation_duration(started.elapsed());
            return GenerationOutcome::default();
        }

        let recommended_at = Utc::now();
        let records: Vec<RecommendationRecord> = ranked
            .iter()
            .map(|r| RecommendationRecord::new(user_id, r.listing_id, r.score, recommended_at))
            .collect();

        let persistence = self.persist(&records).await;

        let recommendations: Vec<RecommendationView> = records
            .iter()
            .filter_map(|record| {
                inputs
                    .corpus
                    .get(record.listing_id)
                    .map(|listing| RecommendationView::from_listing(listing, record))
            })
            .collect();

        info!(
            user_id = user_id,
            returned = recommendations.len(),
            persisted = persistence.persisted,
            failed = persistence.failed,
            alpha = params.alpha,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Generated recommendations"
        );
        metrics::record_generation_run("ok");
        metrics::record_generation_duration(started.elapsed());
        metrics::record_items("returned", recommendations.len());

        GenerationOutcome {
            recommendations,
            persistence,
        }
    }

    /// Stored recommendations with listing detail, best score first
    pub async fn current_recommendations(&self, user_id: UserId, limit: usize) -> Vec<RecommendationView> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        match self.store.fetch_recommendations(user_id, limit).await {
            Ok(views) => views,
            Err(e) => {
                error!(user_id = user_id, error = %e, error_kind = e.kind(), "Failed to read stored recommendations");
                metrics::record_storage_error("list_recommendations", &e);
                Vec::new()
            }
        }
    }

    pub async fn record_view(&self, user_id: UserId, listing_id: ListingId) -> Result<bool> {
        self.store.mark_viewed(user_id, listing_id).await
    }

    pub async fn record_save(&self, user_id: UserId, listing_id: ListingId, saved: bool) -> Result<bool> {
        self.store.set_saved(user_id, listing_id, saved).await
    }

    fn resolve_params(&self, user_id: UserId, alpha: f64, top_n: usize) -> RankingParams {
        let mut params = RankingParams::from(&self.config);
        params.top_n = top_n;

        params.alpha = if alpha.is_nan() {
            warn!(
                user_id = user_id,
                fallback = self.config.default_alpha,
                "Blend weight is NaN, using configured default"
            );
            self.config.default_alpha
        } else if !(0.0..=1.0).contains(&alpha) {
            let clamped = alpha.clamp(0.0, 1.0);
            warn!(user_id = user_id, alpha = alpha, clamped = clamped, "Blend weight out of range");
            clamped
        } else {
            alpha
        };

        params
    }

    /// Reads every input concurrently. `None` means the run cannot proceed.
    async fn load_inputs(&self, user_id: UserId) -> Option<RankingInputs> {
        let store = self.store.as_ref();
        let (profile, preferences, listings, interactions, excluded) = tokio::join!(
            store.fetch_user_profile(user_id),
            store.fetch_user_preferences(user_id),
            store.fetch_active_listings(self.config.listing_limit),
            store.fetch_saved_interactions(),
            store.fetch_recommended_listing_ids(user_id),
        );

        let profile = match profile {
            Ok(profile) => profile,
            Err(e) => {
                error!(user_id = user_id, error = %e, error_kind = e.kind(), "Failed to fetch user profile");
                metrics::record_storage_error("fetch_profile", &e);
                return None;
            }
        };

        let listings = match listings {
            Ok(listings) => listings,
            Err(e) => {
                error!(user_id = user_id, error = %e, error_kind = e.kind(), "Failed to fetch active listings");
                metrics::record_storage_error("fetch_active_listings", &e);
                return None;
            }
        };

        let keywords = match profile {
            Some(profile) => normalize_keywords(user_id, profile.keywords.as_ref()),
            None => {
                warn!(user_id = user_id, "No keyword profile, content scores will be zero");
                metrics::record_input_fallback("missing_profile");
                Vec::new()
            }
        };

        let preferences = match preferences {
            Ok(raw) => UserPreferences::from_raw(user_id, raw),
            Err(e) => {
                error!(user_id = user_id, error = %e, error_kind = e.kind(), "Failed to fetch preferences, using defaults");
                metrics::record_storage_error("fetch_preferences", &e);
                metrics::record_input_fallback("preferences_read_failed");
                UserPreferences::default()
            }
        };

        let interactions = interactions.unwrap_or_else(|e| {
            error!(user_id = user_id, error = %e, error_kind = e.kind(), "Failed to fetch interactions, collaborative scores will be zero");
            metrics::record_storage_error("fetch_interactions", &e);
            metrics::record_input_fallback("interactions_read_failed");
            Vec::new()
        });

        let excluded = excluded.unwrap_or_else(|e| {
            error!(user_id = user_id, error = %e, error_kind = e.kind(), "Failed to fetch previous recommendations");
            metrics::record_storage_error("fetch_exclusions", &e);
            metrics::record_input_fallback("exclusions_read_failed");
            HashSet::new()
        });

        if listings.is_empty() {
            info!(user_id = user_id, "No active listings");
        }

        Some(RankingInputs {
            user_id,
            corpus: ListingCorpus::from_listings(listings),
            keywords,
            preferences,
            interactions,
            excluded,
        })
    }

    async fn persist(&self, records: &[RecommendationRecord]) -> PersistenceReport {
        let policy = self.config.engagement_policy;
        let mut report = PersistenceReport::default();

        for record in records {
            match self.store.upsert_recommendation(record, policy).await {
                Ok(()) => report.persisted += 1,
                Err(e) => {
                    error!(
                        user_id = record.user_id,
                        listing_id = record.listing_id,
                        error = %e,
                        error_kind = e.kind(),
                        "Failed to persist recommendation"
                    );
                    metrics::record_storage_error("upsert_recommendation", &e);
                    report.failed += 1;
                }
            }
        }

        metrics::record_items("persisted", report.persisted);
        metrics::record_items("persist_failed", report.failed);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Listing;

    fn listing(id: ListingId, title: &str, skills: &str) -> Listing {
        Listing {
            id,
            title: title.to_string(),
            company: None,
            location: None,
            country: None,
            platform: None,
            description: None,
            skills: Some(skills.to_string()),
            domain: None,
            link: None,
        }
    }

    fn inputs(keywords: &[&str]) -> RankingInputs {
        RankingInputs {
            user_id: 1,
            corpus: ListingCorpus::from_listings(vec![
                listing(1, "Data Analyst Intern", "Python, SQL"),
                listing(2, "Marketing Intern", "SEO"),
            ]),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            ..Default::default()
        }
    }

    fn params(alpha: f64, top_n: usize) -> RankingParams {
        RankingParams {
            alpha,
            top_n,
            k_neighbors: 10,
            min_score: 1e-6,
        }
    }

    #[test]
    fn test_content_decides_when_collaborative_is_flat() {
        let ranked = rank(&inputs(&["python", "sql"]), &params(0.6, 1)).unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].listing_id, 1);
        assert_eq!(ranked[0].collaborative_score, 0.0);
    }

    #[test]
    fn test_empty_keywords_and_no_interactions_rank_nothing() {
        assert!(rank(&inputs(&[]), &params(0.6, 10)).unwrap().is_empty());
    }

    #[test]
    fn test_empty_keywords_ranked_by_collaborative() {
        let mut inputs = inputs(&[]);
        inputs.interactions = vec![
            Interaction::new(1, 1),
            Interaction::new(2, 1),
            Interaction::new(2, 2),
        ];
        let ranked = rank(&inputs, &params(0.6, 10)).unwrap();
        assert!(!ranked.is_empty());
        assert!(ranked.iter().all(|r| r.content_score == 0.0));
    }

    #[test]
    fn test_rank_is_deterministic() {
        let inputs = inputs(&["python", "intern"]);
        let first = rank(&inputs, &params(0.6, 10)).unwrap();
        let second = rank(&inputs, &params(0.6, 10)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_excluded_listing_never_returned() {
        let mut inputs = inputs(&["python", "sql"]);
        inputs.excluded.insert(1);
        let ranked = rank(&inputs, &params(0.6, 10)).unwrap();
        assert!(ranked.iter().all(|r| r.listing_id != 1));
    }

    #[test]
    fn test_empty_corpus_ranks_nothing() {
        let inputs = RankingInputs {
            keywords: vec!["python".to_string()],
            ..Default::default()
        };
        assert!(rank(&inputs, &params(0.6, 10)).unwrap().is_empty());
    }
}
