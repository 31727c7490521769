// ============================================
// Hybrid Recommendation (content + collaborative)
// ============================================
//
// Architecture:
//   TextCorpusIndex ──► PreferenceWeighter ──┐
//                                             ├──► ScoreBlender ──► top-N
//   InteractionMatrix ──► NeighborhoodScorer ─┘
//
// Score vectors are always aligned to the active listing domain before
// any arithmetic between them.

pub mod collaborative_filtering;
pub mod content_based;
pub mod engine;
pub mod hybrid_ranker;
pub mod preference_weighter;
pub mod score_vector;
pub mod stop_words;

pub use collaborative_filtering::{InteractionMatrix, NeighborhoodScorer};
pub use content_based::{TextCorpusIndex, TfidfIndex};
pub use engine::{
    rank, GenerationOutcome, PersistenceReport, RankingInputs, RankingParams,
    RecommendationEngine,
};
pub use hybrid_ranker::{RankedListing, ScoreBlender};
pub use preference_weighter::PreferenceWeighter;
pub use score_vector::{ListingDomain, ScoreVector};
