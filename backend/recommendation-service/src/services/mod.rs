pub mod recommendation;

pub use recommendation::{RecommendationEngine, RankingInputs, RankingParams};
