// ============================================
// Hybrid Ranker
// ============================================
//
// Blends content and collaborative scores:
//   final_score = α × content + (1 − α) × collaborative
//
// Both inputs are min-max normalized independently over the full active
// listing domain before blending.

use super::score_vector::{ListingDomain, ScoreVector};
use crate::error::Result;
use crate::models::ListingId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Ranked listing with its score breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedListing {
    pub listing_id: ListingId,
    pub score: f64,
    pub content_score: f64,
    pub collaborative_score: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ScoreBlender {
    /// Content weight in [0, 1]
    pub alpha: f64,
    pub top_n: usize,
    /// Blended scores at or below this are discarded
    pub min_score: f64,
}

impl Default for ScoreBlender {
    fn default() -> Self {
        Self {
            alpha: 0.6,
            top_n: 10,
            min_score: 1e-6,
        }
    }
}

impl ScoreBlender {
    pub fn new(alpha: f64, top_n: usize, min_score: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            top_n,
            min_score,
        }
    }

    /// Element-wise convex combination of the normalized inputs
    pub fn blend(
        &self,
        content: &ScoreVector,
        collaborative: &ScoreVector,
        domain: &ListingDomain,
    ) -> Result<(ScoreVector, ScoreVector, ScoreVector)> {
        let content = content.reindex(domain).min_max_normalized();
        let collaborative = collaborative.reindex(domain).min_max_normalized();

        let alpha = self.alpha;
        let blended = content.combine(&collaborative, |c, f| alpha * c + (1.0 - alpha) * f)?;
        Ok((blended, content, collaborative))
    }

    /// Top-N blended listings not in `excluded`, highest score first with
    /// ties broken by ascending listing id.
    pub fn rank(
        &self,
        content: &ScoreVector,
        collaborative: &ScoreVector,
        domain: &ListingDomain,
        excluded: &HashSet<ListingId>,
    ) -> Result<Vec<RankedListing>> {
        if self.top_n == 0 || domain.is_empty() {
            return Ok(Vec::new());
        }

        let (blended, content, collaborative) = self.blend(content, collaborative, domain)?;

        let mut ranked: Vec<RankedListing> = blended
            .iter()
            .filter(|(id, score)| !excluded.contains(id) && *score > self.min_score)
            .map(|(id, score)| RankedListing {
                listing_id: id,
                score,
                content_score: content.get(id),
                collaborative_score: collaborative.get(id),
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.listing_id.cmp(&b.listing_id))
        });
        ranked.truncate(self.top_n);

        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain() -> ListingDomain {
        ListingDomain::new([1, 2, 3, 4])
    }

    fn content() -> ScoreVector {
        ScoreVector::from_scores(&domain(), [(1, 0.9), (2, 0.3), (3, 0.6), (4, 0.0)])
    }

    fn collaborative() -> ScoreVector {
        ScoreVector::from_scores(&domain(), [(1, 0.0), (2, 1.0), (3, 0.5), (4, 0.25)])
    }

    #[test]
    fn test_alpha_one_equals_normalized_content() {
        let blender = ScoreBlender::new(1.0, 10, 1e-6);
        let (blended, content, _) = blender.blend(&content(), &collaborative(), &domain()).unwrap();
        assert_eq!(blended.values(), content.values());
    }

    #[test]
    fn test_alpha_zero_equals_normalized_collaborative() {
        let blender = ScoreBlender::new(0.0, 10, 1e-6);
        let (blended, _, collaborative) = blender.blend(&content(), &collaborative(), &domain()).unwrap();
        assert_eq!(blended.values(), collaborative.values());
    }

    #[test]
    fn test_blend_stays_in_unit_interval() {
        let blender = ScoreBlender::new(0.6, 10, 1e-6);
        let (blended, content, collaborative) = blender.blend(&content(), &collaborative(), &domain()).unwrap();
        for v in blended.values().iter().chain(content.values()).chain(collaborative.values()) {
            assert!((0.0..=1.0).contains(v));
        }
    }

    #[test]
    fn test_rank_excludes_previous_recommendations() {
        let blender = ScoreBlender::new(0.6, 10, 1e-6);
        let excluded: HashSet<ListingId> = [1].into_iter().collect();
        let ranked = blender.rank(&content(), &collaborative(), &domain(), &excluded).unwrap();
        assert!(ranked.iter().all(|r| r.listing_id != 1));
    }

    #[test]
    fn test_rank_drops_near_zero_and_truncates() {
        let zero = ScoreVector::zeros(&domain());
        let only_one = ScoreVector::from_scores(&domain(), [(3, 0.4)]);
        let ranked = ScoreBlender::new(0.6, 1, 1e-6)
            .rank(&only_one, &zero, &domain(), &HashSet::new())
            .unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].listing_id, 3);

        let none = ScoreBlender::new(0.6, 10, 1e-6)
            .rank(&zero, &zero, &domain(), &HashSet::new())
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_ties_broken_by_listing_id() {
        let flat = ScoreVector::from_scores(&domain(), [(4, 0.5), (2, 0.5), (3, 0.5), (1, 0.5)]);
        let ranked = ScoreBlender::new(1.0, 3, 1e-6)
            .rank(&flat, &ScoreVector::zeros(&domain()), &domain(), &HashSet::new())
            .unwrap();
        let ids: Vec<ListingId> = ranked.iter().map(|r| r.listing_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(ranked.iter().all(|r| r.score == 0.5));
    }

    #[test]
    fn test_tiny_content_signal_does_not_lift_zero_listings() {
        let domain = ListingDomain::new([1, 2, 3]);
        let content = ScoreVector::from_scores(&domain, [(1, 1e-17)]);
        let ranked = ScoreBlender::new(0.6, 10, 1e-6)
            .rank(&content, &ScoreVector::zeros(&domain), &domain, &HashSet::new())
            .unwrap();
        let ids: Vec<ListingId> = ranked.iter().map(|r| r.listing_id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn test_missing_entries_reindexed_as_zero() {
        let partial = ScoreVector::from_scores(&ListingDomain::new([2]), [(2, 0.8)]);
        let ranked = ScoreBlender::new(1.0, 10, 1e-6)
            .rank(&partial, &ScoreVector::zeros(&domain()), &domain(), &HashSet::new())
            .unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].listing_id, 2);
    }
}
