// ============================================
// Collaborative Filtering (user-user kNN)
// ============================================
//
// Implicit "saved" signals only. The user×listing relation is kept sparse:
// one sorted listing set per user.
//
// Data Flow:
//   Saved interactions (all users) → InteractionMatrix (active listings only)
//   Target row × other rows → cosine similarity → top-k neighbors
//   Σ(sim × saved) / Σ(sim) → Collaborative Score

use super::score_vector::{ListingDomain, ScoreVector};
use crate::models::{Interaction, ListingId, UserId};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Binary user×listing relation restricted to active listings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InteractionMatrix {
    rows: BTreeMap<UserId, BTreeSet<ListingId>>,
}

impl InteractionMatrix {
    /// Interactions on inactive listings are dropped and repeated pairs
    /// collapse to a single entry.
    pub fn build(interactions: &[Interaction], domain: &ListingDomain) -> Self {
        let mut rows: BTreeMap<UserId, BTreeSet<ListingId>> = BTreeMap::new();
        let mut dropped = 0usize;

        for interaction in interactions {
            if !domain.contains(interaction.listing_id) {
                dropped += 1;
                continue;
            }
            rows.entry(interaction.user_id)
                .or_default()
                .insert(interaction.listing_id);
        }

        if dropped > 0 {
            debug!(dropped = dropped, "Ignored interactions on inactive listings");
        }

        Self { rows }
    }

    pub fn user_count(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, user_id: UserId) -> Option<&BTreeSet<ListingId>> {
        self.rows.get(&user_id)
    }

    pub fn rows(&self) -> impl Iterator<Item = (UserId, &BTreeSet<ListingId>)> {
        self.rows.iter().map(|(user, row)| (*user, row))
    }

    pub fn has_interaction(&self, user_id: UserId, listing_id: ListingId) -> bool {
        self.row(user_id)
            .map(|row| row.contains(&listing_id))
            .unwrap_or(false)
    }
}

/// Cosine similarity of two binary rows: |a ∩ b| / sqrt(|a| × |b|)
pub fn row_similarity(a: &BTreeSet<ListingId>, b: &BTreeSet<ListingId>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count() as f64;
    shared / ((a.len() as f64) * (b.len() as f64)).sqrt()
}

#[derive(Debug, Clone, Copy)]
pub struct NeighborhoodScorer {
    k_neighbors: usize,
}

impl Default for NeighborhoodScorer {
    fn default() -> Self {
        Self { k_neighbors: 10 }
    }
}

impl NeighborhoodScorer {
    pub fn new(k_neighbors: usize) -> Self {
        Self { k_neighbors }
    }

    /// Up to k other users ordered by similarity (desc), then user id (asc)
    pub fn nearest_neighbors(&self, matrix: &InteractionMatrix, user_id: UserId) -> Vec<(UserId, f64)> {
        let Some(target) = matrix.row(user_id) else {
            return Vec::new();
        };

        let mut neighbors: Vec<(UserId, f64)> = matrix
            .rows()
            .filter(|(other, _)| *other != user_id)
            .map(|(other, row)| (other, row_similarity(target, row)))
            .collect();

        neighbors.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        neighbors.truncate(self.k_neighbors);
        neighbors
    }

    /// Predicted interest per active listing. Users without saved listings,
    /// or a matrix with no one to compare against, get all zeros.
    pub fn score(&self, matrix: &InteractionMatrix, user_id: UserId, domain: &ListingDomain) -> ScoreVector {
        if matrix.row(user_id).is_none() || matrix.user_count() < 2 {
            debug!(
                user_id = user_id,
                users = matrix.user_count(),
                "Collaborative cold start, returning zero scores"
            );
            return ScoreVector::zeros(domain);
        }

        let neighbors = self.nearest_neighbors(matrix, user_id);
        if neighbors.is_empty() {
            return ScoreVector::zeros(domain);
        }

        let similarity_sum: f64 = neighbors.iter().map(|(_, sim)| sim).sum();
        let mut totals: HashMap<ListingId, f64> = HashMap::new();

        for (neighbor, similarity) in &neighbors {
            let Some(row) = matrix.row(*neighbor) else {
                continue;
            };
            let contribution = if similarity_sum > 0.0 { *similarity } else { 1.0 };
            for listing_id in row {
                *totals.entry(*listing_id).or_insert(0.0) += contribution;
            }
        }

        let denominator = if similarity_sum > 0.0 {
            similarity_sum
        } else {
            neighbors.len() as f64
        };

        ScoreVector::from_scores(
            domain,
            totals
                .into_iter()
                .map(|(listing_id, total)| (listing_id, total / denominator)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn saved(pairs: &[(UserId, ListingId)]) -> Vec<Interaction> {
        pairs.iter().map(|(u, l)| Interaction::new(*u, *l)).collect()
    }

    const USER_A: UserId = 1;
    const USER_B: UserId = 2;
    const USER_C: UserId = 3;

    #[test]
    fn test_matrix_drops_inactive_and_collapses_duplicates() {
        let domain = ListingDomain::new([7, 8]);
        let matrix = InteractionMatrix::build(&saved(&[(1, 7), (1, 7), (1, 99), (2, 99)]), &domain);
        assert_eq!(matrix.user_count(), 1);
        assert_eq!(matrix.row(1).map(|r| r.len()), Some(1));
        assert!(matrix.has_interaction(1, 7));
        assert!(!matrix.has_interaction(2, 99));
    }

    #[test]
    fn test_row_similarity() {
        let a: BTreeSet<ListingId> = [1, 2].into_iter().collect();
        let b: BTreeSet<ListingId> = [2, 3].into_iter().collect();
        assert!((row_similarity(&a, &b) - 0.5).abs() < 1e-12);
        assert_eq!(row_similarity(&a, &BTreeSet::new()), 0.0);
    }

    #[test]
    fn test_user_without_saves_gets_zero_scores() {
        let domain = ListingDomain::new([7, 8]);
        let matrix = InteractionMatrix::build(&saved(&[(USER_A, 7), (USER_B, 7)]), &domain);
        let scores = NeighborhoodScorer::default().score(&matrix, USER_C, &domain);
        assert!(scores.is_all_zero());
    }

    #[test]
    fn test_shared_save_predicts_full_agreement() {
        let domain = ListingDomain::new([7, 8]);
        let matrix = InteractionMatrix::build(&saved(&[(USER_A, 7), (USER_B, 7)]), &domain);
        let scores = NeighborhoodScorer::default().score(&matrix, USER_A, &domain);
        assert!((scores.get(7) - 1.0).abs() < 1e-9);
        assert_eq!(scores.get(8), 0.0);
    }

    #[test]
    fn test_single_user_matrix_is_cold_start() {
        let domain = ListingDomain::new([7]);
        let matrix = InteractionMatrix::build(&saved(&[(USER_A, 7)]), &domain);
        assert!(NeighborhoodScorer::default()
            .score(&matrix, USER_A, &domain)
            .is_all_zero());
    }

    #[test]
    fn test_orthogonal_neighbors_fall_back_to_mean() {
        let domain = ListingDomain::new([1, 2, 3]);
        let matrix = InteractionMatrix::build(&saved(&[(USER_A, 1), (USER_B, 2), (USER_C, 2), (USER_C, 3)]), &domain);
        let scores = NeighborhoodScorer::default().score(&matrix, USER_A, &domain);
        assert!((scores.get(2) - 1.0).abs() < 1e-12);
        assert!((scores.get(3) - 0.5).abs() < 1e-12);
        assert_eq!(scores.get(1), 0.0);
    }

    #[test]
    fn test_nearest_neighbors_ordering_and_k() {
        let domain = ListingDomain::new([1, 2, 3]);
        let matrix = InteractionMatrix::build(
            &saved(&[(1, 1), (1, 2), (4, 1), (4, 2), (2, 1), (3, 1), (5, 3)]),
            &domain,
        );
        let neighbors = NeighborhoodScorer::new(3).nearest_neighbors(&matrix, 1);
        let ids: Vec<UserId> = neighbors.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![4, 2, 3]);
        assert!(neighbors.iter().all(|(id, _)| *id != 1));
    }

    #[test]
    fn test_scores_stay_in_unit_interval() {
        let domain = ListingDomain::new([1, 2, 3, 4]);
        let matrix = InteractionMatrix::build(
            &saved(&[(1, 1), (1, 2), (2, 1), (2, 3), (3, 2), (3, 4), (4, 1), (4, 2), (4, 3)]),
            &domain,
        );
        let scores = NeighborhoodScorer::default().score(&matrix, 1, &domain);
        assert!(scores.values().iter().all(|v| (0.0..=1.0 + 1e-12).contains(v)));
    }
}
