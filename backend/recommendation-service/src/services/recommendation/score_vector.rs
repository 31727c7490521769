//! Score containers with an explicit listing-id domain.
//!
//! Every arithmetic operation between two vectors requires the same
//! domain; vectors are reindexed onto the active listing set first.

use crate::error::{AppError, Result};
use crate::models::ListingId;
use std::sync::Arc;

/// Sorted, duplicate-free set of listing ids shared by score vectors
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListingDomain {
    ids: Arc<[ListingId]>,
}

impl ListingDomain {
    pub fn new(ids: impl IntoIterator<Item = ListingId>) -> Self {
        let mut ids: Vec<ListingId> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        Self { ids: ids.into() }
    }

    pub fn ids(&self) -> &[ListingId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn position(&self, id: ListingId) -> Option<usize> {
        self.ids.binary_search(&id).ok()
    }

    pub fn contains(&self, id: ListingId) -> bool {
        self.position(id).is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreVector {
    domain: ListingDomain,
    values: Vec<f64>,
}

impl ScoreVector {
    pub fn zeros(domain: &ListingDomain) -> Self {
        Self {
            domain: domain.clone(),
            values: vec![0.0; domain.len()],
        }
    }

    /// Build over `domain` from sparse scores. Ids outside the domain are
    /// dropped, missing ids score 0.0 and non-finite scores become 0.0.
    pub fn from_scores(
        domain: &ListingDomain,
        scores: impl IntoIterator<Item = (ListingId, f64)>,
    ) -> Self {
        let mut vector = Self::zeros(domain);
        for (id, score) in scores {
            if let Some(idx) = domain.position(id) {
                vector.values[idx] = if score.is_finite() { score } else { 0.0 };
            }
        }
        vector
    }

    pub fn domain(&self) -> &ListingDomain {
        &self.domain
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, id: ListingId) -> f64 {
        self.domain
            .position(id)
            .map(|idx| self.values[idx])
            .unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ListingId, f64)> + '_ {
        self.domain.ids().iter().copied().zip(self.values.iter().copied())
    }

    pub fn is_all_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    /// Project onto another domain, filling unknown ids with 0.0
    pub fn reindex(&self, domain: &ListingDomain) -> Self {
        if &self.domain == domain {
            return self.clone();
        }
        Self::from_scores(domain, self.iter())
    }

    pub fn map(&self, f: impl Fn(ListingId, f64) -> f64) -> Self {
        Self {
            domain: self.domain.clone(),
            values: self.iter().map(|(id, v)| f(id, v)).collect(),
        }
    }

    /// Element-wise combination; both vectors must share a domain
    pub fn combine(&self, other: &Self, f: impl Fn(f64, f64) -> f64) -> Result<Self> {
        if self.domain != other.domain {
            return Err(AppError::Internal(format!(
                "score vector domains differ ({} vs {} listings)",
                self.domain.len(),
                other.domain.len()
            )));
        }

        Ok(Self {
            domain: self.domain.clone(),
            values: self
                .values
                .iter()
                .zip(other.values.iter())
                .map(|(a, b)| f(*a, *b))
                .collect(),
        })
    }

    /// Min-max scale to [0, 1].
    ///
    /// All-zero stays all-zero; a constant non-zero vector maps to 0.5.
    pub fn min_max_normalized(&self) -> Self {
        if self.is_empty() || self.is_all_zero() {
            return self.clone();
        }

        let (min, max) = self
            .values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(*v), hi.max(*v))
            });

        let values = if max == min {
            vec![0.5; self.values.len()]
        } else {
            let range = max - min;
            self.values
                .iter()
                .map(|v| ((v - min) / range).clamp(0.0, 1.0))
                .collect()
        };

        Self {
            domain: self.domain.clone(),
            values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain() -> ListingDomain {
        ListingDomain::new([3, 1, 2, 3])
    }

    #[test]
    fn test_domain_sorted_and_deduplicated() {
        assert_eq!(domain().ids(), &[1, 2, 3]);
        assert!(domain().contains(2));
        assert!(!domain().contains(9));
    }

    #[test]
    fn test_from_scores_fills_missing_and_drops_unknown() {
        let v = ScoreVector::from_scores(&domain(), [(2, 0.4), (99, 1.0), (3, f64::NAN)]);
        assert_eq!(v.values(), &[0.0, 0.4, 0.0]);
        assert_eq!(v.get(99), 0.0);
    }

    #[test]
    fn test_reindex_onto_larger_domain() {
        let small = ScoreVector::from_scores(&ListingDomain::new([1, 2]), [(1, 0.3), (2, 0.6)]);
        let v = small.reindex(&ListingDomain::new([1, 2, 5]));
        assert_eq!(v.values(), &[0.3, 0.6, 0.0]);
    }

    #[test]
    fn test_combine_rejects_mismatched_domains() {
        let a = ScoreVector::zeros(&ListingDomain::new([1, 2]));
        let b = ScoreVector::zeros(&ListingDomain::new([1, 3]));
        assert!(a.combine(&b, |x, y| x + y).is_err());
    }

    #[test]
    fn test_normalize_min_max() {
        let v = ScoreVector::from_scores(&domain(), [(1, 0.2), (2, 0.6), (3, 1.0)]);
        let n = v.min_max_normalized();
        assert!((n.get(1) - 0.0).abs() < 1e-12);
        assert!((n.get(2) - 0.5).abs() < 1e-12);
        assert!((n.get(3) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_constant_positive_is_neutral() {
        let v = ScoreVector::from_scores(&domain(), [(1, 0.7), (2, 0.7), (3, 0.7)]);
        assert_eq!(v.min_max_normalized().values(), &[0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_normalize_tiny_spread_is_not_constant() {
        let v = ScoreVector::from_scores(&domain(), [(1, 1e-17)]);
        assert_eq!(v.min_max_normalized().values(), &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_normalize_all_zero_stays_zero() {
        let v = ScoreVector::zeros(&domain());
        assert!(v.min_max_normalized().is_all_zero());
    }
}
