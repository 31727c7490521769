use super::score_vector::ScoreVector;
use crate::models::{ListingCorpus, ListingId, UserPreferences};

/// Scales content scores by the user's country and platform weights.
///
/// Weights may exceed 1.0, so the weighted score is clamped back to 1.0.
pub struct PreferenceWeighter<'a> {
    preferences: &'a UserPreferences,
}

impl<'a> PreferenceWeighter<'a> {
    pub fn new(preferences: &'a UserPreferences) -> Self {
        Self { preferences }
    }

    pub fn weight_for(&self, corpus: &ListingCorpus, listing_id: ListingId) -> f64 {
        corpus
            .get(listing_id)
            .map(|listing| {
                self.preferences.country_weight(listing.country.as_deref())
                    * self.preferences.platform_weight(listing.platform.as_deref())
            })
            .unwrap_or(1.0)
    }

    pub fn apply(&self, scores: &ScoreVector, corpus: &ListingCorpus) -> ScoreVector {
        scores.map(|id, score| (score * self.weight_for(corpus, id)).clamp(0.0, 1.0))
    }
}
