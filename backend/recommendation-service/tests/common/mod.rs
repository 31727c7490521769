//! Shared fixtures: an in-memory `RecommendationStore` with the same
//! upsert and join semantics as the Postgres tables.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use recommendation_service::db::RecommendationStore;
use recommendation_service::error::Result;
use recommendation_service::models::{
    EngagementPolicy, Interaction, Listing, ListingId, RawUserPreferences, RawUserProfile,
    RecommendationRecord, RecommendationView, UserId,
};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

pub fn listing(id: ListingId, title: &str, skills: &str) -> Listing {
    Listing {
        id,
        title: title.to_string(),
        company: Some(format!("Company {}", id)),
        location: Some("Remote".to_string()),
        country: Some("France".to_string()),
        platform: Some("LinkedIn".to_string()),
        description: None,
        skills: Some(skills.to_string()),
        domain: None,
        link: Some(format!("https://jobs.example.com/{}", id)),
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    profiles: HashMap<UserId, RawUserProfile>,
    preferences: HashMap<UserId, RawUserPreferences>,
    listings: Vec<Listing>,
    records: Mutex<BTreeMap<(UserId, ListingId), RecommendationRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listing(mut self, listing: Listing) -> Self {
        self.listings.push(listing);
        self
    }

    pub fn with_keywords(mut self, user_id: UserId, keywords: Value) -> Self {
        self.profiles.insert(
            user_id,
            RawUserProfile {
                user_id,
                keywords: Some(keywords),
            },
        );
        self
    }

    pub fn with_preferences(mut self, user_id: UserId, country: Value, platform: Value) -> Self {
        self.preferences.insert(
            user_id,
            RawUserPreferences {
                country_weights: Some(country),
                platform_weights: Some(platform),
            },
        );
        self
    }

    pub fn with_saved(self, user_id: UserId, listing_id: ListingId) -> Self {
        {
            let mut records = self.records.lock().unwrap();
            let record = records
                .entry((user_id, listing_id))
                .or_insert_with(|| RecommendationRecord::new(user_id, listing_id, 0.0, Utc::now()));
            record.is_saved = true;
        }
        self
    }

    pub fn record(&self, user_id: UserId, listing_id: ListingId) -> Option<RecommendationRecord> {
        self.records.lock().unwrap().get(&(user_id, listing_id)).cloned()
    }

    pub fn record_count(&self, user_id: UserId) -> usize {
        self.records
            .lock()
            .unwrap()
            .keys()
            .filter(|(user, _)| *user == user_id)
            .count()
    }
}

#[async_trait]
impl RecommendationStore for InMemoryStore {
    async fn fetch_user_profile(&self, user_id: UserId) -> Result<Option<RawUserProfile>> {
        Ok(self.profiles.get(&user_id).cloned())
    }

    async fn fetch_user_preferences(&self, user_id: UserId) -> Result<Option<RawUserPreferences>> {
        Ok(self.preferences.get(&user_id).cloned())
    }

    async fn fetch_active_listings(&self, limit: i64) -> Result<Vec<Listing>> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self.listings.iter().take(limit).cloned().collect())
    }

    async fn fetch_saved_interactions(&self) -> Result<Vec<Interaction>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.is_saved)
            .map(|r| Interaction::new(r.user_id, r.listing_id))
            .collect())
    }

    async fn fetch_recommended_listing_ids(&self, user_id: UserId) -> Result<HashSet<ListingId>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .keys()
            .filter(|(user, _)| *user == user_id)
            .map(|(_, listing)| *listing)
            .collect())
    }

    async fn upsert_recommendation(
        &self,
        record: &RecommendationRecord,
        policy: EngagementPolicy,
    ) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        match records.get_mut(&(record.user_id, record.listing_id)) {
            Some(existing) => {
                existing.similarity_score = record.similarity_score;
                existing.recommended_at = record.recommended_at;
                if policy == EngagementPolicy::Reset {
                    existing.is_viewed = false;
                    existing.is_saved = false;
                }
            }
            None => {
                records.insert((record.user_id, record.listing_id), record.clone());
            }
        }
        Ok(())
    }

    async fn fetch_recommendations(&self, user_id: UserId, limit: i64) -> Result<Vec<RecommendationView>> {
        let records = self.records.lock().unwrap();
        let mut views: Vec<RecommendationView> = records
            .values()
            .filter(|r| r.user_id == user_id)
            .filter_map(|r| {
                self.listings
                    .iter()
                    .find(|l| l.id == r.listing_id)
                    .map(|l| RecommendationView::from_listing(l, r))
            })
            .collect();
        views.sort_by(|a, b| {
            b.similarity_score
                .total_cmp(&a.similarity_score)
                .then(a.id.cmp(&b.id))
        });
        views.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(views)
    }

    async fn mark_viewed(&self, user_id: UserId, listing_id: ListingId) -> Result<bool> {
        let mut records = self.records.lock().unwrap();
        match records.get_mut(&(user_id, listing_id)) {
            Some(record) => {
                record.is_viewed = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_saved(&self, user_id: UserId, listing_id: ListingId, saved: bool) -> Result<bool> {
        let mut records = self.records.lock().unwrap();
        match records.get_mut(&(user_id, listing_id)) {
            Some(record) => {
                record.is_saved = saved;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
