use crate::error::AppError;
use crate::metrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::warn;

pub type UserId = i32;
pub type ListingId = i32;

/// Active internship listing as read from the listing store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Listing {
    pub id: ListingId,
    pub title: String,
    pub company: Option<String>,
    pub location: Option<String>,
    pub country: Option<String>,
    pub platform: Option<String>,
    pub description: Option<String>,
    pub skills: Option<String>,
    pub domain: Option<String>,
    pub link: Option<String>,
}

impl Listing {
    /// Text indexed for content similarity: title, description, skills, domain.
    pub fn document(&self) -> String {
        [
            Some(self.title.as_str()),
            self.description.as_deref(),
            self.skills.as_deref(),
            self.domain.as_deref(),
        ]
        .iter()
        .map(|field| field.unwrap_or(""))
        .collect::<Vec<_>>()
        .join(" ")
    }
}

/// Active listings for one run, unique by id and in fetch order
#[derive(Debug, Clone, Default)]
pub struct ListingCorpus {
    listings: Vec<Listing>,
    index: HashMap<ListingId, usize>,
}

impl ListingCorpus {
    /// Repeated ids keep their first occurrence.
    pub fn from_listings(listings: Vec<Listing>) -> Self {
        let mut corpus = Self {
            listings: Vec::with_capacity(listings.len()),
            index: HashMap::with_capacity(listings.len()),
        };

        for listing in listings {
            if corpus.index.contains_key(&listing.id) {
                warn!(listing_id = listing.id, "Duplicate listing id in corpus, keeping first");
                metrics::record_input_fallback("duplicate_listing");
                continue;
            }
            corpus.index.insert(listing.id, corpus.listings.len());
            corpus.listings.push(listing);
        }

        corpus
    }

    pub fn get(&self, id: ListingId) -> Option<&Listing> {
        self.index.get(&id).map(|idx| &self.listings[*idx])
    }

    pub fn ids(&self) -> impl Iterator<Item = ListingId> + '_ {
        self.listings.iter().map(|l| l.id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Listing> {
        self.listings.iter()
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }
}

/// Profile row as stored: keywords are JSONB and may hold either a list
/// or a JSON-encoded string of a list.
#[derive(Debug, Clone, Default, PartialEq, sqlx::FromRow)]
pub struct RawUserProfile {
    pub user_id: UserId,
    pub keywords: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, sqlx::FromRow)]
pub struct RawUserPreferences {
    pub country_weights: Option<Value>,
    pub platform_weights: Option<Value>,
}

/// Multiplicative weights by country / platform. Unlisted keys weigh 1.0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPreferences {
    pub country_weights: HashMap<String, f64>,
    pub platform_weights: HashMap<String, f64>,
}

impl UserPreferences {
    pub fn from_raw(user_id: UserId, raw: Option<RawUserPreferences>) -> Self {
        let Some(raw) = raw else {
            return Self::default();
        };

        Self {
            country_weights: parse_weight_map(user_id, "country_weights", raw.country_weights),
            platform_weights: parse_weight_map(user_id, "platform_weights", raw.platform_weights),
        }
    }

    pub fn country_weight(&self, country: Option<&str>) -> f64 {
        country
            .and_then(|c| self.country_weights.get(c))
            .copied()
            .unwrap_or(1.0)
    }

    pub fn platform_weight(&self, platform: Option<&str>) -> f64 {
        platform
            .and_then(|p| self.platform_weights.get(p))
            .copied()
            .unwrap_or(1.0)
    }
}

/// Implicit positive signal: the user saved the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, sqlx::FromRow)]
pub struct Interaction {
    pub user_id: UserId,
    pub listing_id: ListingId,
}

impl Interaction {
    pub fn new(user_id: UserId, listing_id: ListingId) -> Self {
        Self {
            user_id,
            listing_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRecord {
    pub user_id: UserId,
    pub listing_id: ListingId,
    pub similarity_score: f64,
    pub recommended_at: DateTime<Utc>,
    pub is_viewed: bool,
    pub is_saved: bool,
}

impl RecommendationRecord {
    pub fn new(
        user_id: UserId,
        listing_id: ListingId,
        similarity_score: f64,
        recommended_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            listing_id,
            similarity_score,
            recommended_at,
            is_viewed: false,
            is_saved: false,
        }
    }
}

/// Listing detail joined with the recommendation state, ready for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RecommendationView {
    pub id: ListingId,
    pub title: String,
    pub company: String,
    pub location: String,
    pub country: String,
    pub platform: String,
    pub description: String,
    pub skills: String,
    pub domain: String,
    pub link: String,
    pub similarity_score: f64,
    pub recommended_at: DateTime<Utc>,
    pub is_viewed: bool,
    pub is_saved: bool,
}

impl RecommendationView {
    pub fn from_listing(listing: &Listing, record: &RecommendationRecord) -> Self {
        let text = |field: &Option<String>| field.clone().unwrap_or_default();
        Self {
            id: listing.id,
            title: listing.title.clone(),
            company: text(&listing.company),
            location: text(&listing.location),
            country: text(&listing.country),
            platform: text(&listing.platform),
            description: text(&listing.description),
            skills: text(&listing.skills),
            domain: text(&listing.domain),
            link: text(&listing.link),
            similarity_score: record.similarity_score,
            recommended_at: record.recommended_at,
            is_viewed: record.is_viewed,
            is_saved: record.is_saved,
        }
    }
}

/// What happens to `is_viewed` / `is_saved` when a ranking overwrites an
/// existing recommendation record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementPolicy {
    #[default]
    Reset,
    Preserve,
}

impl EngagementPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reset => "reset",
            Self::Preserve => "preserve",
        }
    }
}

impl FromStr for EngagementPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reset" => Ok(Self::Reset),
            "preserve" => Ok(Self::Preserve),
            other => Err(AppError::InvalidParameter(format!(
                "unknown engagement policy: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for EngagementPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalize stored keywords into a list of strings.
///
/// Accepts a JSON array of strings or a string holding such an array.
/// Anything else (invalid JSON, non-array, non-string elements) yields an
/// empty list. Blank entries are dropped.
pub fn normalize_keywords(user_id: UserId, raw: Option<&Value>) -> Vec<String> {
    let raw = match raw {
        None | Some(Value::Null) => {
            warn!(user_id = user_id, "Profile keywords missing");
            metrics::record_input_fallback("missing_keywords");
            return Vec::new();
        }
        Some(raw) => raw,
    };

    match decode_keywords(raw) {
        Ok(keywords) => keywords,
        Err(e) => {
            warn!(
                user_id = user_id,
                error = %e,
                error_kind = e.kind(),
                "Discarding malformed profile keywords"
            );
            metrics::record_input_fallback("malformed_keywords");
            Vec::new()
        }
    }
}

fn decode_keywords(raw: &Value) -> Result<Vec<String>, AppError> {
    let decoded;
    let list = match raw {
        Value::Array(items) => items,
        Value::String(encoded) => {
            decoded = serde_json::from_str::<Value>(encoded)?;
            match &decoded {
                Value::Array(items) => items,
                other => {
                    return Err(AppError::MalformedInput(format!(
                        "decoded keywords are {}, expected a list",
                        json_kind(other)
                    )))
                }
            }
        }
        other => {
            return Err(AppError::MalformedInput(format!(
                "keywords are {}, expected a list",
                json_kind(other)
            )))
        }
    };

    list.iter()
        .filter_map(|item| match item {
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(Ok(s.trim().to_string())),
            other => Some(Err(AppError::MalformedInput(format!(
                "keyword list contains {}",
                json_kind(other)
            )))),
        })
        .collect()
}

/// Parse a `{ key: weight }` map. A JSON-encoded string of an object is
/// accepted too. Negative or non-numeric weights are dropped so the key
/// falls back to 1.0; a value that is not an object yields an empty map.
pub fn parse_weight_map(user_id: UserId, field: &str, raw: Option<Value>) -> HashMap<String, f64> {
    let object = match raw {
        None | Some(Value::Null) => return HashMap::new(),
        Some(raw) => match decode_weight_object(raw) {
            Ok(object) => object,
            Err(e) => {
                warn!(
                    user_id = user_id,
                    field = field,
                    error = %e,
                    error_kind = e.kind(),
                    "Discarding malformed preference weights"
                );
                metrics::record_input_fallback("malformed_weights");
                return HashMap::new();
            }
        },
    };

    let mut weights = HashMap::with_capacity(object.len());
    for (key, value) in object {
        match value.as_f64() {
            Some(weight) if weight.is_finite() && weight >= 0.0 => {
                weights.insert(key, weight);
            }
            _ => {
                warn!(
                    user_id = user_id,
                    field = field,
                    key = %key,
                    "Ignoring invalid preference weight"
                );
                metrics::record_input_fallback("malformed_weights");
            }
        }
    }

    weights
}

fn decode_weight_object(raw: Value) -> Result<Map<String, Value>, AppError> {
    let value = match raw {
        Value::String(encoded) => serde_json::from_str::<Value>(&encoded)?,
        other => other,
    };

    match value {
        Value::Object(map) => Ok(map),
        other => Err(AppError::MalformedInput(format!(
            "weights are {}, expected an object",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
