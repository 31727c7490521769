// ============================================
// Content-Based Scoring
// ============================================
//
// TF-IDF over the active listing corpus, refit on every run.
//
// Data Flow:
//   Listings (title + description + skills + domain) → TF-IDF Vectorization
//   Profile keywords → pseudo-document → same vocabulary (no refit)
//   Query · Listing (both L2-normalized) → Content Similarity Score

use super::score_vector::{ListingDomain, ScoreVector};
use super::stop_words::is_stop_word;
use crate::models::ListingCorpus;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Words of two or more word characters
static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\w\w+\b").expect("token pattern is valid"));

/// Lowercased tokens with stop words removed
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN_PATTERN
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|token| !is_stop_word(token))
        .map(str::to_string)
        .collect()
}

/// Term index → weight, sorted by term index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    entries: Vec<(usize, f64)>,
}

impl SparseVector {
    pub fn is_zero(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(usize, f64)] {
        &self.entries
    }

    pub fn dot(&self, other: &Self) -> f64 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;
        while i < self.entries.len() && j < other.entries.len() {
            let (a_idx, a_val) = self.entries[i];
            let (b_idx, b_val) = other.entries[j];
            match a_idx.cmp(&b_idx) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += a_val * b_val;
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }
}

/// Fitted vector space: sorted vocabulary with smoothed idf
/// (`ln((1 + n) / (1 + df)) + 1`), raw term counts, L2 normalization.
#[derive(Debug, Clone, Default)]
pub struct TfidfIndex {
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
    documents: Vec<SparseVector>,
}

impl TfidfIndex {
    pub fn fit<S: AsRef<str>>(documents: &[S]) -> Self {
        let tokenized: Vec<Vec<String>> = documents.iter().map(|d| tokenize(d.as_ref())).collect();

        let terms: BTreeSet<&str> = tokenized
            .iter()
            .flat_map(|tokens| tokens.iter().map(String::as_str))
            .collect();
        let vocabulary: BTreeMap<String, usize> = terms
            .into_iter()
            .enumerate()
            .map(|(idx, term)| (term.to_string(), idx))
            .collect();

        let mut document_frequency = vec![0usize; vocabulary.len()];
        for tokens in &tokenized {
            let unique: BTreeSet<usize> = tokens
                .iter()
                .filter_map(|t| vocabulary.get(t).copied())
                .collect();
            for idx in unique {
                document_frequency[idx] += 1;
            }
        }

        let n = documents.len() as f64;
        let idf = document_frequency
            .iter()
            .map(|df| ((1.0 + n) / (1.0 + *df as f64)).ln() + 1.0)
            .collect();

        let mut index = Self {
            vocabulary,
            idf,
            documents: Vec::new(),
        };
        index.documents = tokenized.iter().map(|tokens| index.weigh(tokens)).collect();
        index
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn document(&self, position: usize) -> Option<&SparseVector> {
        self.documents.get(position)
    }

    /// Embed text into the fitted space; unknown terms are ignored
    pub fn transform(&self, text: &str) -> SparseVector {
        self.weigh(&tokenize(text))
    }

    fn weigh(&self, tokens: &[String]) -> SparseVector {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for token in tokens {
            if let Some(idx) = self.vocabulary.get(token) {
                *counts.entry(*idx).or_insert(0.0) += 1.0;
            }
        }

        let mut entries: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(idx, tf)| (idx, tf * self.idf[idx]))
            .collect();

        let norm = entries.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm == 0.0 {
            return SparseVector::default();
        }
        for (_, w) in entries.iter_mut() {
            *w /= norm;
        }

        SparseVector { entries }
    }
}

/// Content similarity between a keyword profile and every active listing
pub struct TextCorpusIndex;

impl TextCorpusIndex {
    /// Cosine similarity in [0, 1] per listing. Empty keywords, an empty
    /// vocabulary or a query with no known terms give all zeros.
    pub fn score(corpus: &ListingCorpus, keywords: &[String], domain: &ListingDomain) -> ScoreVector {
        if keywords.is_empty() || corpus.is_empty() {
            return ScoreVector::zeros(domain);
        }

        let documents: Vec<String> = corpus.iter().map(|l| l.document()).collect();
        let index = TfidfIndex::fit(&documents);
        if index.vocabulary_len() == 0 {
            debug!("Listing corpus has no indexable terms");
            return ScoreVector::zeros(domain);
        }

        let query = index.transform(&keywords.join(" "));
        if query.is_zero() {
            debug!(keywords = keywords.len(), "No profile keyword matches the corpus vocabulary");
            return ScoreVector::zeros(domain);
        }

        let scores = corpus.iter().enumerate().map(|(position, listing)| {
            let similarity = index
                .document(position)
                .map(|doc| doc.dot(&query))
                .unwrap_or(0.0);
            (listing.id, similarity.clamp(0.0, 1.0))
        });

        ScoreVector::from_scores(domain, scores)
    }
}
