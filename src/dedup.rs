// src/dedup.rs
//! Two-stage deduplication: exact canonical-link lookup, then fuzzy token-set
//! similarity against a trailing window of persisted articles.
//!
//! The window snapshot is taken once per run and is read-only for the run's
//! duration. Malformed links are not an error: they simply fall through to
//! the fuzzy check.

use chrono::{Days, NaiveDate};
use serde::Serialize;
use std::collections::HashSet;

use crate::collect::types::NormalizedItem;
use crate::error::StoreError;
use crate::store::ArticleStore;

/// Title similarity at or above this level floors the combined score at the
/// duplicate threshold: near-identical titles are duplicates regardless of
/// how much the bodies drifted.
const TITLE_FLOOR_MIN: f64 = 0.90;
const TITLE_FLOOR_BASE: f64 = 0.85;

/// Outcome of a duplicate check for one item.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DedupDecision {
    pub is_duplicate: bool,
    pub matched_id: Option<i64>,
    pub similarity: Option<f64>,
}

impl DedupDecision {
    pub fn unique(similarity: Option<f64>) -> Self {
        Self {
            is_duplicate: false,
            matched_id: None,
            similarity,
        }
    }

    fn duplicate(matched_id: i64, similarity: Option<f64>) -> Self {
        Self {
            is_duplicate: true,
            matched_id: Some(matched_id),
            similarity,
        }
    }
}

/// Lowercased word tokens, split on anything non-alphanumeric. Hangul is
/// alphabetic, so Korean text tokenizes by whitespace/punctuation as well.
pub fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Token-set Jaccard: |intersection| / |union|. Two empty sets are identical
/// (1.0); exactly one empty set shares nothing (0.0).
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Weighted combination: 50% title, 50% body, with the near-identical-title
/// floor applied. Capped at 1.0.
pub fn combined_similarity(
    title_a: &HashSet<String>,
    title_b: &HashSet<String>,
    body_a: &HashSet<String>,
    body_b: &HashSet<String>,
) -> f64 {
    let title_sim = jaccard(title_a, title_b);
    let body_sim = jaccard(body_a, body_b);
    let mut sim = 0.5 * title_sim + 0.5 * body_sim;
    if title_sim >= TITLE_FLOOR_MIN {
        sim = sim.max(TITLE_FLOOR_BASE + (title_sim - TITLE_FLOOR_MIN) * 0.2);
    }
    sim.min(1.0)
}

fn is_wellformed_absolute(link: &str) -> bool {
    match reqwest::Url::parse(link) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.has_host(),
        Err(_) => false,
    }
}

struct RecentEntry {
    id: i64,
    title_tokens: HashSet<String>,
    body_tokens: HashSet<String>,
}

/// Per-run dedup engine. Holds the tokenized trailing-window snapshot and a
/// handle to the store for exact-link lookups.
pub struct DedupEngine<'a> {
    store: &'a dyn ArticleStore,
    recent: Vec<RecentEntry>,
    threshold: f64,
}

impl<'a> DedupEngine<'a> {
    /// Snapshot the trailing `window_days` of persisted articles.
    pub async fn load(
        store: &'a dyn ArticleStore,
        reference: NaiveDate,
        window_days: u64,
        threshold: f64,
    ) -> Result<DedupEngine<'a>, StoreError> {
        let since = reference
            .checked_sub_days(Days::new(window_days))
            .unwrap_or(reference);
        let recent = store
            .find_recent_for_similarity(since)
            .await?
            .into_iter()
            .map(|a| RecentEntry {
                id: a.id,
                title_tokens: tokenize(&a.title),
                body_tokens: tokenize(&a.body),
            })
            .collect();
        Ok(DedupEngine {
            store,
            recent,
            threshold,
        })
    }

    pub fn window_len(&self) -> usize {
        self.recent.len()
    }

    /// Exact-link check first; a hit short-circuits before any fuzzy work.
    pub async fn check(&self, item: &NormalizedItem) -> Result<DedupDecision, StoreError> {
        if let Some(link) = item.canonical_link.as_deref() {
            if is_wellformed_absolute(link) {
                if let Some(id) = self.store.find_by_canonical_link(link).await? {
                    return Ok(DedupDecision::duplicate(id, None));
                }
            }
        }

        let title_tokens = tokenize(&item.title);
        let body_tokens = tokenize(item.effective_body());

        let mut best: Option<(i64, f64)> = None;
        for entry in &self.recent {
            let sim = combined_similarity(
                &title_tokens,
                &entry.title_tokens,
                &body_tokens,
                &entry.body_tokens,
            );
            if best.map_or(true, |(_, s)| sim > s) {
                best = Some((entry.id, sim));
            }
        }

        match best {
            Some((id, sim)) if sim >= self.threshold => Ok(DedupDecision::duplicate(id, Some(sim))),
            Some((_, sim)) => Ok(DedupDecision::unique(Some(sim))),
            None => Ok(DedupDecision::unique(None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jaccard_identity_and_empty_cases() {
        let t = tokenize("경제 회복 신호");
        assert_eq!(jaccard(&t, &t), 1.0);
        assert_eq!(jaccard(&tokenize(""), &tokenize("")), 1.0);
        assert_eq!(jaccard(&tokenize("a b"), &tokenize("")), 0.0);
    }

    #[test]
    fn tokenizer_splits_punctuation_and_lowercases() {
        let t = tokenize("Base, Rate! held-steady");
        assert!(t.contains("base"));
        assert!(t.contains("rate"));
        assert!(t.contains("held"));
        assert!(t.contains("steady"));
        assert_eq!(t.len(), 4);
    }

    #[test]
    fn identical_titles_floor_the_combined_score() {
        let title = tokenize("같은 제목의 기사");
        let body_a = tokenize("완전히 다른 본문 내용이다");
        let body_b = tokenize("역시 전혀 겹치지 않는 문장");
        let sim = combined_similarity(&title, &title, &body_a, &body_b);
        // title sim 1.0 -> floor = 0.85 + 0.1*0.2 = 0.87
        assert!(sim >= 0.85, "sim was {sim}");
        assert!(sim <= 1.0);
    }

    #[test]
    fn dissimilar_titles_stay_below_threshold() {
        let sim = combined_similarity(
            &tokenize("주식 시장 마감 시황"),
            &tokenize("봄철 날씨 전망"),
            &tokenize("코스피는 소폭 올랐다"),
            &tokenize("주말에는 비가 온다"),
        );
        assert!(sim < 0.85);
    }

    #[test]
    fn malformed_links_are_not_wellformed() {
        assert!(is_wellformed_absolute("https://news.example.com/a/1"));
        assert!(!is_wellformed_absolute("/a/1"));
        assert!(!is_wellformed_absolute("not a url"));
        assert!(!is_wellformed_absolute("ftp://example.com/x"));
    }
}
