// src/collect/providers/search_api.rs
//! News-search API adapter (Serper-style POST endpoint).
//!
//! Search results carry either an explicit date or a relative one ("3시간
//! 전", "2 hours ago"). Relative-but-recent timestamps are attributed to the
//! requested day; anything explicitly dated elsewhere is dropped.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use metrics::{counter, histogram};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::collect::providers::host_of;
use crate::collect::types::{Candidate, Category, SourceProvider};
use crate::error::SourceError;

const PROVIDER: &str = "search_api";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    news: Vec<NewsResult>,
}

#[derive(Debug, Deserialize)]
struct NewsResult {
    title: Option<String>,
    snippet: Option<String>,
    link: Option<String>,
    date: Option<String>,
    source: Option<String>,
}

/// Explicit dates must match the requested day; same-day relative dates
/// resolve to it; anything else is `None` and the item is dropped.
fn resolve_result_date(raw: Option<&str>, requested: NaiveDate) -> Option<NaiveDate> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return (d == requested).then_some(d);
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        let d = dt.date_naive();
        return (d == requested).then_some(d);
    }
    let lowered = raw.to_lowercase();
    let relative_same_day = ["minute", "hour", "분 전", "시간 전"]
        .iter()
        .any(|marker| lowered.contains(marker));
    relative_same_day.then_some(requested)
}

pub struct SearchApiProvider {
    mode: Mode,
    queries: BTreeMap<Category, String>,
    min_body_chars: usize,
}

enum Mode {
    Fixture(String),
    Http {
        client: reqwest::Client,
        endpoint: String,
        api_key: String,
    },
}

impl SearchApiProvider {
    pub fn from_fixture_str(
        payload: &str,
        queries: BTreeMap<Category, String>,
        min_body_chars: usize,
    ) -> Self {
        Self {
            mode: Mode::Fixture(payload.to_string()),
            queries,
            min_body_chars,
        }
    }

    pub fn from_api_key(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        queries: BTreeMap<Category, String>,
        min_body_chars: usize,
    ) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("newswire-collector/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client");
        Self {
            mode: Mode::Http {
                client,
                endpoint: endpoint.into(),
                api_key: api_key.into(),
            },
            queries,
            min_body_chars,
        }
    }

    fn query_for(&self, category: Category) -> String {
        self.queries
            .get(&category)
            .cloned()
            .unwrap_or_else(|| category.as_str().to_string())
    }

    fn parse_items(
        &self,
        payload: &str,
        date: NaiveDate,
        category: Category,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        let t0 = std::time::Instant::now();
        let resp: SearchResponse =
            serde_json::from_str(payload).context("parsing search api response")?;

        let mut out = Vec::new();
        for result in resp.news {
            if out.len() >= limit {
                break;
            }
            let title = result.title.unwrap_or_default();
            let body = result.snippet.unwrap_or_default();
            if title.is_empty() || body.chars().count() < self.min_body_chars {
                continue;
            }
            let published = match resolve_result_date(result.date.as_deref(), date) {
                Some(d) => d,
                None => continue,
            };
            let source_media = result
                .source
                .filter(|s| !s.is_empty())
                .or_else(|| result.link.as_deref().and_then(host_of))
                .unwrap_or_else(|| PROVIDER.to_string());

            out.push(Candidate {
                title,
                body,
                source_country: "KR".to_string(),
                source_media,
                category: category.as_str().to_string(),
                topic_category: None,
                published_date: published,
                canonical_link: result.link,
            });
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("collect_provider_parse_ms", "provider" => PROVIDER).record(ms);
        counter!("collect_candidates_total", "provider" => PROVIDER).increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl SourceProvider for SearchApiProvider {
    async fn fetch(
        &self,
        date: NaiveDate,
        category: Category,
        limit: usize,
    ) -> Result<Vec<Candidate>, SourceError> {
        match &self.mode {
            Mode::Fixture(payload) => self
                .parse_items(payload, date, category, limit)
                .map_err(SourceError::Other),

            Mode::Http {
                client,
                endpoint,
                api_key,
            } => {
                let resp = client
                    .post(endpoint)
                    .header("X-API-KEY", api_key)
                    .json(&json!({
                        "q": self.query_for(category),
                        "gl": "kr",
                        "hl": "ko",
                        "num": limit,
                    }))
                    .send()
                    .await
                    .map_err(|e| SourceError::Other(anyhow!(e).context("search api post")))?;

                if resp.status().as_u16() == 429 {
                    return Err(SourceError::RateLimited { provider: PROVIDER });
                }
                if !resp.status().is_success() {
                    return Err(SourceError::Other(anyhow!(
                        "search endpoint returned {}",
                        resp.status()
                    )));
                }
                let body = resp
                    .text()
                    .await
                    .map_err(|e| SourceError::Other(anyhow!(e).context("search api .text()")))?;
                self.parse_items(&body, date, category, limit)
                    .map_err(SourceError::Other)
            }
        }
    }

    fn name(&self) -> &'static str {
        PROVIDER
    }
}
