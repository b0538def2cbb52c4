// src/collect/providers/regional.rs
//! Regional news open-API adapter (Naver-style search endpoint).
//!
//! The endpoint returns loosely-dated items for a keyword query; this adapter
//! applies the provider-side filters (exact date match, minimum body length)
//! before anything reaches the validator.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use metrics::{counter, histogram};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::collect::providers::host_of;
use crate::collect::types::{Candidate, Category, SourceProvider};
use crate::error::SourceError;

const PROVIDER: &str = "regional";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    description: Option<String>,
    #[serde(rename = "originallink")]
    original_link: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

fn parse_rfc2822_date(raw: &str) -> Option<NaiveDate> {
    DateTime::parse_from_rfc2822(raw).ok().map(|dt| dt.date_naive())
}

pub struct RegionalNewsProvider {
    mode: Mode,
    queries: BTreeMap<Category, String>,
    min_body_chars: usize,
}

enum Mode {
    Fixture(String),
    Http {
        client: reqwest::Client,
        endpoint: String,
        client_id: String,
        client_secret: String,
    },
}

impl RegionalNewsProvider {
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

    pub fn from_credentials(
        endpoint: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
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
                client_id: client_id.into(),
                client_secret: client_secret.into(),
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
            serde_json::from_str(payload).context("parsing regional news response")?;

        let mut out = Vec::new();
        for item in resp.items {
            if out.len() >= limit {
                break;
            }
            let title = item.title.unwrap_or_default();
            let body = item.description.unwrap_or_default();
            if title.is_empty() || body.chars().count() < self.min_body_chars {
                continue;
            }
            // Only items published on the requested day survive.
            let published = match item.pub_date.as_deref().and_then(parse_rfc2822_date) {
                Some(d) if d == date => d,
                _ => continue,
            };
            let canonical_link = item.original_link.or(item.link);
            let source_media = canonical_link
                .as_deref()
                .and_then(host_of)
                .unwrap_or_else(|| PROVIDER.to_string());

            out.push(Candidate {
                title,
                body,
                source_country: "KR".to_string(),
                source_media,
                category: category.as_str().to_string(),
                topic_category: None,
                published_date: published,
                canonical_link,
            });
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("collect_provider_parse_ms", "provider" => PROVIDER).record(ms);
        counter!("collect_candidates_total", "provider" => PROVIDER).increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl SourceProvider for RegionalNewsProvider {
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
                client_id,
                client_secret,
            } => {
                let resp = client
                    .get(endpoint)
                    .query(&[
                        ("query", self.query_for(category).as_str()),
                        ("display", &limit.to_string()),
                        ("sort", "date"),
                    ])
                    .header("X-Client-Id", client_id)
                    .header("X-Client-Secret", client_secret)
                    .send()
                    .await
                    .map_err(|e| SourceError::Other(anyhow!(e).context("regional http get")))?;

                if resp.status().as_u16() == 429 {
                    return Err(SourceError::RateLimited { provider: PROVIDER });
                }
                if !resp.status().is_success() {
                    return Err(SourceError::Other(anyhow!(
                        "regional endpoint returned {}",
                        resp.status()
                    )));
                }
                let body = resp
                    .text()
                    .await
                    .map_err(|e| SourceError::Other(anyhow!(e).context("regional .text()")))?;
                self.parse_items(&body, date, category, limit)
                    .map_err(SourceError::Other)
            }
        }
    }

    fn name(&self) -> &'static str {
        PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn fixture() -> String {
        serde_json::json!({
            "items": [
                {
                    "title": "코스피 사흘 연속 상승 마감",
                    "description": "코스피가 외국인 순매수에 힘입어 사흘 연속 올랐다. 전문가들은 반도체 업황 개선 기대가 지수를 끌어올렸다고 분석했다.",
                    "originallink": "https://news.example.com/kospi/1",
                    "link": "https://portal.example.com/read/1",
                    "pubDate": "Sat, 01 Mar 2025 09:30:00 +0900"
                },
                {
                    "title": "어제 뉴스",
                    "description": "하루 지난 기사 본문이다. 날짜 필터에 걸려 제외되어야 하는 기사이며 길이는 충분히 길게 작성되어 있다.",
                    "originallink": "https://news.example.com/old/2",
                    "pubDate": "Fri, 28 Feb 2025 18:00:00 +0900"
                },
                {
                    "title": "본문이 짧은 기사",
                    "description": "너무 짧다",
                    "originallink": "https://news.example.com/short/3",
                    "pubDate": "Sat, 01 Mar 2025 10:00:00 +0900"
                }
            ]
        })
        .to_string()
    }

    #[tokio::test]
    async fn filters_by_date_and_length() {
        let provider = RegionalNewsProvider::from_fixture_str(&fixture(), BTreeMap::new(), 30);
        let out = provider
            .fetch(day("2025-03-01"), Category::Domestic, 10)
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source_media, "news.example.com");
        assert_eq!(
            out[0].canonical_link.as_deref(),
            Some("https://news.example.com/kospi/1")
        );
        assert_eq!(out[0].published_date, day("2025-03-01"));
    }

    #[tokio::test]
    async fn respects_limit() {
        let provider = RegionalNewsProvider::from_fixture_str(&fixture(), BTreeMap::new(), 30);
        let out = provider
            .fetch(day("2025-03-01"), Category::Domestic, 0)
            .await
            .unwrap();
        assert!(out.is_empty());
    }
}
