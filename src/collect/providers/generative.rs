// src/collect/providers/generative.rs
//! Generative-search adapter: a chat-completions endpoint is asked for the
//! day's articles as a strict JSON array.
//!
//! This is the one source family that can invent content outright, which is
//! why the hallucination gate downstream exists. The adapter itself only
//! enforces shape: fenced output is unwrapped, malformed JSON is a provider
//! error, and the usual date/length filters apply.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::collect::types::{Candidate, Category, SourceProvider};
use crate::error::SourceError;

const PROVIDER: &str = "generative";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Article shape the model is instructed to emit.
#[derive(Debug, Deserialize)]
struct GeneratedArticle {
    title: Option<String>,
    content: Option<String>,
    #[serde(default)]
    source_media: Option<String>,
    #[serde(default)]
    source_country: Option<String>,
    #[serde(default)]
    published_date: Option<String>,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    link: Option<String>,
}

/// Strip markdown code fences from a model response.
fn strip_code_fences(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

pub struct GenerativeSearchProvider {
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
        model: String,
    },
}

impl GenerativeSearchProvider {
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
        model: Option<&str>,
        queries: BTreeMap<Category, String>,
        min_body_chars: usize,
    ) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("newswire-collector/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client");
        Self {
            mode: Mode::Http {
                client,
                endpoint: endpoint.into(),
                api_key: api_key.into(),
                model: model.unwrap_or(DEFAULT_MODEL).to_string(),
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

    fn user_prompt(&self, date: NaiveDate, category: Category, limit: usize) -> String {
        format!(
            "{} {} 기준, '{}' 주제의 실제 보도 기사 {}건을 찾아 JSON 배열로만 응답하세요. \
             각 원소: {{\"title\", \"content\", \"source_media\", \"source_country\", \
             \"published_date\" (YYYY-MM-DD), \"topic\", \"link\"}}.",
            date,
            category.as_str(),
            self.query_for(category),
            limit
        )
    }

    fn parse_articles(
        &self,
        content: &str,
        date: NaiveDate,
        category: Category,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        let t0 = std::time::Instant::now();
        let articles: Vec<GeneratedArticle> = serde_json::from_str(strip_code_fences(content))
            .context("parsing generative article array")?;

        let mut out = Vec::new();
        for article in articles {
            if out.len() >= limit {
                break;
            }
            let title = article.title.unwrap_or_default();
            let body = article.content.unwrap_or_default();
            if title.is_empty() || body.chars().count() < self.min_body_chars {
                continue;
            }
            // The model is told to date articles; anything off-day is dropped
            // here, an absent date is left for the validator to judge.
            let published = match article.published_date.as_deref() {
                Some(raw) => match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
                    Ok(d) if d == date => d,
                    _ => continue,
                },
                None => date,
            };

            out.push(Candidate {
                title,
                body,
                source_country: article.source_country.unwrap_or_else(|| "KR".to_string()),
                source_media: article.source_media.unwrap_or_default(),
                category: category.as_str().to_string(),
                topic_category: article.topic,
                published_date: published,
                canonical_link: article.link,
            });
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("collect_provider_parse_ms", "provider" => PROVIDER).record(ms);
        counter!("collect_candidates_total", "provider" => PROVIDER).increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl SourceProvider for GenerativeSearchProvider {
    async fn fetch(
        &self,
        date: NaiveDate,
        category: Category,
        limit: usize,
    ) -> Result<Vec<Candidate>, SourceError> {
        match &self.mode {
            Mode::Fixture(payload) => self
                .parse_articles(payload, date, category, limit)
                .map_err(SourceError::Other),

            Mode::Http {
                client,
                endpoint,
                api_key,
                model,
            } => {
                #[derive(Serialize)]
                struct Msg<'a> {
                    role: &'a str,
                    content: &'a str,
                }
                #[derive(Serialize)]
                struct Req<'a> {
                    model: &'a str,
                    messages: Vec<Msg<'a>>,
                    temperature: f32,
                }
                #[derive(Deserialize)]
                struct Resp {
                    choices: Vec<Choice>,
                }
                #[derive(Deserialize)]
                struct Choice {
                    message: ChoiceMsg,
                }
                #[derive(Deserialize)]
                struct ChoiceMsg {
                    content: String,
                }

                let sys = "You are a news retrieval assistant. Respond with a JSON array only, \
                           no prose, no markdown fences.";
                let user = self.user_prompt(date, category, limit);
                let req = Req {
                    model,
                    messages: vec![
                        Msg {
                            role: "system",
                            content: sys,
                        },
                        Msg {
                            role: "user",
                            content: &user,
                        },
                    ],
                    temperature: 0.2,
                };

                let resp = client
                    .post(endpoint)
                    .bearer_auth(api_key)
                    .json(&req)
                    .send()
                    .await
                    .map_err(|e| SourceError::Other(anyhow!(e).context("generative post")))?;

                if resp.status().as_u16() == 429 {
                    return Err(SourceError::RateLimited { provider: PROVIDER });
                }
                if !resp.status().is_success() {
                    return Err(SourceError::Other(anyhow!(
                        "generative endpoint returned {}",
                        resp.status()
                    )));
                }
                let body: Resp = resp
                    .json()
                    .await
                    .map_err(|e| SourceError::Other(anyhow!(e).context("generative .json()")))?;
                let content = body
                    .choices
                    .first()
                    .map(|c| c.message.content.as_str())
                    .unwrap_or("");
                self.parse_articles(content, date, category, limit)
                    .map_err(SourceError::Other)
            }
        }
    }

    fn name(&self) -> &'static str {
        PROVIDER
    }
}
