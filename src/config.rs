// src/config.rs
//! Runtime configuration for the collector.
//!
//! Loaded from TOML with per-field defaults, so a config file only needs to
//! name what it changes. Resolution order:
//! 1) $COLLECTOR_CONFIG_PATH
//! 2) config/collector.toml
//! 3) compiled defaults

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::collect::types::Category;
use crate::retry::RetryPolicy;

const ENV_PATH: &str = "COLLECTOR_CONFIG_PATH";
const DEFAULT_PATH: &str = "config/collector.toml";

pub const DEFAULT_CATEGORY_TARGET: usize = 10;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 200,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.base_delay_ms))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Accepted-item quota per category.
    pub targets: BTreeMap<Category, usize>,
    /// Search keyword per category, fed to the source adapters.
    pub queries: BTreeMap<Category, String>,
    /// Candidates requested per category in the first collect round.
    pub initial_batch: usize,
    /// Backfill rounds after the initial round.
    pub backfill_rounds: u32,
    /// Lower bound on a backfill request size.
    pub backfill_floor: usize,
    /// Over-request factor applied to a category deficit.
    pub backfill_factor: f64,
    /// Combined similarity at or above this is a duplicate.
    pub fuzzy_threshold: f64,
    /// Trailing window for fuzzy dedup, in days.
    pub dedup_window_days: u64,
    /// Bounded fan-out widths.
    pub translate_concurrency: usize,
    pub fetch_concurrency: usize,
    pub persist_chunk: usize,
    pub persist_concurrency: usize,
    /// Minimum body length providers should deliver, in chars.
    pub min_body_chars: usize,
    pub retry: RetryConfig,
    /// Optional overall run deadline. In-flight batches complete when it
    /// passes; no new batches start.
    pub deadline_secs: Option<u64>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        let targets = Category::ALL
            .iter()
            .map(|c| (*c, DEFAULT_CATEGORY_TARGET))
            .collect();
        let queries = [
            (Category::Domestic, "국내 주요 뉴스".to_string()),
            (Category::Foreign, "해외 주요 뉴스".to_string()),
            (Category::Related, "관련 업계 뉴스".to_string()),
        ]
        .into_iter()
        .collect();
        Self {
            targets,
            queries,
            initial_batch: 10,
            backfill_rounds: 2,
            backfill_floor: 3,
            backfill_factor: 1.5,
            fuzzy_threshold: 0.85,
            dedup_window_days: 7,
            translate_concurrency: 5,
            fetch_concurrency: 3,
            persist_chunk: 10,
            persist_concurrency: 4,
            min_body_chars: 80,
            retry: RetryConfig::default(),
            deadline_secs: None,
        }
    }
}

impl CollectorConfig {
    pub fn target_for(&self, category: Category) -> usize {
        self.targets
            .get(&category)
            .copied()
            .unwrap_or(DEFAULT_CATEGORY_TARGET)
    }

    pub fn query_for(&self, category: Category) -> &str {
        self.queries
            .get(&category)
            .map(String::as_str)
            .unwrap_or(category.as_str())
    }

    /// Backfill request size for a deficit: `max(floor, ceil(deficit * factor))`.
    pub fn backfill_request(&self, deficit: usize) -> usize {
        let scaled = (deficit as f64 * self.backfill_factor).ceil() as usize;
        scaled.max(self.backfill_floor)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.policy()
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }

    /// Parameter hygiene: clamp ratios, keep batch sizes nonzero.
    fn sanitized(mut self) -> Self {
        self.fuzzy_threshold = self.fuzzy_threshold.clamp(0.0, 1.0);
        self.backfill_factor = self.backfill_factor.max(1.0);
        self.initial_batch = self.initial_batch.max(1);
        self.translate_concurrency = self.translate_concurrency.max(1);
        self.fetch_concurrency = self.fetch_concurrency.max(1);
        self.persist_chunk = self.persist_chunk.max(1);
        self.persist_concurrency = self.persist_concurrency.max(1);
        self
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading collector config from {}", path.display()))?;
        let cfg: CollectorConfig = toml::from_str(&content)
            .with_context(|| format!("parsing collector config {}", path.display()))?;
        Ok(cfg.sanitized())
    }

    /// Env override first, then the default path, then compiled defaults.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("COLLECTOR_CONFIG_PATH points to non-existent path"));
        }
        let default = PathBuf::from(DEFAULT_PATH);
        if default.exists() {
            return Self::load_from(&default);
        }
        Ok(Self::default())
    }
}
