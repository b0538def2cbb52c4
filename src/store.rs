// src/store.rs
//! Persistence gateway contract.
//!
//! Storage itself is external; the pipeline only depends on this trait. The
//! one semantic that matters here: a unique-constraint conflict on the
//! canonical link is a *duplicate*, reported as skipped, never a failure.

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use std::sync::Mutex;
use tracing::warn;

use crate::collect::types::NormalizedItem;
use crate::error::StoreError;

/// Minimal projection of a persisted article, as needed by deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArticle {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub published_date: NaiveDate,
}

/// Aggregated result of a batched insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertReport {
    pub success: usize,
    pub failed: usize,
    pub skipped_as_duplicate: usize,
    pub persisted_ids: Vec<i64>,
}

impl InsertReport {
    pub fn merge(&mut self, other: InsertReport) {
        self.success += other.success;
        self.failed += other.failed;
        self.skipped_as_duplicate += other.skipped_as_duplicate;
        self.persisted_ids.extend(other.persisted_ids);
    }
}

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Insert a batch with per-item conflict handling: a duplicate canonical
    /// link counts into `skipped_as_duplicate`, other per-item problems into
    /// `failed`. Only a backend-level breakdown returns an error.
    async fn insert_batch(&self, items: &[NormalizedItem]) -> Result<InsertReport, StoreError>;

    async fn find_by_canonical_link(&self, url: &str) -> Result<Option<i64>, StoreError>;

    /// Articles published on or after `since`, for fuzzy similarity checks.
    async fn find_recent_for_similarity(
        &self,
        since: NaiveDate,
    ) -> Result<Vec<StoredArticle>, StoreError>;
}

/// Persist `items` in chunks of `chunk_size`, chunks running concurrently.
/// A failing chunk marks its items failed and the rest of the batch carries
/// on; this never returns an error.
pub async fn persist_in_chunks(
    store: &dyn ArticleStore,
    items: &[NormalizedItem],
    chunk_size: usize,
    concurrency: usize,
) -> InsertReport {
    let chunk_size = chunk_size.max(1);
    let results: Vec<(usize, Result<InsertReport, StoreError>)> =
        stream::iter(items.chunks(chunk_size))
            .map(|chunk| async move { (chunk.len(), store.insert_batch(chunk).await) })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

    let mut report = InsertReport::default();
    for (len, result) in results {
        match result {
            Ok(r) => report.merge(r),
            Err(e) => {
                warn!(target: "store", error = %e, items = len, "insert chunk failed");
                report.failed += len;
            }
        }
    }
    report
}

/// In-memory store with a unique canonical-link constraint. Reference
/// implementation for tests and the binary's dry-run mode.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    next_id: i64,
    records: Vec<MemoryRecord>,
}

struct MemoryRecord {
    article: StoredArticle,
    canonical_link: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a historical article, for dedup windows in tests.
    pub fn seed(&self, title: &str, body: &str, published: NaiveDate, link: Option<&str>) -> i64 {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        inner.next_id += 1;
        let id = inner.next_id;
        inner.records.push(MemoryRecord {
            article: StoredArticle {
                id,
                title: title.to_string(),
                body: body.to_string(),
                published_date: published,
            },
            canonical_link: link.map(str::to_string),
        });
        id
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("memory store poisoned").records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn insert_batch(&self, items: &[NormalizedItem]) -> Result<InsertReport, StoreError> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        let mut report = InsertReport::default();
        for item in items {
            let conflict = item.canonical_link.as_deref().is_some_and(|link| {
                inner
                    .records
                    .iter()
                    .any(|r| r.canonical_link.as_deref() == Some(link))
            });
            if conflict {
                report.skipped_as_duplicate += 1;
                continue;
            }
            inner.next_id += 1;
            let id = inner.next_id;
            inner.records.push(MemoryRecord {
                article: StoredArticle {
                    id,
                    title: item.title.clone(),
                    body: item.effective_body().to_string(),
                    published_date: item.published_date,
                },
                canonical_link: item.canonical_link.clone(),
            });
            report.success += 1;
            report.persisted_ids.push(id);
        }
        Ok(report)
    }

    async fn find_by_canonical_link(&self, url: &str) -> Result<Option<i64>, StoreError> {
        let inner = self.inner.lock().expect("memory store poisoned");
        Ok(inner
            .records
            .iter()
            .find(|r| r.canonical_link.as_deref() == Some(url))
            .map(|r| r.article.id))
    }

    async fn find_recent_for_similarity(
        &self,
        since: NaiveDate,
    ) -> Result<Vec<StoredArticle>, StoreError> {
        let inner = self.inner.lock().expect("memory store poisoned");
        Ok(inner
            .records
            .iter()
            .filter(|r| r.article.published_date >= since)
            .map(|r| r.article.clone())
            .collect())
    }
}
