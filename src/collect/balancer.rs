// src/collect/balancer.rs
//! Category balancer and backfill orchestrator.
//!
//! One run: collect an initial per-category batch, push every candidate
//! through validate -> hallucination gate -> translate -> dedup, tally
//! accepted items per category, then issue up to two targeted backfill
//! rounds for the categories still short. Filtering losses are expected, so
//! backfill over-requests (`max(3, ceil(deficit * 1.5))`). A category ending
//! under target is reported in the run result, never raised.

use chrono::{FixedOffset, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use metrics::{counter, gauge};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::collect::types::{
    Candidate, Category, CategoryQuota, NormalizedItem, RunReport, SourceProvider,
};
use crate::collect::ensure_metrics_described;
use crate::config::CollectorConfig;
use crate::dedup::DedupEngine;
use crate::error::{PipelineError, SourceError};
use crate::hallucination;
use crate::retry::retry;
use crate::store::{persist_in_chunks, ArticleStore};
use crate::translate::{translate_if_needed, Translate};
use crate::validate::validate;

/// The reference calendar is KST; "today" means today in Seoul.
pub fn today_reference() -> NaiveDate {
    let kst = FixedOffset::east_opt(9 * 3600).expect("valid KST offset");
    Utc::now().with_timezone(&kst).date_naive()
}

fn deadline_expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

/// The collection pipeline driver. Holds explicit handles to its
/// collaborators; nothing global, everything injectable.
pub struct Collector {
    providers: Vec<Arc<dyn SourceProvider>>,
    translator: Arc<dyn Translate>,
    store: Arc<dyn ArticleStore>,
    config: CollectorConfig,
}

impl Collector {
    pub fn new(
        providers: Vec<Arc<dyn SourceProvider>>,
        translator: Arc<dyn Translate>,
        store: Arc<dyn ArticleStore>,
        config: CollectorConfig,
    ) -> Self {
        Self {
            providers,
            translator,
            store,
            config,
        }
    }

    /// Run one collection and persist what survived.
    ///
    /// `date` other than today (or `None`) is silently clamped to today.
    /// The only hard errors are an empty adapter list and a storage
    /// breakdown while snapshotting the dedup window; shortfalls, rejected
    /// items and duplicates all land in the report.
    pub async fn collect_and_persist(
        &self,
        date: Option<NaiveDate>,
    ) -> Result<RunReport, PipelineError> {
        ensure_metrics_described();

        if self.providers.is_empty() {
            return Err(PipelineError::NoSources);
        }

        let today = today_reference();
        let reference = match date {
            Some(d) if d == today => d,
            Some(d) => {
                debug!(target: "collect", requested = %d, clamped_to = %today, "date clamped");
                today
            }
            None => today,
        };

        let deadline = self.config.deadline().map(|d| Instant::now() + d);

        let dedup = DedupEngine::load(
            self.store.as_ref(),
            reference,
            self.config.dedup_window_days,
            self.config.fuzzy_threshold,
        )
        .await?;
        debug!(target: "collect", window = dedup.window_len(), "dedup window snapshot loaded");

        let mut quotas: Vec<CategoryQuota> = Category::ALL
            .iter()
            .map(|c| CategoryQuota::new(*c, self.config.target_for(*c)))
            .collect();
        let mut accepted: Vec<NormalizedItem> = Vec::new();
        let mut accepted_links: HashSet<String> = HashSet::new();
        let mut translation_failures = 0usize;

        // Initial collect round: fixed batch for every category.
        let requests: Vec<(Category, usize)> = quotas
            .iter()
            .map(|q| (q.category, self.config.initial_batch))
            .collect();
        let candidates = self.fetch_round(reference, &requests).await;
        self.process(
            candidates,
            reference,
            &dedup,
            &mut quotas,
            &mut accepted,
            &mut accepted_links,
            &mut translation_failures,
            deadline,
        )
        .await;

        // Backfill: bounded rounds, deficient categories only.
        for round in 1..=self.config.backfill_rounds {
            let deficits: Vec<(Category, usize)> = quotas
                .iter()
                .filter(|q| !q.is_full())
                .map(|q| (q.category, q.deficit()))
                .collect();
            if deficits.is_empty() {
                break;
            }
            if deadline_expired(deadline) {
                warn!(target: "collect", round, "deadline reached, skipping backfill");
                break;
            }
            counter!("collect_backfill_rounds_total").increment(1);
            let requests: Vec<(Category, usize)> = deficits
                .iter()
                .map(|(c, d)| (*c, self.config.backfill_request(*d)))
                .collect();
            debug!(target: "collect", round, ?requests, "backfill round");
            let candidates = self.fetch_round(reference, &requests).await;
            self.process(
                candidates,
                reference,
                &dedup,
                &mut quotas,
                &mut accepted,
                &mut accepted_links,
                &mut translation_failures,
                deadline,
            )
            .await;
        }

        for q in quotas.iter().filter(|q| !q.is_full()) {
            warn!(
                target: "collect",
                category = %q.category,
                collected = q.collected,
                target = q.target,
                "category under target after backfill budget"
            );
        }

        let insert = persist_in_chunks(
            self.store.as_ref(),
            &accepted,
            self.config.persist_chunk,
            self.config.persist_concurrency,
        )
        .await;

        gauge!("collect_last_run_ts").set(Utc::now().timestamp().max(0) as f64);

        let report = RunReport {
            reference_date: reference,
            success: insert.success,
            failed: insert.failed,
            skipped_as_duplicate: insert.skipped_as_duplicate,
            total: accepted.len(),
            per_category: quotas,
            translation_failures,
        };
        info!(
            target: "collect",
            success = report.success,
            failed = report.failed,
            skipped = report.skipped_as_duplicate,
            translation_failures = report.translation_failures,
            fully_collected = report.fully_collected(),
            "collection run finished"
        );
        Ok(report)
    }

    /// Fetch one round. Per category, providers are polled in registration
    /// order until the requested batch is gathered; rate-limited providers
    /// are retried with backoff, failing ones are skipped. Categories fan
    /// out with bounded concurrency.
    async fn fetch_round(
        &self,
        date: NaiveDate,
        requests: &[(Category, usize)],
    ) -> Vec<Candidate> {
        let per_category: Vec<Vec<Candidate>> = stream::iter(requests.iter().copied())
            .map(|(category, limit)| self.fetch_category(date, category, limit))
            .buffered(self.config.fetch_concurrency)
            .collect()
            .await;
        per_category.into_iter().flatten().collect()
    }

    async fn fetch_category(
        &self,
        date: NaiveDate,
        category: Category,
        limit: usize,
    ) -> Vec<Candidate> {
        let policy = self.config.retry_policy();
        let mut gathered: Vec<Candidate> = Vec::with_capacity(limit);
        for provider in &self.providers {
            if gathered.len() >= limit {
                break;
            }
            let remaining = limit - gathered.len();
            // Rate limits back off and retry; anything else fails this
            // source for the round and the next one takes over.
            let result = retry(
                policy,
                |e: &SourceError| !e.is_rate_limited(),
                |_| provider.fetch(date, category, remaining),
            )
            .await;
            match result {
                Ok(items) => gathered.extend(items.into_iter().take(remaining)),
                Err(e) => {
                    counter!("collect_provider_errors_total", "provider" => provider.name())
                        .increment(1);
                    warn!(
                        target: "collect",
                        provider = provider.name(),
                        category = %category,
                        error = %e,
                        "source fetch failed"
                    );
                }
            }
        }
        gathered
    }

    /// Process one batch of candidates: validate, gate hallucinations,
    /// translate (bounded batches, order preserved), dedup, tally.
    #[allow(clippy::too_many_arguments)]
    async fn process(
        &self,
        candidates: Vec<Candidate>,
        reference: NaiveDate,
        dedup: &DedupEngine<'_>,
        quotas: &mut [CategoryQuota],
        accepted: &mut Vec<NormalizedItem>,
        accepted_links: &mut HashSet<String>,
        translation_failures: &mut usize,
        deadline: Option<Instant>,
    ) {
        let mut items: Vec<NormalizedItem> = candidates
            .iter()
            .filter_map(|c| validate(c, reference))
            .collect();

        items.retain(|item| {
            let score = hallucination::score(&item.title, &item.body, &item.source_media);
            if score.suspicious {
                counter!("collect_hallucination_rejects_total").increment(1);
                debug!(
                    target: "collect",
                    id = %crate::validate::anon_hash(&item.title),
                    score = score.score,
                    reasons = ?score.reasons,
                    "hallucination gate dropped candidate"
                );
            }
            !score.suspicious
        });

        // Translation in bounded batches; a deadline stops new batches but
        // lets the running one finish.
        let policy = self.config.retry_policy();
        let mut translated: Vec<NormalizedItem> = Vec::with_capacity(items.len());
        for chunk in items.chunks(self.config.translate_concurrency) {
            if deadline_expired(deadline) {
                warn!(
                    target: "collect",
                    dropped = items.len() - translated.len(),
                    "deadline reached, skipping remaining translation batches"
                );
                break;
            }
            let outcomes = futures::future::join_all(
                chunk
                    .iter()
                    .map(|item| translate_if_needed(self.translator.as_ref(), policy, &item.body)),
            )
            .await;
            for (item, outcome) in chunk.iter().zip(outcomes) {
                let mut item = item.clone();
                if outcome.failed {
                    item.translation_failed = true;
                    *translation_failures += 1;
                    counter!("collect_translation_failures_total").increment(1);
                } else if outcome.text != item.body {
                    item.translated_body = Some(outcome.text);
                }
                translated.push(item);
            }
        }

        // Dedup and tally in source order; excess beyond a category target
        // is discarded, not persisted.
        for item in translated {
            let quota = quotas
                .iter_mut()
                .find(|q| q.category == item.category)
                .expect("quota exists for every category");
            if quota.is_full() {
                debug!(target: "collect", category = %item.category, "quota full, discarding excess");
                continue;
            }

            if let Some(link) = item.canonical_link.as_deref() {
                if accepted_links.contains(link) {
                    counter!("collect_duplicates_total", "kind" => "in_run").increment(1);
                    continue;
                }
            }

            // The window is read-only for the run; a lookup failure here is
            // logged and the item treated as unique (insert-time conflict
            // handling still catches true link duplicates).
            let decision = match dedup.check(&item).await {
                Ok(d) => d,
                Err(e) => {
                    warn!(target: "collect", error = %e, "dedup lookup failed, treating as unique");
                    crate::dedup::DedupDecision::unique(None)
                }
            };
            if decision.is_duplicate {
                counter!("collect_duplicates_total", "kind" => "store").increment(1);
                debug!(
                    target: "collect",
                    id = %crate::validate::anon_hash(&item.title),
                    matched_id = ?decision.matched_id,
                    similarity = ?decision.similarity,
                    "duplicate dropped"
                );
                continue;
            }

            quota.collected += 1;
            if let Some(link) = item.canonical_link.clone() {
                accepted_links.insert(link);
            }
            counter!("collect_accepted_total", "category" => quota.category.as_str()).increment(1);
            accepted.push(item);
        }
    }
}
