// src/collect/mod.rs
//! The collection pipeline: source adapters, category balancing, backfill.

pub mod balancer;
pub mod providers;
pub mod types;

use once_cell::sync::OnceCell;

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// One-time metrics registration (so series show up wherever the host
/// exports them).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "collect_candidates_total",
            "Raw candidates returned by source adapters."
        );
        describe_counter!(
            "collect_accepted_total",
            "Items accepted after validation, hallucination gate, translation and dedup."
        );
        describe_counter!(
            "collect_validation_rejects_total",
            "Candidates rejected by the validator."
        );
        describe_counter!(
            "collect_hallucination_rejects_total",
            "Candidates dropped as suspected hallucinations."
        );
        describe_counter!(
            "collect_duplicates_total",
            "Items dropped as exact-link or fuzzy duplicates."
        );
        describe_counter!(
            "collect_translation_failures_total",
            "Items whose translation still equals the original after retries."
        );
        describe_counter!(
            "collect_translation_noop_total",
            "Provider calls that returned the input unchanged."
        );
        describe_counter!(
            "collect_translation_quota_total",
            "Translation calls short-circuited by quota exhaustion."
        );
        describe_counter!(
            "collect_provider_errors_total",
            "Source adapter fetch/parse errors."
        );
        describe_counter!(
            "collect_backfill_rounds_total",
            "Backfill rounds actually executed."
        );
        describe_histogram!(
            "collect_provider_parse_ms",
            "Provider response parse time in milliseconds."
        );
        describe_gauge!(
            "collect_last_run_ts",
            "Unix ts when a collection run last finished."
        );
    });
}
