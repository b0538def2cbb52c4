//! Newswire Collector — Binary Entrypoint
//! Wires source adapters and the translator from environment credentials and
//! runs one collection against an in-memory store (dry run). Real
//! deployments embed the library and supply their own `ArticleStore`.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use newswire_collector::collect::providers::{
    generative::GenerativeSearchProvider, regional::RegionalNewsProvider,
    search_api::SearchApiProvider,
};
use newswire_collector::translate::HttpTranslator;
use newswire_collector::{
    Collector, CollectorConfig, MemoryStore, SourceProvider, Translate, TranslateError,
};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("newswire_collector=info,collect=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

/// Fallback translator for credential-less dry runs: echoes the input, so
/// every non-Korean item is reported as a translation failure.
struct PassthroughTranslator;

#[async_trait::async_trait]
impl Translate for PassthroughTranslator {
    async fn translate(&self, text: &str) -> Result<String, TranslateError> {
        Ok(text.to_string())
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn build_providers(config: &CollectorConfig) -> Vec<Arc<dyn SourceProvider>> {
    let mut providers: Vec<Arc<dyn SourceProvider>> = Vec::new();
    let queries = config.queries.clone();
    let min_body = config.min_body_chars;

    if let (Some(endpoint), Some(id), Some(secret)) = (
        env_nonempty("REGIONAL_NEWS_ENDPOINT"),
        env_nonempty("REGIONAL_NEWS_CLIENT_ID"),
        env_nonempty("REGIONAL_NEWS_CLIENT_SECRET"),
    ) {
        providers.push(Arc::new(RegionalNewsProvider::from_credentials(
            endpoint,
            id,
            secret,
            queries.clone(),
            min_body,
        )));
    }

    if let (Some(endpoint), Some(key)) = (
        env_nonempty("SEARCH_API_ENDPOINT"),
        env_nonempty("SEARCH_API_KEY"),
    ) {
        providers.push(Arc::new(SearchApiProvider::from_api_key(
            endpoint,
            key,
            queries.clone(),
            min_body,
        )));
    }

    if let (Some(endpoint), Some(key)) = (
        env_nonempty("GENERATIVE_API_ENDPOINT"),
        env_nonempty("GENERATIVE_API_KEY"),
    ) {
        let model = env_nonempty("GENERATIVE_MODEL");
        providers.push(Arc::new(GenerativeSearchProvider::from_api_key(
            endpoint,
            key,
            model.as_deref(),
            queries,
            min_body,
        )));
    }

    providers
}

fn build_translator() -> Arc<dyn Translate> {
    match (
        env_nonempty("TRANSLATE_API_ENDPOINT"),
        env_nonempty("TRANSLATE_API_KEY"),
    ) {
        (Some(endpoint), Some(key)) => Arc::new(HttpTranslator::new(endpoint, key)),
        _ => {
            warn!("no translation credentials; non-Korean items will be kept untranslated");
            Arc::new(PassthroughTranslator)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = CollectorConfig::load_default()?;
    let providers = build_providers(&config);
    let translator = build_translator();
    let store = Arc::new(MemoryStore::new());

    // Optional YYYY-MM-DD argument; anything but today gets clamped anyway.
    let date = std::env::args()
        .nth(1)
        .and_then(|raw| NaiveDate::parse_from_str(&raw, "%Y-%m-%d").ok());

    let collector = Collector::new(providers, translator, store, config);
    let report = collector.collect_and_persist(date).await?;

    for quota in &report.per_category {
        info!(
            category = %quota.category,
            collected = quota.collected,
            target = quota.target,
            "category result"
        );
    }
    info!(
        success = report.success,
        failed = report.failed,
        skipped_as_duplicate = report.skipped_as_duplicate,
        total = report.total,
        translation_failures = report.translation_failures,
        "run complete"
    );
    Ok(())
}
