// tests/pipeline_backfill.rs
//! End-to-end runs against scripted sources: quota balancing, backfill
//! sizing, shortfall reporting, source-failure tolerance, deadlines.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use newswire_collector::config::RetryConfig;
use newswire_collector::{
    today_reference, Candidate, Category, Collector, CollectorConfig, MemoryStore, PipelineError,
    SourceError, SourceProvider, Translate, TranslateError,
};

/// Echo translator; every test speaks Korean so the detector short-circuits.
struct EchoTranslator;

#[async_trait::async_trait]
impl Translate for EchoTranslator {
    async fn translate(&self, text: &str) -> Result<String, TranslateError> {
        Ok(text.to_string())
    }
}

/// Scripted source: pops one batch per domestic fetch, records every call.
struct ScriptedSource {
    name: &'static str,
    batches: Mutex<VecDeque<Vec<Candidate>>>,
    calls: Mutex<Vec<(Category, usize)>>,
    fail: bool,
}

impl ScriptedSource {
    fn new(name: &'static str, batches: Vec<Vec<Candidate>>) -> Self {
        Self {
            name,
            batches: Mutex::new(batches.into()),
            calls: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    fn failing(name: &'static str) -> Self {
        Self {
            name,
            batches: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    fn domestic_limits(&self) -> Vec<usize> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == Category::Domestic)
            .map(|(_, l)| *l)
            .collect()
    }
}

#[async_trait::async_trait]
impl SourceProvider for ScriptedSource {
    async fn fetch(
        &self,
        _date: NaiveDate,
        category: Category,
        limit: usize,
    ) -> Result<Vec<Candidate>, SourceError> {
        self.calls.lock().unwrap().push((category, limit));
        if self.fail {
            return Err(SourceError::Other(anyhow::anyhow!("upstream down")));
        }
        if category != Category::Domestic {
            return Ok(Vec::new());
        }
        let batch = self
            .batches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        Ok(batch.into_iter().take(limit).collect())
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

const BASE_BODY: &str = "서울 시내 주요 상권의 유동 인구가 지난주부터 꾸준히 늘고 있다. \
                         상인들은 봄철 날씨와 지역 행사 덕분이라고 설명했다. \
                         구청은 다음 달까지 보행 환경 개선 공사를 마무리할 계획이다.";

fn good(i: usize) -> Candidate {
    Candidate {
        title: format!("지역 경제 회복 소식 {i}호"),
        body: format!("{BASE_BODY} 현장 취재에서 확인한 {i}번째 추가 단락이다."),
        source_country: "KR".to_string(),
        source_media: "연합뉴스".to_string(),
        category: "domestic".to_string(),
        topic_category: Some("경제".to_string()),
        published_date: today_reference(),
        canonical_link: Some(format!("https://news.example.com/good/{i}")),
    }
}

/// Passes validation, fails the hallucination gate (short title + short body).
fn hallucinated(i: usize) -> Candidate {
    Candidate {
        title: "속보".to_string(),
        body: format!("짧고 수상한 본문 {i}"),
        source_country: "KR".to_string(),
        source_media: "출처불명".to_string(),
        category: "domestic".to_string(),
        topic_category: None,
        published_date: today_reference(),
        canonical_link: Some(format!("https://news.example.com/sus/{i}")),
    }
}

/// Normal-looking article whose canonical link is already persisted.
fn link_dupe(i: usize) -> Candidate {
    Candidate {
        title: format!("이미 저장된 링크의 기사 {i}번"),
        body: format!("{BASE_BODY} 링크 중복 확인을 위한 {i}번째 본문이다."),
        source_country: "KR".to_string(),
        source_media: "연합뉴스".to_string(),
        category: "domestic".to_string(),
        topic_category: None,
        published_date: today_reference(),
        canonical_link: Some(format!("https://news.example.com/dupe/{i}")),
    }
}

fn test_config() -> CollectorConfig {
    let mut config = CollectorConfig::default();
    config.targets = [
        (Category::Domestic, 10),
        (Category::Foreign, 0),
        (Category::Related, 0),
    ]
    .into_iter()
    .collect();
    config.retry = RetryConfig {
        max_retries: 1,
        base_delay_ms: 1,
    };
    config
}

fn collector(
    sources: Vec<Arc<ScriptedSource>>,
    store: Arc<MemoryStore>,
    config: CollectorConfig,
) -> Collector {
    let providers: Vec<Arc<dyn SourceProvider>> = sources
        .into_iter()
        .map(|s| s as Arc<dyn SourceProvider>)
        .collect();
    Collector::new(providers, Arc::new(EchoTranslator), store, config)
}

#[tokio::test]
async fn filtering_losses_trigger_one_sized_backfill_round() {
    let store = Arc::new(MemoryStore::new());
    // The two duplicate links are already persisted (inside the window).
    let seeded = today_reference();
    store.seed("예전 기사 1", "전혀 다른 예전 본문 하나", seeded, Some("https://news.example.com/dupe/1"));
    store.seed("예전 기사 2", "전혀 다른 예전 본문 둘", seeded, Some("https://news.example.com/dupe/2"));

    // Round 1: 10 candidates, of which 4 hallucinated + 2 link dupes -> 4 accepted.
    let round1: Vec<Candidate> = (1..=4)
        .map(hallucinated)
        .chain((1..=2).map(link_dupe))
        .chain((1..=4).map(good))
        .collect();
    // Backfill: deficit 6 -> request max(3, ceil(6 × 1.5)) = 9; 6 fresh items fill the quota.
    let round2: Vec<Candidate> = (5..=10).map(good).collect();

    let primary = Arc::new(ScriptedSource::new("primary", vec![round1, round2]));
    let spare_a = Arc::new(ScriptedSource::new("spare_a", vec![]));
    let spare_b = Arc::new(ScriptedSource::new("spare_b", vec![]));

    let report = collector(
        vec![primary.clone(), spare_a, spare_b],
        store.clone(),
        test_config(),
    )
    .collect_and_persist(None)
    .await
    .unwrap();

    assert_eq!(primary.domestic_limits(), vec![10, 9]);

    let domestic = report
        .per_category
        .iter()
        .find(|q| q.category == Category::Domestic)
        .unwrap();
    assert_eq!(domestic.collected, 10);
    assert!(report.fully_collected());
    assert_eq!(report.success, 10);
    assert_eq!(report.failed, 0);
    assert_eq!(report.translation_failures, 0);
}

#[tokio::test]
async fn exhausted_backfill_budget_reports_shortfall_without_error() {
    let store = Arc::new(MemoryStore::new());

    // Round 1: 5 accepted of 10. Deficit 5 -> request 8. Round 2: 4 more.
    // Deficit 1 -> request max(3, ceil(1.5)) = 3. Round 3: nothing left.
    let round1: Vec<Candidate> = (1..=5)
        .map(good)
        .chain((1..=5).map(hallucinated))
        .collect();
    let round2: Vec<Candidate> = (6..=9).map(good).collect();

    let primary = Arc::new(ScriptedSource::new("primary", vec![round1, round2]));
    let report = collector(vec![primary.clone()], store, test_config())
        .collect_and_persist(None)
        .await
        .unwrap();

    assert_eq!(primary.domestic_limits(), vec![10, 8, 3]);

    let domestic = report
        .per_category
        .iter()
        .find(|q| q.category == Category::Domestic)
        .unwrap();
    assert_eq!(domestic.collected, 9);
    assert_eq!(domestic.target, 10);
    assert!(!report.fully_collected());
    assert_eq!(report.success, 9);
}

#[tokio::test]
async fn failing_source_does_not_abort_the_others() {
    let store = Arc::new(MemoryStore::new());
    let broken = Arc::new(ScriptedSource::failing("broken"));
    let healthy = Arc::new(ScriptedSource::new(
        "healthy",
        vec![(1..=10).map(good).collect()],
    ));

    let report = collector(vec![broken, healthy], store, test_config())
        .collect_and_persist(None)
        .await
        .unwrap();

    let domestic = report
        .per_category
        .iter()
        .find(|q| q.category == Category::Domestic)
        .unwrap();
    assert_eq!(domestic.collected, 10);
}

#[tokio::test]
async fn off_day_candidates_are_rejected_entirely() {
    let store = Arc::new(MemoryStore::new());
    let yesterday = today_reference().pred_opt().unwrap();
    let stale: Vec<Candidate> = (1..=10)
        .map(|i| {
            let mut c = good(i);
            c.published_date = yesterday;
            c
        })
        .collect();
    // Every batch is stale, including backfill.
    let primary = Arc::new(ScriptedSource::new(
        "primary",
        vec![stale.clone(), stale.clone(), stale],
    ));

    let report = collector(vec![primary], store.clone(), test_config())
        .collect_and_persist(None)
        .await
        .unwrap();

    assert_eq!(report.total, 0);
    assert!(store.is_empty());
}

#[tokio::test]
async fn no_sources_is_a_hard_error() {
    let store = Arc::new(MemoryStore::new());
    let collector = Collector::new(
        Vec::new(),
        Arc::new(EchoTranslator),
        store,
        test_config(),
    );
    let err = collector.collect_and_persist(None).await.unwrap_err();
    assert!(matches!(err, PipelineError::NoSources));
}

#[tokio::test]
async fn expired_deadline_stops_new_batches_but_still_reports() {
    let store = Arc::new(MemoryStore::new());
    let primary = Arc::new(ScriptedSource::new(
        "primary",
        vec![(1..=10).map(good).collect()],
    ));

    let mut config = test_config();
    config.deadline_secs = Some(0);

    let report = collector(vec![primary.clone()], store, config)
        .collect_and_persist(None)
        .await
        .unwrap();

    // Translation batches and backfill rounds never started; the run still
    // returns a structured report.
    assert_eq!(report.total, 0);
    assert_eq!(primary.domestic_limits(), vec![10]);
}

#[tokio::test]
async fn accepted_items_survive_into_the_store_once() {
    let store = Arc::new(MemoryStore::new());
    // The same article arrives twice in one run (two sources would dedupe at
    // the in-run link check; here the scripted source repeats itself).
    let mut batch: Vec<Candidate> = (1..=3).map(good).collect();
    batch.push(good(1));
    let primary = Arc::new(ScriptedSource::new("primary", vec![batch]));

    let mut config = test_config();
    config.targets.insert(Category::Domestic, 4);
    config.backfill_rounds = 0;

    let report = collector(vec![primary], store.clone(), config)
        .collect_and_persist(None)
        .await
        .unwrap();

    assert_eq!(report.total, 3);
    assert_eq!(store.len(), 3);
}
