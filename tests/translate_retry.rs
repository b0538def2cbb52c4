// tests/translate_retry.rs
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use newswire_collector::retry::RetryPolicy;
use newswire_collector::translate::{translate_if_needed, Translate, IDENTICAL_RESULT_RETRIES};
use newswire_collector::TranslateError;

fn fast_policy() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(1))
}

/// Scripted translator: pops one behavior per call.
struct Scripted {
    calls: AtomicUsize,
    script: Mutex<Vec<Step>>,
}

enum Step {
    Ok(&'static str),
    Echo,
    Transient,
    Quota,
}

impl Scripted {
    fn new(script: Vec<Step>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            script: Mutex::new(script),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Translate for Scripted {
    async fn translate(&self, text: &str) -> Result<String, TranslateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        let step = if script.is_empty() {
            Step::Echo
        } else {
            script.remove(0)
        };
        match step {
            Step::Ok(s) => Ok(s.to_string()),
            Step::Echo => Ok(text.to_string()),
            Step::Transient => Err(TranslateError::Transient("timeout".to_string())),
            Step::Quota => Err(TranslateError::QuotaExhausted),
        }
    }
}

#[tokio::test]
async fn korean_input_short_circuits_without_provider_call() {
    let translator = Scripted::new(vec![Step::Ok("should not be used")]);
    let out = translate_if_needed(&translator, fast_policy(), "오늘의 주요 뉴스 정리").await;
    assert!(!out.failed);
    assert_eq!(out.text, "오늘의 주요 뉴스 정리");
    assert_eq!(translator.calls(), 0);
}

#[tokio::test]
async fn quota_error_returns_original_within_one_call() {
    let translator = Scripted::new(vec![Step::Quota, Step::Ok("번역 결과")]);
    let input = "Breaking: markets rally on rate cut hopes";
    let out = translate_if_needed(&translator, fast_policy(), input).await;
    assert!(out.failed);
    assert_eq!(out.text, input);
    // no retry budget spent on a quota error
    assert_eq!(translator.calls(), 1);
}

#[tokio::test]
async fn transient_errors_are_retried_then_succeed() {
    let translator = Scripted::new(vec![
        Step::Transient,
        Step::Transient,
        Step::Ok("금리 인하 기대에 증시 반등"),
    ]);
    let out = translate_if_needed(
        &translator,
        fast_policy(),
        "Markets rebound on rate cut hopes",
    )
    .await;
    assert!(!out.failed);
    assert_eq!(out.text, "금리 인하 기대에 증시 반등");
    assert_eq!(translator.calls(), 3);
}

#[tokio::test]
async fn transient_budget_exhaustion_keeps_original() {
    let translator = Scripted::new(vec![
        Step::Transient,
        Step::Transient,
        Step::Transient,
        Step::Transient,
    ]);
    let input = "Persistent outage upstream";
    let out = translate_if_needed(&translator, fast_policy(), input).await;
    assert!(out.failed);
    assert_eq!(out.text, input);
    // first call + max_retries
    assert_eq!(translator.calls(), 4);
}

#[tokio::test]
async fn silent_noop_is_retried_then_marked_failed() {
    let translator = Scripted::new(vec![]); // echoes forever
    let input = "Untranslatable headline";
    let out = translate_if_needed(&translator, fast_policy(), input).await;
    assert!(out.failed);
    assert_eq!(out.text, input);
    assert_eq!(translator.calls(), 1 + IDENTICAL_RESULT_RETRIES as usize);
}

#[tokio::test]
async fn noop_then_real_translation_succeeds() {
    let translator = Scripted::new(vec![Step::Echo, Step::Ok("실제 번역 결과")]);
    let out = translate_if_needed(&translator, fast_policy(), "A real translation").await;
    assert!(!out.failed);
    assert_eq!(out.text, "실제 번역 결과");
    assert_eq!(translator.calls(), 2);
}
