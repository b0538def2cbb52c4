// src/translate.rs
//! Language detection and translation with bounded retries.
//!
//! Two failure modes are handled separately:
//! - the provider *throws* (network, timeout, 5xx): retried with backoff via
//!   the shared combinator, except quota exhaustion which is terminal;
//! - the provider *silently no-ops* (returns the input unchanged): retried a
//!   few more times with its own backoff, since some providers degrade to
//!   echoing under load.
//!
//! Either way the item survives: the original text is kept and the outcome
//! is marked failed, never raised.

use metrics::counter;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::TranslateError;
use crate::retry::{retry, RetryPolicy};

/// Additional attempts when the provider returns the input unchanged.
pub const IDENTICAL_RESULT_RETRIES: u32 = 3;

/// Hangul share above which a text counts as already-Korean.
const HANGUL_RATIO_THRESHOLD: f64 = 0.30;

/// At or below this many non-whitespace chars, a single Hangul char is
/// enough to count as already-Korean.
const SHORT_TEXT_CHARS: usize = 10;

/// Result of [`translate_if_needed`]. `failed` is true iff the final text
/// still equals the input after the whole retry budget.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TranslationOutcome {
    pub text: String,
    pub failed: bool,
}

/// Translation provider contract: translate into the target language.
/// Quota exhaustion must surface as [`TranslateError::QuotaExhausted`].
#[async_trait::async_trait]
pub trait Translate: Send + Sync {
    async fn translate(&self, text: &str) -> Result<String, TranslateError>;
}

fn is_hangul(c: char) -> bool {
    matches!(c,
        '\u{AC00}'..='\u{D7A3}' // syllables
        | '\u{1100}'..='\u{11FF}' // jamo
        | '\u{3130}'..='\u{318F}' // compatibility jamo
    )
}

/// Is the text already in the target language (Korean)?
///
/// True when at least 30% of non-whitespace chars are Hangul, or, for very
/// short strings, when any single Hangul char is present.
pub fn is_target_language(text: &str) -> bool {
    let mut total = 0usize;
    let mut hangul = 0usize;
    for c in text.chars() {
        if c.is_whitespace() {
            continue;
        }
        total += 1;
        if is_hangul(c) {
            hangul += 1;
        }
    }
    if total == 0 {
        // Nothing to translate.
        return true;
    }
    if total <= SHORT_TEXT_CHARS {
        return hangul > 0;
    }
    hangul as f64 / total as f64 >= HANGUL_RATIO_THRESHOLD
}

/// Translate `text` unless it is already in the target language.
///
/// Known limitation: "output equals input" is the only failure signal. A
/// provider that legitimately returns an identical translation for a short
/// or ambiguous phrase is recorded as a failure too; the heuristic cannot
/// tell the two cases apart, and the behavior is kept as-is on purpose.
pub async fn translate_if_needed(
    translator: &dyn Translate,
    policy: RetryPolicy,
    text: &str,
) -> TranslationOutcome {
    if is_target_language(text) {
        return TranslationOutcome {
            text: text.to_string(),
            failed: false,
        };
    }

    for attempt in 0..=IDENTICAL_RESULT_RETRIES {
        let result = retry(policy, TranslateError::is_quota_exhausted, |_| {
            translator.translate(text)
        })
        .await;

        match result {
            Ok(translated) if translated != text => {
                return TranslationOutcome {
                    text: translated,
                    failed: false,
                };
            }
            Ok(_) => {
                // Silent no-op from the provider; back off and try again.
                counter!("collect_translation_noop_total").increment(1);
                if attempt < IDENTICAL_RESULT_RETRIES {
                    tokio::time::sleep(policy.backoff_delay(attempt)).await;
                }
            }
            Err(TranslateError::QuotaExhausted) => {
                // Terminal for this run; spending retries cannot help.
                counter!("collect_translation_quota_total").increment(1);
                warn!(target: "translate", "quota exhausted, keeping original text");
                return TranslationOutcome {
                    text: text.to_string(),
                    failed: true,
                };
            }
            Err(TranslateError::Transient(msg)) => {
                // Transient budget already spent inside `retry`.
                debug!(target: "translate", error = %msg, "transient failures exhausted");
                return TranslationOutcome {
                    text: text.to_string(),
                    failed: true,
                };
            }
        }
    }

    TranslationOutcome {
        text: text.to_string(),
        failed: true,
    }
}

/// HTTP translation client (DeepL-style wire contract: a `text` array in,
/// a `translations` array out; HTTP 456 means the account quota is spent).
pub struct HttpTranslator {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    target_lang: String,
}

impl HttpTranslator {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("newswire-collector/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(15))
            .build()
            .expect("reqwest client");
        Self {
            http,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            target_lang: "KO".to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Translate for HttpTranslator {
    async fn translate(&self, text: &str) -> Result<String, TranslateError> {
        #[derive(Serialize)]
        struct Req<'a> {
            text: [&'a str; 1],
            target_lang: &'a str,
        }
        #[derive(Deserialize)]
        struct Resp {
            translations: Vec<Translation>,
        }
        #[derive(Deserialize)]
        struct Translation {
            text: String,
        }

        let resp = self
            .http
            .post(&self.endpoint)
            .header("Authorization", format!("DeepL-Auth-Key {}", self.api_key))
            .json(&Req {
                text: [text],
                target_lang: &self.target_lang,
            })
            .send()
            .await
            .map_err(|e| TranslateError::Transient(e.to_string()))?;

        let status = resp.status();
        if status.as_u16() == 456 {
            return Err(TranslateError::QuotaExhausted);
        }
        if !status.is_success() {
            return Err(TranslateError::Transient(format!(
                "translation endpoint returned {status}"
            )));
        }

        let body: Resp = resp
            .json()
            .await
            .map_err(|e| TranslateError::Transient(e.to_string()))?;
        body.translations
            .into_iter()
            .next()
            .map(|t| t.text)
            .ok_or_else(|| TranslateError::Transient("empty translations array".to_string()))
    }
}
