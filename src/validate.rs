// src/validate.rs
//! Candidate validation and text normalization.
//!
//! Rejection is silent by design: a bad candidate is logged (with a hashed
//! id, never the raw text) and counted, and the pipeline moves on. Nothing
//! here raises.

use chrono::NaiveDate;
use metrics::counter;
use tracing::debug;

use crate::collect::types::{Candidate, Category, NormalizedItem, TopicCategory};

/// Upper bound on normalized body length, in chars. Generous enough that the
/// scorer's long-body signals still see what they need.
const MAX_BODY_CHARS: usize = 20_000;
const MAX_TITLE_CHARS: usize = 500;

/// Normalize text: decode HTML entities, strip tags, fold curly quotes to
/// ASCII, collapse whitespace, cap length.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    if out.chars().count() > MAX_BODY_CHARS {
        out = out.chars().take(MAX_BODY_CHARS).collect();
    }

    out
}

/// Short anonymized id for log lines (first 6 bytes of a SHA-256, hex).
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

fn reject(candidate: &Candidate, reason: &'static str) -> Option<NormalizedItem> {
    counter!("collect_validation_rejects_total", "reason" => reason).increment(1);
    debug!(
        target: "validate",
        id = %anon_hash(&candidate.title),
        source = %candidate.source_media,
        reason,
        "candidate rejected"
    );
    None
}

/// Validate one candidate against the run's reference date.
///
/// Rejects: empty title or body (after normalization), a category outside
/// the closed set, and any published date other than the reference day;
/// both past and future dates are dropped, not merely warned about. The
/// surviving item carries the reference date regardless of what the provider
/// reported.
pub fn validate(candidate: &Candidate, reference: NaiveDate) -> Option<NormalizedItem> {
    let title: String = {
        let t = normalize_text(&candidate.title);
        t.chars().take(MAX_TITLE_CHARS).collect()
    };
    let body = normalize_text(&candidate.body);

    if title.is_empty() {
        return reject(candidate, "empty_title");
    }
    if body.is_empty() {
        return reject(candidate, "empty_body");
    }

    let category = match Category::parse(&candidate.category) {
        Some(c) => c,
        None => return reject(candidate, "unknown_category"),
    };

    if candidate.published_date != reference {
        let reason = if candidate.published_date < reference {
            "published_in_past"
        } else {
            "published_in_future"
        };
        return reject(candidate, reason);
    }

    // Invalid topic strings degrade to None; topic is optional metadata.
    let topic_category = candidate
        .topic_category
        .as_deref()
        .and_then(TopicCategory::parse);

    Some(NormalizedItem {
        title,
        body,
        translated_body: None,
        source_country: candidate.source_country.clone(),
        source_media: candidate.source_media.clone(),
        category,
        topic_category,
        published_date: reference,
        canonical_link: candidate.canonical_link.clone(),
        translation_failed: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn candidate(date: &str) -> Candidate {
        Candidate {
            title: "증시 급등에 투자자들 주목".to_string(),
            body: "코스피가 장 초반부터 상승세를 보였다. 전문가들은 신중한 접근을 권고했다."
                .to_string(),
            source_country: "KR".to_string(),
            source_media: "연합뉴스".to_string(),
            category: "domestic".to_string(),
            topic_category: Some("경제".to_string()),
            published_date: day(date),
            canonical_link: Some("https://news.example.com/a/1".to_string()),
        }
    }

    #[test]
    fn normalize_strips_tags_and_entities() {
        let s = "  <b>Hello&nbsp;&nbsp;world</b> &ldquo;ok&rdquo;  ";
        assert_eq!(normalize_text(s), r#"Hello world "ok""#);
    }

    #[test]
    fn accepts_reference_day_and_pins_date() {
        let item = validate(&candidate("2025-03-01"), day("2025-03-01")).unwrap();
        assert_eq!(item.category, Category::Domestic);
        assert_eq!(item.topic_category, Some(TopicCategory::Economy));
        assert_eq!(item.published_date, day("2025-03-01"));
        assert!(!item.translation_failed);
    }

    #[test]
    fn rejects_past_and_future_dates() {
        let reference = day("2025-03-01");
        assert!(validate(&candidate("2025-02-28"), reference).is_none());
        assert!(validate(&candidate("2025-03-02"), reference).is_none());
    }

    #[test]
    fn rejects_empty_fields_and_unknown_category() {
        let reference = day("2025-03-01");

        let mut c = candidate("2025-03-01");
        c.title = "  <p></p> ".to_string();
        assert!(validate(&c, reference).is_none());

        let mut c = candidate("2025-03-01");
        c.body = String::new();
        assert!(validate(&c, reference).is_none());

        let mut c = candidate("2025-03-01");
        c.category = "weather".to_string();
        assert!(validate(&c, reference).is_none());
    }

    #[test]
    fn invalid_topic_degrades_to_none() {
        let mut c = candidate("2025-03-01");
        c.topic_category = Some("horoscope".to_string());
        let item = validate(&c, day("2025-03-01")).unwrap();
        assert_eq!(item.topic_category, None);
    }
}
