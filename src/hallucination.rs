// src/hallucination.rs
//! Heuristic scorer for fabricated ("hallucinated") article content.
//!
//! Generative sources occasionally invent articles out of whole cloth. The
//! tells are mundane: implausible lengths, copy-paste loops, AI-disclosure
//! vocabulary, and the classic one, a quoted work title paired with a crisp
//! audience statistic that no real outlet reported. Each signal adds a fixed
//! penalty; an item at or above [`SUSPICIOUS_THRESHOLD`] is dropped before
//! translation or dedup ever see it.
//!
//! Pure function, no IO. Callers log the collected reasons.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

pub const SUSPICIOUS_THRESHOLD: u32 = 30;

const W_TITLE_LENGTH: u32 = 15;
const W_BODY_LENGTH: u32 = 15;
const W_REPEATED_SUBSTRING: u32 = 20;
const W_AI_KEYWORD: u32 = 10;
const W_WORD_SKEW: u32 = 15;
const W_LOW_ALNUM: u32 = 20;
const W_THIN_ATTRIBUTION: u32 = 10;
const W_LOW_PUNCTUATION: u32 = 15;
const W_FIRST_SENTENCE_LOOP: u32 = 15;
const W_QUOTED_TITLE_STAT: u32 = 25;
const W_ENTERTAINMENT_STAT: u32 = 15;
const W_YEAR_STAT_QUOTED: u32 = 20;

/// Disclosure vocabulary that real newsroom copy does not contain.
const AI_TELL_KEYWORDS: &[&str] = &[
    "generated",
    "as an ai",
    "language model",
    "sample",
    "example article",
    "lorem ipsum",
    "test",
    "placeholder",
    "생성된",
    "생성형",
    "샘플",
    "테스트",
    "예시",
];

const ENTERTAINMENT_KEYWORDS: &[&str] = &[
    "드라마",
    "영화",
    "배우",
    "가수",
    "아이돌",
    "시청률",
    "음원",
    "콘서트",
    "팬덤",
    "drama",
    "movie",
    "actor",
    "idol",
    "box office",
];

// Quoted work title: ASCII quotes (normalization folds curly quotes into
// these) plus the CJK title brackets.
static RE_QUOTED_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""[^"]{2,60}"|'[^']{2,60}'|「[^」]{1,60}」|『[^』]{1,60}』|《[^》]{1,60}》"#)
        .unwrap()
});

// Audience/revenue statistic patterns, e.g. "300만 명", "1.2억 원", "45%".
static RE_STATISTIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d+(?:[.,]\d+)?\s*(?:만\s*명|만명|억\s*원|억원|만\s*원|만원|%|퍼센트|million|billion)")
        .unwrap()
});

static RE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:19|20)\d{2}년?").unwrap());

/// Scoring outcome. Derived per candidate, never persisted.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HallucinationScore {
    pub score: u32,
    pub suspicious: bool,
    pub reasons: Vec<String>,
}

/// Score one candidate. Signals are additive and the result clamps to 100,
/// so adding a signal to otherwise-identical input can never lower the score.
pub fn score(title: &str, body: &str, source_media: &str) -> HallucinationScore {
    let mut score = 0u32;
    let mut reasons: Vec<String> = Vec::new();

    let add = |points: u32, reason: &str, acc: &mut Vec<String>| {
        acc.push(reason.to_string());
        points
    };

    let title_chars = title.chars().count();
    if title_chars < 10 || title_chars > 200 {
        score += add(W_TITLE_LENGTH, "title_length_outlier", &mut reasons);
    }

    let body_chars = body.chars().count();
    if body_chars < 100 || body_chars > 10_000 {
        score += add(W_BODY_LENGTH, "body_length_outlier", &mut reasons);
    }

    if has_repeated_substring(body) {
        score += add(W_REPEATED_SUBSTRING, "repeated_substring", &mut reasons);
    }

    let lowered = body.to_lowercase();
    let tells = AI_TELL_KEYWORDS
        .iter()
        .filter(|k| lowered.contains(*k))
        .count() as u32;
    if tells > 0 {
        score += tells * W_AI_KEYWORD;
        reasons.push(format!("ai_keywords:{tells}"));
    }

    if has_word_skew(body) {
        score += add(W_WORD_SKEW, "word_frequency_skew", &mut reasons);
    }

    if body_chars > 50 && alnum_ratio(body) < 0.50 {
        score += add(W_LOW_ALNUM, "low_alphanumeric_ratio", &mut reasons);
    }

    if source_media.trim().chars().count() < 2 {
        score += add(W_THIN_ATTRIBUTION, "thin_attribution", &mut reasons);
    }

    if body_chars > 500 && punctuation_density(body) < 0.005 {
        score += add(W_LOW_PUNCTUATION, "low_punctuation_density", &mut reasons);
    }

    if first_sentence_loops(body) {
        score += add(W_FIRST_SENTENCE_LOOP, "first_sentence_repeated", &mut reasons);
    }

    let quoted = RE_QUOTED_TITLE.is_match(title) || RE_QUOTED_TITLE.is_match(body);
    let stat = RE_STATISTIC.is_match(body);
    let year = RE_YEAR.is_match(body);

    if quoted && stat {
        score += add(W_QUOTED_TITLE_STAT, "quoted_title_with_statistic", &mut reasons);
    }
    if stat && contains_any(&lowered, ENTERTAINMENT_KEYWORDS) {
        score += add(W_ENTERTAINMENT_STAT, "entertainment_with_statistic", &mut reasons);
    }
    if quoted && stat && year {
        score += add(W_YEAR_STAT_QUOTED, "year_statistic_quoted_combo", &mut reasons);
    }

    let score = score.min(100);
    HallucinationScore {
        score,
        suspicious: score >= SUSPICIOUS_THRESHOLD,
        reasons,
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// A >10-char substring occurring 3+ times. Windows of 15 chars at a stride
/// of 5, limited to the first 3000 chars so pathological bodies stay cheap.
fn has_repeated_substring(body: &str) -> bool {
    let chars: Vec<char> = body.chars().take(3000).collect();
    const WIN: usize = 15;
    const STRIDE: usize = 5;
    if chars.len() < WIN {
        return false;
    }
    let mut start = 0usize;
    while start + WIN <= chars.len() {
        let window: String = chars[start..start + WIN].iter().collect();
        // Skip windows that are mostly whitespace.
        if window.chars().filter(|c| !c.is_whitespace()).count() > 10
            && body.matches(&window).count() >= 3
        {
            return true;
        }
        start += STRIDE;
    }
    false
}

/// One word hogging >15% of all body tokens (only meaningful past ~20 tokens).
fn has_word_skew(body: &str) -> bool {
    let tokens: Vec<&str> = body.split_whitespace().collect();
    if tokens.len() < 20 {
        return false;
    }
    let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    for t in &tokens {
        *counts.entry(t.to_lowercase()).or_default() += 1;
    }
    let max = counts.values().copied().max().unwrap_or(0);
    (max as f64) / (tokens.len() as f64) > 0.15
}

/// Share of alphanumeric chars among non-whitespace chars. Hangul counts as
/// alphabetic, so normal Korean copy sits well above 0.5.
fn alnum_ratio(body: &str) -> f64 {
    let mut total = 0usize;
    let mut alnum = 0usize;
    for c in body.chars() {
        if c.is_whitespace() {
            continue;
        }
        total += 1;
        if c.is_alphanumeric() {
            alnum += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }
    alnum as f64 / total as f64
}

fn punctuation_density(body: &str) -> f64 {
    let total = body.chars().count();
    if total == 0 {
        return 0.0;
    }
    let punct = body
        .chars()
        .filter(|c| matches!(c, '.' | '!' | '?' | '。'))
        .count();
    punct as f64 / total as f64
}

fn split_sentences(body: &str) -> Vec<&str> {
    body.split(['.', '!', '?', '。'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// First sentence appearing in >30% of all sentences (4+ sentences needed).
fn first_sentence_loops(body: &str) -> bool {
    let sentences = split_sentences(body);
    if sentences.len() < 4 {
        return false;
    }
    let first = sentences[0];
    let repeats = sentences.iter().filter(|&&s| s == first).count();
    (repeats as f64) / (sentences.len() as f64) > 0.30
}
