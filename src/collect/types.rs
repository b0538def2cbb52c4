// src/collect/types.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::SourceError;

/// Raw article record as returned by a source adapter, before validation.
/// Category and topic are loose strings here; the validator turns them into
/// the closed enums below (or rejects the item).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,
    pub body: String,
    pub source_country: String,
    pub source_media: String,
    pub category: String,
    pub topic_category: Option<String>,
    pub published_date: NaiveDate,
    pub canonical_link: Option<String>,
}

/// Top-level news bucket. Closed set; anything else is rejected at the
/// validation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Domestic,
    Foreign,
    Related,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Domestic, Category::Foreign, Category::Related];

    /// Accepts the canonical lowercase names plus the Korean aliases the
    /// upstream feeds use. Unknown values yield `None`, never a fallback.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "domestic" | "국내" => Some(Category::Domestic),
            "foreign" | "overseas" | "해외" => Some(Category::Foreign),
            "related" | "관련" => Some(Category::Related),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Domestic => "domestic",
            Category::Foreign => "foreign",
            Category::Related => "related",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Secondary subject classification. Optional; invalid values become `None`
/// rather than being coerced into a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicCategory {
    Science,
    Technology,
    Politics,
    Economy,
    Society,
    Culture,
    Entertainment,
    Sports,
}

impl TopicCategory {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "science" | "과학" => Some(TopicCategory::Science),
            "technology" | "tech" | "기술" => Some(TopicCategory::Technology),
            "politics" | "정치" => Some(TopicCategory::Politics),
            "economy" | "경제" => Some(TopicCategory::Economy),
            "society" | "사회" => Some(TopicCategory::Society),
            "culture" | "문화" => Some(TopicCategory::Culture),
            "entertainment" | "연예" => Some(TopicCategory::Entertainment),
            "sports" | "스포츠" => Some(TopicCategory::Sports),
            _ => None,
        }
    }
}

/// Candidate that passed validation: typed category/topic, published date
/// forced to the run's reference day, text normalized. Translation fills
/// `translated_body` / `translation_failed` later in the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedItem {
    pub title: String,
    pub body: String,
    pub translated_body: Option<String>,
    pub source_country: String,
    pub source_media: String,
    pub category: Category,
    pub topic_category: Option<TopicCategory>,
    pub published_date: NaiveDate,
    pub canonical_link: Option<String>,
    pub translation_failed: bool,
}

impl NormalizedItem {
    /// Body text in the target language: the translation when one exists,
    /// the original otherwise.
    pub fn effective_body(&self) -> &str {
        self.translated_body.as_deref().unwrap_or(&self.body)
    }
}

/// Per-category fill state for one run.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct CategoryQuota {
    pub category: Category,
    pub target: usize,
    pub collected: usize,
}

impl CategoryQuota {
    pub fn new(category: Category, target: usize) -> Self {
        Self {
            category,
            target,
            collected: 0,
        }
    }

    pub fn deficit(&self) -> usize {
        self.target.saturating_sub(self.collected)
    }

    pub fn is_full(&self) -> bool {
        self.collected >= self.target
    }
}

/// Structured result of one collection run. Always returned, even when some
/// categories stay under target; a shortfall is reported, never raised.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub reference_date: NaiveDate,
    pub success: usize,
    pub failed: usize,
    pub skipped_as_duplicate: usize,
    pub total: usize,
    pub per_category: Vec<CategoryQuota>,
    pub translation_failures: usize,
}

impl RunReport {
    pub fn fully_collected(&self) -> bool {
        self.per_category.iter().all(|q| q.is_full())
    }
}

/// A source adapter: one upstream provider of raw candidates.
///
/// `fetch` asks for up to `limit` articles for `date` and `category`.
/// Providers apply their own pre-filtering (date match, minimum body length)
/// and must surface rate limiting as `SourceError::RateLimited` so the
/// orchestrator can back off this source without aborting the others.
#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch(
        &self,
        date: NaiveDate,
        category: Category,
        limit: usize,
    ) -> Result<Vec<Candidate>, SourceError>;

    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parse_accepts_aliases_and_rejects_unknown() {
        assert_eq!(Category::parse("domestic"), Some(Category::Domestic));
        assert_eq!(Category::parse(" 해외 "), Some(Category::Foreign));
        assert_eq!(Category::parse("RELATED"), Some(Category::Related));
        assert_eq!(Category::parse("sports"), None);
        assert_eq!(Category::parse(""), None);
    }

    #[test]
    fn topic_parse_is_optional_and_strict() {
        assert_eq!(TopicCategory::parse("과학"), Some(TopicCategory::Science));
        assert_eq!(TopicCategory::parse("Tech"), Some(TopicCategory::Technology));
        assert_eq!(TopicCategory::parse("weather"), None);
    }

    #[test]
    fn quota_deficit_saturates() {
        let mut q = CategoryQuota::new(Category::Domestic, 10);
        assert_eq!(q.deficit(), 10);
        q.collected = 10;
        assert!(q.is_full());
        q.collected = 12;
        assert_eq!(q.deficit(), 0);
    }
}
