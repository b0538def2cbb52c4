// src/collect/providers/mod.rs
pub mod generative;
pub mod regional;
pub mod search_api;

/// Hostname part of a URL, used as a fallback media attribution.
pub(crate) fn host_of(url: &str) -> Option<String> {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
}
