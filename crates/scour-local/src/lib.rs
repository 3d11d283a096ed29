//! Local collaborators for scour: reqwest-backed search providers, the
//! Node/Playwright page renderer, HTML/PDF text distillation, and the
//! streaming OpenAI-compatible chat client.

use std::time::Duration;

use scour_core::{Error, Result, SearchQuery};

pub mod arxiv;
pub mod ddg;
pub mod extract;
pub mod openai_compat;
pub mod reader;
pub mod render;
pub mod searxng;

pub(crate) fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub(crate) fn env_truthy(key: &str) -> bool {
    matches!(
        env(key).unwrap_or_default().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

pub(crate) fn timeout_ms_from_query(q: &SearchQuery) -> u64 {
    // Provider requests can hang indefinitely without an explicit timeout.
    // Keep a conservative cap even if callers pass something huge.
    q.timeout_ms.unwrap_or(20_000).clamp(1_000, 60_000)
}

// Env vars are process-global; tests that mutate them share this lock.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Shared client for search/fetch traffic. The chat client builds its own:
/// a whole-request timeout would cut long completion streams short.
pub fn default_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent("scour/0.1")
        .redirect(reqwest::redirect::Policy::limited(10))
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| Error::Fetch(e.to_string()))
}
