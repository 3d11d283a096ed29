use serde::{Deserialize, Serialize};

pub mod protocol;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("search failed: {0}")]
    Search(String),
    #[error("llm failed: {0}")]
    Llm(String),
    #[error("bad tool call: {0}")]
    Parse(String),
    #[error("usage error: {0}")]
    Usage(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
}

impl Error {
    /// Only completion-service failures abort a conversation; everything else
    /// is surfaced back to the model as an observation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Llm(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One transcript entry. Immutable once appended; the wire shape matches
/// OpenAI-style chat completions (`{"role": ..., "content": ...}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A rank-addressable search result. Web providers leave the academic
/// fields empty; the arXiv variant fills them in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub rank: usize,
    pub title: String,
    pub url: String,
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
}

impl SearchHit {
    pub fn web(rank: usize, title: impl Into<String>, url: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            rank,
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
            authors: Vec::new(),
            published: None,
            pdf_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub max_results: Option<usize>,
    pub timeout_ms: Option<u64>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>, max_results: usize) -> Self {
        Self {
            query: query.into(),
            max_results: Some(max_results),
            timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    pub provider: String,
}

#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse>;
}

/// Fetches a URL and distills its main readable text.
#[async_trait::async_trait]
pub trait PageReader: Send + Sync {
    async fn read(&self, url: &str) -> Result<String>;
}

/// Incremental display hook for streamed completions. Purely observational:
/// the returned turn text is always the full accumulated stream.
pub type FragmentObserver<'a> = &'a (dyn Fn(&str) + Send + Sync);

#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// Produce one assistant turn over the transcript. Fragments are handed
    /// to `on_fragment` in arrival order; the return value is the trimmed
    /// concatenation of all fragments.
    async fn complete(
        &self,
        transcript: &[ChatMessage],
        on_fragment: FragmentObserver<'_>,
    ) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_message_wire_shape() {
        let m = ChatMessage::system("be helpful");
        let js = serde_json::to_value(&m).unwrap();
        assert_eq!(js["role"], "system");
        assert_eq!(js["content"], "be helpful");

        let back: ChatMessage = serde_json::from_str(r#"{"role":"assistant","content":"hi"}"#).unwrap();
        assert_eq!(back.role, Role::Assistant);
    }

    #[test]
    fn only_llm_errors_are_fatal() {
        assert!(Error::Llm("boom".into()).is_fatal());
        for e in [
            Error::InvalidUrl("x".into()),
            Error::Fetch("x".into()),
            Error::Search("x".into()),
            Error::Parse("x".into()),
            Error::Usage("x".into()),
            Error::NotConfigured("x".into()),
        ] {
            assert!(!e.is_fatal(), "{e} should be recoverable");
        }
    }

    #[test]
    fn web_hit_has_no_academic_fields() {
        let h = SearchHit::web(0, "t", "https://example.com", "s");
        let js = serde_json::to_value(&h).unwrap();
        assert!(js.get("authors").is_none());
        assert!(js.get("pdf_url").is_none());
    }
}
