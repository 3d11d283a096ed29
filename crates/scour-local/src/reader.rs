//! Fetch a URL and distill its main readable text.
//!
//! PDF URLs download over plain HTTP and go through the PDF text layer;
//! everything else renders in Playwright first, with a plain GET fallback
//! when the render backend is not configured.

use futures_util::StreamExt;

use scour_core::{Error, PageReader, Result};

use crate::extract::{html_main_to_text, looks_like_pdf, pdf_to_text};
use crate::render::render_html;
use crate::env;

const TEXT_WIDTH: usize = 80;

pub struct LocalPageReader {
    client: reqwest::Client,
    timeout_ms: u64,
    max_bytes: usize,
    max_chars: usize,
}

impl LocalPageReader {
    pub fn new(client: reqwest::Client) -> Self {
        let timeout_ms = env("SCOUR_FETCH_TIMEOUT_MS")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(20_000);
        let max_chars = env("SCOUR_PAGE_MAX_CHARS")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(20_000);
        Self {
            client,
            timeout_ms,
            max_bytes: 8 * 1024 * 1024,
            max_chars,
        }
    }

    async fn fetch_bytes(&self, url: &str) -> Result<(Vec<u8>, Option<String>)> {
        let resp = self
            .client
            .get(url)
            .timeout(std::time::Duration::from_millis(self.timeout_ms))
            .send()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Fetch(format!("GET {url} returned HTTP {status}")));
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let mut bytes = Vec::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::Fetch(e.to_string()))?;
            if bytes.len().saturating_add(chunk.len()) > self.max_bytes {
                let can_take = self.max_bytes.saturating_sub(bytes.len());
                bytes.extend_from_slice(&chunk[..can_take]);
                break;
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok((bytes, content_type))
    }

    fn bound(&self, text: String) -> String {
        match text.char_indices().nth(self.max_chars) {
            Some((byte_idx, _)) => {
                let mut out = text[..byte_idx].to_string();
                out.push_str("\n[truncated]");
                out
            }
            None => text,
        }
    }
}

fn is_pdf_url(url: &url::Url) -> bool {
    url.path().to_ascii_lowercase().ends_with(".pdf")
}

fn is_pdf_content_type(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("application/pdf"))
}

#[async_trait::async_trait]
impl PageReader for LocalPageReader {
    async fn read(&self, url: &str) -> Result<String> {
        let parsed = url::Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl(format!(
                "unsupported scheme {:?} in {url}",
                parsed.scheme()
            )));
        }

        if is_pdf_url(&parsed) {
            let (bytes, _) = self.fetch_bytes(url).await?;
            return Ok(self.bound(pdf_to_text(&bytes)?));
        }

        let html = match render_html(url, self.timeout_ms).await {
            Ok(page) => page.html,
            Err(Error::NotConfigured(reason)) => {
                tracing::debug!(%url, %reason, "render unavailable, falling back to plain fetch");
                let (bytes, content_type) = self.fetch_bytes(url).await?;
                if is_pdf_content_type(content_type.as_deref()) || looks_like_pdf(&bytes) {
                    return Ok(self.bound(pdf_to_text(&bytes)?));
                }
                String::from_utf8_lossy(&bytes).to_string()
            }
            Err(e) => return Err(e),
        };

        let text = html_main_to_text(&html, TEXT_WIDTH);
        if text.is_empty() {
            return Err(Error::Fetch(format!("no readable text at {url}")));
        }
        Ok(self.bound(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader() -> LocalPageReader {
        LocalPageReader {
            client: reqwest::Client::new(),
            timeout_ms: 2_000,
            max_bytes: 1024 * 1024,
            max_chars: 50,
        }
    }

    #[test]
    fn bounds_output_on_char_boundaries() {
        let r = reader();
        let long = "é".repeat(200);
        let out = r.bound(long);
        assert!(out.ends_with("[truncated]"));
        assert_eq!(out.chars().take_while(|c| *c == 'é').count(), 50);

        let short = r.bound("fits".to_string());
        assert_eq!(short, "fits");
    }

    #[test]
    fn classifies_pdf_urls() {
        let u = url::Url::parse("https://arxiv.org/pdf/2401.01234v1.PDF").unwrap();
        assert!(is_pdf_url(&u));
        let u = url::Url::parse("https://example.com/page?x=a.pdf").unwrap();
        assert!(!is_pdf_url(&u));
    }

    #[tokio::test]
    async fn rejects_non_http_schemes() {
        let err = reader().read("ftp://example.com/x").await.unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
        let err = reader().read("not a url").await.unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn plain_fetch_fallback_distills_html() {
        use axum::routing::get;

        let _lock = crate::ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::set_var("SCOUR_RENDER_DISABLE", "1");

        let app = axum::Router::new().route(
            "/page",
            get(|| async {
                axum::response::Html(
                    "<html><body><article><p>Fallback fetch still distills the page \
                     body into readable text for the model.</p></article></body></html>",
                )
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let out = reader().read(&format!("http://{addr}/page")).await;
        std::env::remove_var("SCOUR_RENDER_DISABLE");
        let out = out.unwrap();
        assert!(out.contains("Fallback fetch"));
    }
}
