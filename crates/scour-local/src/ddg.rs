//! DuckDuckGo Lite search provider.
//!
//! The Lite frontend (`lite.duckduckgo.com/lite/`) serves a plain HTML table
//! and needs no API key, which makes it the default web provider. Result
//! links go through DDG's redirect endpoint; we unwrap the `uddg` parameter
//! so the cache holds real destination URLs.

use scour_core::{Error, Result, SearchHit, SearchProvider, SearchQuery, SearchResponse};

use crate::extract::norm_ws;
use crate::{env, timeout_ms_from_query};

#[derive(Debug, Clone)]
pub struct DdgLiteProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl DdgLiteProvider {
    pub fn new(client: reqwest::Client) -> Self {
        let endpoint = env("SCOUR_DDG_ENDPOINT")
            .unwrap_or_else(|| "https://lite.duckduckgo.com/lite/".to_string());
        Self { client, endpoint }
    }

    pub fn with_endpoint(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

fn unwrap_redirect(href: &str) -> String {
    let h = href.trim();
    // Lite emits scheme-relative redirect links ("//duckduckgo.com/l/?uddg=…").
    let candidate = if let Some(rest) = h.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        h.to_string()
    };
    if let Ok(u) = url::Url::parse(&candidate) {
        let is_ddg = u
            .domain()
            .is_some_and(|d| d == "duckduckgo.com" || d.ends_with(".duckduckgo.com"));
        if is_ddg && u.path().starts_with("/l/") {
            if let Some((_, target)) = u.query_pairs().find(|(k, _)| k == "uddg") {
                return target.to_string();
            }
        }
    }
    candidate
}

fn parse_lite_html(html: &str, max_results: usize) -> Vec<SearchHit> {
    let doc = html_scraper::Html::parse_document(html);
    let (Some(row_sel), Some(link_sel), Some(snippet_sel)) = (
        html_scraper::Selector::parse("tr").ok(),
        html_scraper::Selector::parse("a.result-link").ok(),
        html_scraper::Selector::parse("td.result-snippet").ok(),
    ) else {
        return Vec::new();
    };

    // Lite lays every result out as sibling table rows: a link row, then an
    // optional snippet row. Walking rows in order keeps each snippet attached
    // to its own result even when one result has no snippet row.
    let mut hits: Vec<SearchHit> = Vec::new();
    for row in doc.select(&row_sel) {
        if let Some(a) = row.select(&link_sel).next() {
            if hits.len() == max_results {
                break;
            }
            let Some(href) = a.value().attr("href") else {
                continue;
            };
            let url = unwrap_redirect(href);
            if url.is_empty() {
                continue;
            }
            let title = norm_ws(&a.text().collect::<String>());
            hits.push(SearchHit::web(hits.len(), title, url, String::new()));
        } else if let Some(td) = row.select(&snippet_sel).next() {
            if let Some(last) = hits.last_mut() {
                if last.snippet.is_empty() {
                    last.snippet = norm_ws(&td.text().collect::<String>());
                }
            }
        }
    }
    hits
}

#[async_trait::async_trait]
impl SearchProvider for DdgLiteProvider {
    fn name(&self) -> &'static str {
        "ddg"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let max_results = q.max_results.unwrap_or(10).min(20);
        let timeout_ms = timeout_ms_from_query(q);

        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("q", q.query.as_str())])
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("ddg lite HTTP {status}")));
        }
        let body = resp.text().await.map_err(|e| Error::Search(e.to_string()))?;

        Ok(SearchResponse {
            hits: parse_lite_html(&body, max_results),
            provider: "ddg".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LITE_FIXTURE: &str = r#"
    <html><body><table>
      <tr><td>1.</td><td><a rel="nofollow" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.rust-lang.org%2F&amp;rut=abc" class="result-link">Rust Programming Language</a></td></tr>
      <tr><td></td><td class="result-snippet">A language empowering everyone to build reliable software.</td></tr>
      <tr><td>2.</td><td><a rel="nofollow" href="https://doc.rust-lang.org/book/" class="result-link">The Rust Book</a></td></tr>
      <tr><td></td><td class="result-snippet">Affectionately nicknamed "the book".</td></tr>
    </table></body></html>"#;

    #[test]
    fn parses_lite_result_table() {
        let hits = parse_lite_html(LITE_FIXTURE, 10);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].rank, 0);
        assert_eq!(hits[0].title, "Rust Programming Language");
        assert_eq!(hits[0].url, "https://www.rust-lang.org/");
        assert!(hits[0].snippet.contains("reliable software"));
        assert_eq!(hits[1].rank, 1);
        assert_eq!(hits[1].url, "https://doc.rust-lang.org/book/");
    }

    #[test]
    fn respects_max_results() {
        let hits = parse_lite_html(LITE_FIXTURE, 1);
        assert_eq!(hits.len(), 1);
        // The accepted result still gets its own snippet row.
        assert!(hits[0].snippet.contains("reliable software"));
    }

    #[test]
    fn missing_snippet_row_does_not_shift_later_snippets() {
        let html = r#"
        <html><body><table>
          <tr><td>1.</td><td><a href="https://no-snippet.example/" class="result-link">No Snippet</a></td></tr>
          <tr><td>2.</td><td><a href="https://with-snippet.example/" class="result-link">With Snippet</a></td></tr>
          <tr><td></td><td class="result-snippet">Belongs to the second result.</td></tr>
        </table></body></html>"#;
        let hits = parse_lite_html(html, 10);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].snippet, "");
        assert_eq!(hits[1].snippet, "Belongs to the second result.");
    }

    #[test]
    fn unwraps_redirect_links() {
        assert_eq!(
            unwrap_redirect("//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fa%20b&rut=x"),
            "https://example.com/a b"
        );
        // Direct links pass through untouched.
        assert_eq!(
            unwrap_redirect("https://example.com/page"),
            "https://example.com/page"
        );
        // Non-DDG hosts never get the uddg treatment.
        assert_eq!(
            unwrap_redirect("https://evil.example/l/?uddg=https%3A%2F%2Fx"),
            "https://evil.example/l/?uddg=https%3A%2F%2Fx"
        );
    }

    #[tokio::test]
    async fn searches_against_fixture_server() {
        use axum::routing::get;

        let app = axum::Router::new().route(
            "/lite/",
            get(|| async { axum::response::Html(LITE_FIXTURE.to_string()) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let provider = DdgLiteProvider::with_endpoint(
            reqwest::Client::new(),
            format!("http://{addr}/lite/"),
        );
        let resp = provider
            .search(&SearchQuery::new("rust", 10))
            .await
            .unwrap();
        assert_eq!(resp.provider, "ddg");
        assert_eq!(resp.hits.len(), 2);
        assert_eq!(resp.hits[0].url, "https://www.rust-lang.org/");
    }
}
