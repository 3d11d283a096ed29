//! Academic search via the arXiv Atom API.
//!
//! Results carry authors, publication date, and a PDF URL so a follow-up
//! `click` can go straight to the paper body.

use scour_core::{Error, Result, SearchHit, SearchProvider, SearchQuery, SearchResponse};

use crate::extract::norm_ws;
use crate::{env, timeout_ms_from_query};

#[derive(Debug, Clone)]
pub struct ArxivProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl ArxivProvider {
    pub fn new(client: reqwest::Client) -> Self {
        let endpoint = env("SCOUR_ARXIV_ENDPOINT")
            .unwrap_or_else(|| "https://export.arxiv.org/api/query".to_string());
        Self { client, endpoint }
    }

    pub fn with_endpoint(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

fn arxiv_id_from_abs_url(url: &str) -> Option<&str> {
    // e.g. http://arxiv.org/abs/2401.01234v1
    let i = url.rfind("/abs/")?;
    let id = url[i + "/abs/".len()..].trim_matches('/');
    (!id.is_empty()).then_some(id)
}

pub fn arxiv_pdf_url(id: &str) -> String {
    format!("https://arxiv.org/pdf/{}.pdf", id.trim())
}

fn build_search_query(query: &str) -> String {
    // ArXiv query syntax: `all:term`, phrases quoted.
    let q = query.trim();
    if q.contains(' ') {
        format!("all:\"{}\"", q.replace('"', ""))
    } else {
        format!("all:{q}")
    }
}

#[derive(Default)]
struct EntryState {
    id_url: String,
    title: String,
    summary: String,
    published: Option<String>,
    authors: Vec<String>,
    pdf_url: Option<String>,
    in_entry: bool,
    in_author: bool,
    text: String,
}

fn pdf_link_href(e: &quick_xml::events::BytesStart) -> Option<String> {
    let mut rel = None;
    let mut ty = None;
    let mut href = None;
    for a in e.attributes().flatten() {
        let k = String::from_utf8_lossy(a.key.as_ref()).to_string();
        let v = a.unescape_value().map(|v| v.to_string()).unwrap_or_default();
        match k.as_str() {
            "rel" => rel = Some(v),
            "type" => ty = Some(v),
            "href" => href = Some(v),
            _ => {}
        }
    }
    if rel.as_deref() == Some("related") && ty.as_deref() == Some("application/pdf") {
        href
    } else {
        None
    }
}

/// Pull-parse the Atom feed. quick-xml because Atom namespaces make regex
/// parsing brittle; unknown elements are skipped rather than rejected.
fn parse_atom(body: &str, max_results: usize) -> Vec<SearchHit> {
    let mut reader = quick_xml::Reader::from_str(body);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut hits: Vec<SearchHit> = Vec::new();
    let mut cur = EntryState::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Eof) => break,
            Ok(quick_xml::events::Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name.ends_with("entry") {
                    cur = EntryState {
                        in_entry: true,
                        ..EntryState::default()
                    };
                } else if cur.in_entry && name.ends_with("author") {
                    cur.in_author = true;
                } else if cur.in_entry && name.ends_with("link") {
                    if let Some(href) = pdf_link_href(&e) {
                        cur.pdf_url = Some(href);
                    }
                }
            }
            Ok(quick_xml::events::Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if cur.in_entry && name.ends_with("link") {
                    if let Some(href) = pdf_link_href(&e) {
                        cur.pdf_url = Some(href);
                    }
                }
            }
            Ok(quick_xml::events::Event::Text(t)) => {
                if cur.in_entry {
                    let txt = t.unescape().map(|t| t.to_string()).unwrap_or_default();
                    cur.text.push_str(&txt);
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if !cur.in_entry {
                    buf.clear();
                    continue;
                }
                let txt = norm_ws(&cur.text);
                if name.ends_with("id") {
                    cur.id_url = txt;
                } else if name.ends_with("title") {
                    cur.title = txt;
                } else if name.ends_with("summary") {
                    cur.summary = txt;
                } else if name.ends_with("published") {
                    // Keep the date only; the time of day is noise here.
                    cur.published =
                        (!txt.is_empty()).then(|| txt.split('T').next().unwrap_or(&txt).to_string());
                } else if cur.in_author && name.ends_with("name") && !txt.is_empty() {
                    cur.authors.push(txt);
                }
                cur.text.clear();

                if name.ends_with("author") {
                    cur.in_author = false;
                } else if name.ends_with("entry") {
                    cur.in_entry = false;
                    if !cur.id_url.is_empty() && hits.len() < max_results {
                        let pdf_url = cur.pdf_url.take().or_else(|| {
                            arxiv_id_from_abs_url(&cur.id_url).map(arxiv_pdf_url)
                        });
                        hits.push(SearchHit {
                            rank: hits.len(),
                            title: std::mem::take(&mut cur.title),
                            url: std::mem::take(&mut cur.id_url),
                            snippet: std::mem::take(&mut cur.summary),
                            authors: std::mem::take(&mut cur.authors),
                            published: cur.published.take(),
                            pdf_url,
                        });
                    }
                }
            }
            Ok(_) => {}
            Err(_) => break,
        }
        buf.clear();
    }

    hits
}

#[async_trait::async_trait]
impl SearchProvider for ArxivProvider {
    fn name(&self) -> &'static str {
        "arxiv"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let max_results = q.max_results.unwrap_or(10).min(20);
        let timeout_ms = timeout_ms_from_query(q);

        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("search_query", build_search_query(&q.query).as_str()),
                ("start", "0"),
                ("max_results", &max_results.to_string()),
                ("sortBy", "relevance"),
            ])
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("arxiv search HTTP {status}")));
        }
        let body = resp.text().await.map_err(|e| Error::Search(e.to_string()))?;

        Ok(SearchResponse {
            hits: parse_atom(&body, max_results),
            provider: "arxiv".to_string(),
        })
    }
}
