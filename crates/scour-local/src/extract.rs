//! HTML and PDF to readable plain text.
//!
//! Deliberately "good enough" and deterministic, not a full readability
//! engine: a main-content pick by link density plus html2text, and
//! pdf-extract for PDF bodies.

use std::io::Cursor;

use scour_core::{Error, Result};

pub(crate) fn norm_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn has_any_text(s: &str) -> bool {
    s.chars().any(|c| !c.is_whitespace())
}

/// Convert raw HTML to plain text. Callers bound the output themselves.
pub fn html_to_text(html: &str, width: usize) -> String {
    // html2text expects bytes; Cursor avoids allocating a second large buffer.
    html2text::from_read(Cursor::new(html.as_bytes()), width).unwrap_or_else(|_| html.to_string())
}

fn class_or_id_lc(el: &html_scraper::ElementRef) -> String {
    let mut out = String::new();
    if let Some(c) = el.value().attr("class") {
        out.push_str(c);
        out.push(' ');
    }
    if let Some(i) = el.value().attr("id") {
        out.push_str(i);
    }
    out.to_ascii_lowercase()
}

fn is_boilerplate_container(el: &html_scraper::ElementRef) -> bool {
    // Structural UI words only; no site-specific heuristics.
    let s = class_or_id_lc(el);
    if s.is_empty() {
        return false;
    }
    [
        "nav", "navbar", "menu", "sidebar", "footer", "header", "banner", "cookie", "consent",
        "ads", "advert", "promo", "subscribe", "newsletter",
    ]
    .iter()
    .any(|bad| s.contains(bad))
}

fn element_text_chars(el: &html_scraper::ElementRef) -> usize {
    el.text().map(|t| t.chars().count()).sum()
}

fn element_link_text_chars(el: &html_scraper::ElementRef) -> usize {
    let Some(sel) = html_scraper::Selector::parse("a").ok() else {
        return 0;
    };
    el.select(&sel)
        .map(|a| a.text().map(|t| t.chars().count()).sum::<usize>())
        .sum()
}

fn pick_main_html(html: &str) -> Option<String> {
    let doc = html_scraper::Html::parse_document(html);
    let sel = html_scraper::Selector::parse("article, main, section, div").ok()?;

    let mut best_score: i64 = 0;
    let mut best_html: Option<String> = None;
    for el in doc.select(&sel).take(20_000) {
        if is_boilerplate_container(&el) {
            continue;
        }
        let txt = element_text_chars(&el);
        if txt < 20 {
            continue;
        }
        let link_txt = element_link_text_chars(&el);
        // Prefer dense non-link text; link text is usually navigation.
        let mut score = txt as i64 - 2 * (link_txt as i64);
        match el.value().name() {
            "article" => score += 500,
            "main" => score += 300,
            _ => {}
        }
        if link_txt > txt / 2 {
            score -= 500;
        }
        if score > best_score {
            best_score = score;
            best_html = Some(el.html());
        }
    }
    best_html
}

/// Distill the main readable text of a page: pick the densest content
/// container, fall back to whole-document conversion when nothing scores.
pub fn html_main_to_text(html: &str, width: usize) -> String {
    if let Some(main) = pick_main_html(html) {
        let text = html_to_text(&main, width);
        if has_any_text(&text) {
            return text.trim().to_string();
        }
    }
    html_to_text(html, width).trim().to_string()
}

/// Extract text from an in-memory PDF body. Quality varies by PDF
/// (text layer vs scanned images); an empty text layer is an error so
/// callers never mistake a scan for a successful read.
pub fn pdf_to_text(bytes: &[u8]) -> Result<String> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| Error::Fetch(format!("pdf extraction failed: {e}")))?;
    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(Error::Fetch("pdf has no extractable text layer".to_string()));
    }
    Ok(text)
}

pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}
