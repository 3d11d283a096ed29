//! Routes a parsed tool call to one of the fixed tool operations.
//!
//! Every failure comes back as an `Err` variant the loop renders into the
//! tool_output fence; the model sees its own mistake and can correct course
//! on the next turn.

use scour_core::protocol::{render_hits, ToolCall};
use scour_core::{Error, PageReader, Result, SearchProvider, SearchQuery};

use crate::session::Session;

pub const DEFAULT_RESULT_COUNT: usize = 10;

pub struct ToolSet {
    pub web: Box<dyn SearchProvider>,
    pub academic: Box<dyn SearchProvider>,
    pub reader: Box<dyn PageReader>,
}

pub async fn dispatch(call: &ToolCall, session: &mut Session, tools: &ToolSet) -> Result<String> {
    match call.name.as_str() {
        "search" => run_search(tools.web.as_ref(), call, session).await,
        "search_arxiv" => run_search(tools.academic.as_ref(), call, session).await,
        "click" => run_click(call, session, tools).await,
        "open" => {
            let url = call
                .str_arg("url")
                .ok_or_else(|| Error::Usage("open() requires a url argument".to_string()))?;
            tools.reader.read(url).await
        }
        // The loop intercepts finish() before dispatch; it has no observation.
        other => Err(Error::Usage(format!("unsupported function: {other:?}"))),
    }
}

async fn run_search(
    provider: &dyn SearchProvider,
    call: &ToolCall,
    session: &mut Session,
) -> Result<String> {
    let query = call.str_arg("query").ok_or_else(|| {
        Error::Usage(format!("{}() requires a query argument", call.name))
    })?;
    let k = match call.args.get("k") {
        None => DEFAULT_RESULT_COUNT,
        Some(v) => v
            .as_usize()
            .ok_or_else(|| Error::Usage("k must be a non-negative integer".to_string()))?,
    };

    let resp = provider.search(&SearchQuery::new(query, k)).await?;
    tracing::info!(
        provider = provider.name(),
        query,
        hits = resp.hits.len(),
        "search completed"
    );

    let mut hits = resp.hits;
    // Ranks are positions in this result set, whatever the provider said.
    for (i, h) in hits.iter_mut().enumerate() {
        h.rank = i;
    }
    let rendered = if hits.is_empty() {
        format!("No results for {query:?}.")
    } else {
        render_hits(&hits)
    };
    session.replace_results(hits);
    Ok(rendered)
}

async fn run_click(call: &ToolCall, session: &mut Session, tools: &ToolSet) -> Result<String> {
    let rank = match call.args.get("rank") {
        None => 0,
        Some(v) => v
            .as_usize()
            .ok_or_else(|| Error::Usage("rank must be a non-negative integer".to_string()))?,
    };
    let results = session.results();
    if results.is_empty() {
        return Err(Error::Usage(
            "click() called before any search()".to_string(),
        ));
    }
    if rank >= results.len() {
        return Err(Error::Usage(format!(
            "rank must be 0-{}",
            results.len() - 1
        )));
    }
    let hit = &results[rank];
    // Papers read better from their PDF than from the abstract page.
    let target = hit.pdf_url.as_deref().unwrap_or(&hit.url).to_string();
    tracing::info!(rank, url = %target, "clicking result");
    tools.reader.read(&target).await
}
