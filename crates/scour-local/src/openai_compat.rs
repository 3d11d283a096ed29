//! Streaming client for OpenAI-compatible `/v1/chat/completions` endpoints
//! (llama.cpp server, vLLM, OpenAI itself).
//!
//! Completions stream as SSE delta events; each content fragment goes to the
//! caller's observer as it arrives and the full turn text is returned once
//! the stream ends. Transport and protocol failures are `Error::Llm`, the
//! one fatal error class in a conversation.

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use scour_core::{ChatBackend, ChatMessage, Error, FragmentObserver, Result};

use crate::env;

const DEFAULT_BASE_URL: &str = "http://localhost:8080/v1";
const DEFAULT_TEMPERATURE: f64 = 0.95;
const DEFAULT_TOP_P: f64 = 0.7;

#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f64,
    top_p: f64,
}

impl OpenAiCompatClient {
    pub fn from_env(model_override: Option<String>) -> Result<Self> {
        let base_url = env("SCOUR_OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let api_key = env("SCOUR_OPENAI_API_KEY");
        let model = model_override
            .or_else(|| env("SCOUR_OPENAI_MODEL"))
            .ok_or_else(|| {
                Error::NotConfigured(
                    "missing model (set --model or SCOUR_OPENAI_MODEL)".to_string(),
                )
            })?;

        // No whole-request timeout: a completion stream legitimately runs for
        // minutes. Connect timeout still bounds an unreachable endpoint.
        let client = reqwest::Client::builder()
            .user_agent("scour/0.1")
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Llm(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key,
            model,
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
        })
    }

    pub fn with_sampling(mut self, temperature: f64, top_p: f64) -> Self {
        self.temperature = temperature;
        self.top_p = top_p;
        self
    }

    fn endpoint_chat_completions(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionsRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    top_p: f64,
    stream: bool,
}

#[derive(Debug, PartialEq)]
enum SseEvent {
    Content(String),
    Done,
}

/// One SSE line in the OpenAI delta format. Keep-alives and unknown fields
/// yield `None`; a malformed `data:` payload is a protocol error.
fn parse_sse_line(line: &str) -> Result<Option<SseEvent>> {
    if line.is_empty() || line.starts_with(':') {
        return Ok(None);
    }
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(Some(SseEvent::Done));
    }

    let v: serde_json::Value =
        serde_json::from_str(data).map_err(|e| Error::Llm(format!("bad SSE payload: {e}")))?;
    if let Some(content) = v
        .pointer("/choices/0/delta/content")
        .and_then(|x| x.as_str())
    {
        if !content.is_empty() {
            return Ok(Some(SseEvent::Content(content.to_string())));
        }
    }
    if v.pointer("/choices/0/finish_reason")
        .and_then(|x| x.as_str())
        .is_some()
    {
        return Ok(Some(SseEvent::Done));
    }
    Ok(None)
}

#[async_trait::async_trait]
impl ChatBackend for OpenAiCompatClient {
    async fn complete(
        &self,
        transcript: &[ChatMessage],
        on_fragment: FragmentObserver<'_>,
    ) -> Result<String> {
        let req = ChatCompletionsRequest {
            model: &self.model,
            messages: transcript,
            temperature: self.temperature,
            top_p: self.top_p,
            stream: true,
        };

        let mut rb = self
            .client
            .post(self.endpoint_chat_completions())
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(k) = &self.api_key {
            rb = rb.header(reqwest::header::AUTHORIZATION, format!("Bearer {k}"));
        }

        let resp = rb
            .json(&req)
            .send()
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Llm(format!("chat.completions HTTP {status}")));
        }

        let mut full = String::new();
        let mut pending = String::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::Llm(e.to_string()))?;
            pending.push_str(&String::from_utf8_lossy(&chunk));
            while let Some(pos) = pending.find('\n') {
                let line = pending[..pos].trim_end_matches('\r').to_string();
                pending.drain(..=pos);
                match parse_sse_line(&line)? {
                    Some(SseEvent::Content(fragment)) => {
                        on_fragment(&fragment);
                        full.push_str(&fragment);
                    }
                    Some(SseEvent::Done) => return Ok(full.trim().to_string()),
                    None => {}
                }
            }
        }
        // Stream ended without [DONE]; accept what we have.
        Ok(full.trim().to_string())
    }
}
