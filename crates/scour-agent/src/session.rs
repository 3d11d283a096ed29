//! Per-conversation state: the transcript, the rank-addressable result
//! cache, and the turn counter. One session per conversation, owned by the
//! loop and handed to the dispatcher by reference — there is no global
//! state, so concurrent sessions cannot cross-talk.

use scour_core::{ChatMessage, SearchHit};

pub struct Session {
    transcript: Vec<ChatMessage>,
    results: Vec<SearchHit>,
    turns: u32,
}

impl Session {
    /// Transcript starts with exactly one system message followed by the
    /// initial user query, and is append-only from then on.
    pub fn new(system_prompt: &str, initial_query: &str) -> Self {
        Self {
            transcript: vec![
                ChatMessage::system(system_prompt),
                ChatMessage::user(initial_query),
            ],
            results: Vec::new(),
            turns: 0,
        }
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.transcript.push(ChatMessage::assistant(content));
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.transcript.push(ChatMessage::user(content));
    }

    /// The most recent search's ordered results; `click` ranks index here.
    pub fn results(&self) -> &[SearchHit] {
        &self.results
    }

    /// Replaces the whole result set in one assignment. Only search-like
    /// operations call this; nothing else mutates the cache.
    pub fn replace_results(&mut self, hits: Vec<SearchHit>) {
        self.results = hits;
    }

    pub fn turns(&self) -> u32 {
        self.turns
    }

    pub fn bump_turn(&mut self) {
        self.turns += 1;
    }
}
