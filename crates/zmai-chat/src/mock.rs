//! In-process completion and search providers for tests and local runs.
//!
//! None of these touch the network or spawn processes.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use zmai_core::types::{Message, Role, SearchHit};

use crate::completion::CompletionProvider;
use crate::error::{CompletionError, SearchError};
use crate::search::SearchProvider;

/// Replies with `"echo: <last user message>"` and records every call.
#[derive(Debug, Default)]
pub struct EchoCompletion {
    calls: Mutex<Vec<Vec<Message>>>,
    delay: Option<Duration>,
}

impl EchoCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` before replying.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Message lists received so far, oldest first.
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// The reply this provider gives for `user_text`.
    pub fn reply_for(user_text: &str) -> String {
        format!("echo: {}", user_text)
    }
}

#[async_trait]
impl CompletionProvider for EchoCompletion {
    fn name(&self) -> &'static str {
        "echo"
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, CompletionError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        Ok(Self::reply_for(last_user))
    }
}

/// Always fails with the configured error.
#[derive(Debug, Clone)]
pub struct FailingCompletion {
    error: CompletionError,
}

impl FailingCompletion {
    pub fn new(error: CompletionError) -> Self {
        Self { error }
    }
}

#[async_trait]
impl CompletionProvider for FailingCompletion {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn complete(&self, _messages: &[Message]) -> Result<String, CompletionError> {
        Err(self.error.clone())
    }
}

/// Returns a fixed hit list (capped at the requested size unless told
/// otherwise) and records queries.
#[derive(Debug, Default)]
pub struct StaticSearch {
    hits: Vec<SearchHit>,
    queries: Mutex<Vec<(String, usize)>>,
    delay: Option<Duration>,
    ignore_limit: bool,
}

impl StaticSearch {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            ..Self::default()
        }
    }

    /// Sleep for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Return every hit regardless of `max_results`.
    pub fn ignoring_limit(mut self) -> Self {
        self.ignore_limit = true;
        self
    }

    /// `(query, max_results)` pairs received so far.
    pub fn queries(&self) -> Vec<(String, usize)> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push((query.to_string(), max_results));
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.ignore_limit {
            return Ok(self.hits.clone());
        }
        Ok(self.hits.iter().take(max_results).cloned().collect())
    }
}

/// Always fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingSearch;

#[async_trait]
impl SearchProvider for FailingSearch {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn search(
        &self,
        _query: &str,
        _max_results: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        Err(SearchError::Request("search backend unavailable".to_string()))
    }
}
