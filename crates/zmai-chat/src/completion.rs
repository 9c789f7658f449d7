//! Completion providers: hosted chat-completions API and local model process.
//!
//! Both implement [`CompletionProvider`], which maps an ordered message list
//! to a single reply string. The orchestrator never knows which one it has.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use zmai_core::config::{CompletionBackend, CompletionConfig, OllamaConfig, OpenAiConfig};
use zmai_core::types::{Message, Role};

use crate::error::CompletionError;

/// A backend that turns a full message list into one assistant reply.
///
/// Providers are stateless per call: the whole context is sent every time.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name for logs and the health endpoint.
    fn name(&self) -> &'static str;

    /// Produce the assistant reply for `messages`.
    async fn complete(&self, messages: &[Message]) -> Result<String, CompletionError>;
}

/// Build the provider selected by `completion.provider`.
pub fn build_completion_provider(
    config: &CompletionConfig,
) -> Result<Arc<dyn CompletionProvider>, CompletionError> {
    match config.provider {
        CompletionBackend::Openai => Ok(Arc::new(OpenAiCompletion::new(config.openai.clone())?)),
        CompletionBackend::Ollama => Ok(Arc::new(OllamaCompletion::new(config.ollama.clone()))),
    }
}

// =============================================================================
// Hosted chat-completions API
// =============================================================================

/// Client for an OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct OpenAiCompletion {
    client: reqwest::Client,
    config: OpenAiConfig,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Deserialize)]
struct ChatCompletionMessage {
    content: Option<String>,
}

impl OpenAiCompletion {
    pub fn new(config: OpenAiConfig) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CompletionError::Transport(format!("HTTP client error: {}", e)))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompletion {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, CompletionError> {
        if self.config.api_key.trim().is_empty() {
            return Err(CompletionError::NotConfigured(
                "OpenAI API key not configured".to_string(),
            ));
        }

        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        debug!(model = %self.config.model, messages = messages.len(), "Requesting completion");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout(self.config.timeout_secs)
                } else {
                    CompletionError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CompletionError::Transport(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(CompletionError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        parse_openai_reply(&body)
    }
}

/// Extract the first choice's content from a chat-completions response body.
pub fn parse_openai_reply(body: &str) -> Result<String, CompletionError> {
    let parsed: ChatCompletionResponse =
        serde_json::from_str(body).map_err(|e| CompletionError::Malformed(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| CompletionError::Malformed("response has no choices".to_string()))
}

// =============================================================================
// Local model process
// =============================================================================

/// Runs `<binary> run <model>` with the prompt on stdin and returns its
/// trimmed stdout.
pub struct OllamaCompletion {
    config: OllamaConfig,
}

impl OllamaCompletion {
    pub fn new(config: OllamaConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl CompletionProvider for OllamaCompletion {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, CompletionError> {
        let prompt = render_prompt(messages);
        let binary = &self.config.binary;

        debug!(binary = %binary, model = %self.config.model, "Running local model");

        let mut child = Command::new(binary)
            .arg("run")
            .arg(&self.config.model)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CompletionError::Process(format!("failed to start {}: {}", binary, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| CompletionError::Process(format!("no stdin for {}", binary)))?;
        let feed = async move {
            // The pipe closes when `stdin` drops at the end of this block.
            if let Err(e) = stdin.write_all(prompt.as_bytes()).await {
                debug!(error = %e, "Local model stopped reading its prompt");
            }
        };

        // Dropping the wait future on timeout drops the child, which kills it.
        let bound = Duration::from_secs(self.config.timeout_secs);
        let run = async {
            let ((), output) = tokio::join!(feed, child.wait_with_output());
            output
        };
        let output = match tokio::time::timeout(bound, run).await {
            Ok(result) => result.map_err(|e| CompletionError::Process(e.to_string()))?,
            Err(_) => return Err(CompletionError::Timeout(self.config.timeout_secs)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CompletionError::Process(format!(
                "{} exited with {}: {}",
                binary,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Flatten a message list into a single text prompt.
///
/// A leading system message becomes the header, followed by a blank line and
/// one `ROLE: content` line per remaining message.
pub fn render_prompt(messages: &[Message]) -> String {
    let (header, rest) = match messages.split_first() {
        Some((first, rest)) if first.role == Role::System => (first.content.as_str(), rest),
        _ => ("", messages),
    };

    let mut prompt = String::with_capacity(header.len() + 2);
    prompt.push_str(header);
    prompt.push_str("\n\n");
    for message in rest {
        prompt.push_str(&message.role.as_str().to_uppercase());
        prompt.push_str(": ");
        prompt.push_str(&message.content);
        prompt.push('\n');
    }
    prompt
}
