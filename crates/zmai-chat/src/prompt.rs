//! Process-wide default system prompt, read once at startup.

use std::path::Path;

use tracing::{info, warn};

/// The system prompt used when a turn does not override it.
#[derive(Debug, Clone)]
pub struct SystemPrompt {
    text: String,
}

impl SystemPrompt {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Read the prompt from `path`, falling back to `fallback` when the file
    /// is unset, missing, unreadable or blank.
    pub fn load(path: Option<&Path>, fallback: &str) -> Self {
        let Some(path) = path else {
            return Self::new(fallback);
        };

        match std::fs::read_to_string(path) {
            Ok(text) if !text.trim().is_empty() => {
                info!(path = %path.display(), "Loaded system prompt");
                Self::new(text)
            }
            Ok(_) => {
                warn!(path = %path.display(), "System prompt file is empty, using default");
                Self::new(fallback)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No system prompt file, using default");
                Self::new(fallback)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read system prompt, using default");
                Self::new(fallback)
            }
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The effective prompt for one turn. An empty override counts as absent.
    pub fn resolve<'a>(&'a self, override_prompt: Option<&'a str>) -> &'a str {
        match override_prompt {
            Some(prompt) if !prompt.is_empty() => prompt,
            _ => &self.text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FALLBACK: &str = "You are ZM-AI, a helpful and professional assistant.";

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system_prompt.txt");
        std::fs::write(&path, "Answer in French.").unwrap();
        let prompt = SystemPrompt::load(Some(&path), FALLBACK);
        assert_eq!(prompt.text(), "Answer in French.");
    }

    #[test]
    fn test_load_missing_file_uses_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let prompt = SystemPrompt::load(Some(&dir.path().join("nope.txt")), FALLBACK);
        assert_eq!(prompt.text(), FALLBACK);
    }

    #[test]
    fn test_load_blank_file_uses_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system_prompt.txt");
        std::fs::write(&path, "  \n").unwrap();
        assert_eq!(SystemPrompt::load(Some(&path), FALLBACK).text(), FALLBACK);
    }

    #[test]
    fn test_load_without_path() {
        assert_eq!(SystemPrompt::load(None, FALLBACK).text(), FALLBACK);
    }

    #[test]
    fn test_resolve_override() {
        let prompt = SystemPrompt::new("default");
        assert_eq!(prompt.resolve(None), "default");
        assert_eq!(prompt.resolve(Some("")), "default");
        assert_eq!(prompt.resolve(Some("custom")), "custom");
    }
}
