use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, ZmaiError};

/// Top-level configuration for the zmai chat backend.
///
/// Loaded from `~/.zmai/config.toml` by default. Each section corresponds to
/// one crate or cross-cutting concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZmaiConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl ZmaiConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(path, &content)
    }

    /// Load configuration from a TOML file that may not exist.
    ///
    /// A missing file is `Ok(None)`; an unreadable or unparseable one is an
    /// error.
    pub fn load_optional(path: &Path) -> Result<Option<Self>> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(path, &content).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn parse(path: &Path, content: &str) -> Result<Self> {
        let config: ZmaiConfig = toml::from_str(content)
            .map_err(|e| ZmaiError::Config(format!("{}: {}", path.display(), e)))?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Apply the process environment on top of the file configuration.
    ///
    /// Honours `OPENAI_API_KEY`, `USE_OLLAMA`, `OLLAMA_MODEL`, `DB_PATH` and
    /// `PORT`.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.is_empty()) {
            self.completion.openai.api_key = key;
        }
        if lookup("USE_OLLAMA").as_deref() == Some("1") {
            self.completion.provider = CompletionBackend::Ollama;
        }
        if let Some(model) = lookup("OLLAMA_MODEL").filter(|m| !m.is_empty()) {
            self.completion.ollama.model = model;
        }
        if let Some(db) = lookup("DB_PATH").filter(|p| !p.is_empty()) {
            self.storage.db_file = db;
        }
        if let Some(port) = lookup("PORT") {
            match port.parse::<u16>() {
                Ok(p) => self.general.port = p,
                Err(_) => warn!(value = %port, "Ignoring invalid PORT"),
            }
        }
    }

    /// Data directory with a leading `~` expanded to the home directory.
    pub fn data_dir(&self) -> PathBuf {
        expand_home(&self.general.data_dir)
    }

    /// Absolute location of the SQLite database file.
    pub fn db_path(&self) -> PathBuf {
        self.resolve_in_data_dir(&self.storage.db_file)
    }

    /// Absolute location of the flat-file conversation directory.
    pub fn conversations_dir(&self) -> PathBuf {
        self.resolve_in_data_dir(&self.storage.conversations_dir)
    }

    /// Absolute location of the system prompt file, if one is configured.
    pub fn system_prompt_path(&self) -> Option<PathBuf> {
        self.chat
            .system_prompt_file
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| self.resolve_in_data_dir(p))
    }

    fn resolve_in_data_dir(&self, value: &str) -> PathBuf {
        let path = expand_home(value);
        if path.is_absolute() {
            path
        } else {
            self.data_dir().join(path)
        }
    }
}

/// Expand a leading `~/` to the current user's home directory.
pub fn expand_home(value: &str) -> PathBuf {
    if value == "~" || value.starts_with("~/") || value.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let rest = value.get(2..).unwrap_or("");
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(value)
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the database, conversation files and prompt file.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Address the HTTP server binds to.
    pub host: String,
    /// HTTP server port.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.zmai/data".to_string(),
            log_level: "info".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Which ConversationStore implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// One SQLite database holding message logs and metadata tables.
    #[default]
    Sqlite,
    /// One JSON file per conversation plus a sibling metadata file.
    File,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Sqlite => "sqlite",
            StorageBackend::File => "file",
        }
    }
}

/// Conversation storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// SQLite file, relative to `data_dir` unless absolute.
    pub db_file: String,
    /// Directory for the file backend, relative to `data_dir` unless absolute.
    pub conversations_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            db_file: "chat_history.db".to_string(),
            conversations_dir: "conversations".to_string(),
        }
    }
}

/// Which CompletionProvider implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionBackend {
    /// Hosted OpenAI-compatible chat completions API.
    #[default]
    Openai,
    /// Locally installed `ollama` binary.
    Ollama,
}

impl CompletionBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionBackend::Openai => "openai",
            CompletionBackend::Ollama => "ollama",
        }
    }
}

/// Completion provider configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub provider: CompletionBackend,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
}

/// Hosted completion API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// Bearer key. Usually supplied through `OPENAI_API_KEY`.
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 800,
            temperature: 0.2,
            timeout_secs: 60,
        }
    }
}

/// Local model process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Executable to invoke (`<binary> run <model> <prompt>`).
    pub binary: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            binary: "ollama".to_string(),
            model: "llama3:13b".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Web search provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Base URL of the DuckDuckGo Instant Answer API.
    pub base_url: String,
    pub timeout_secs: u64,
    /// Result cap for the direct `/websearch` endpoint.
    pub endpoint_max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.duckduckgo.com".to_string(),
            timeout_secs: 10,
            endpoint_max_results: 6,
        }
    }
}

/// Chat turn orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// File holding the default system prompt, relative to `data_dir`.
    pub system_prompt_file: Option<String>,
    /// Prompt used when the file is absent or empty.
    pub default_system_prompt: String,
    /// Longest accepted user message, in characters.
    pub max_message_chars: usize,
    /// Search results fed to the model per turn (clamped to 4..=6).
    pub search_results_per_turn: usize,
    pub search_timeout_secs: u64,
    pub completion_timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_prompt_file: Some("system_prompt.txt".to_string()),
            default_system_prompt: "You are ZM-AI, a helpful and professional assistant."
                .to_string(),
            max_message_chars: 16_000,
            search_results_per_turn: 5,
            search_timeout_secs: 15,
            completion_timeout_secs: 130,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Prebuilt frontend to serve for unmatched paths.
    pub frontend_dir: Option<String>,
    /// Allowed CORS origins. Empty allows any origin.
    pub cors_origins: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = ZmaiConfig::default();
        assert_eq!(config.general.data_dir, "~/.zmai/data");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.port, 8000);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.storage.db_file, "chat_history.db");
        assert_eq!(config.completion.provider, CompletionBackend::Openai);
        assert_eq!(config.completion.openai.model, "gpt-4o-mini");
        assert_eq!(config.completion.openai.max_tokens, 800);
        assert_eq!(config.completion.ollama.model, "llama3:13b");
        assert_eq!(config.completion.ollama.timeout_secs, 120);
        assert_eq!(config.search.endpoint_max_results, 6);
        assert_eq!(config.chat.search_results_per_turn, 5);
        assert!(config.server.cors_origins.is_empty());
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
data_dir = "/srv/zmai"
log_level = "debug"
port = 9000

[storage]
backend = "file"
conversations_dir = "convs"

[completion]
provider = "ollama"

[completion.ollama]
model = "mistral"

[server]
cors_origins = ["https://chat.example.com"]
"#;
        let file = create_temp_config(content);
        let config = ZmaiConfig::load(file.path()).unwrap();
        assert_eq!(config.general.data_dir, "/srv/zmai");
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.port, 9000);
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.conversations_dir(), PathBuf::from("/srv/zmai/convs"));
        assert_eq!(config.completion.provider, CompletionBackend::Ollama);
        assert_eq!(config.completion.ollama.model, "mistral");
        assert_eq!(config.completion.ollama.binary, "ollama");
        assert_eq!(config.server.cors_origins.len(), 1);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let file = create_temp_config("[general]\nlog_level = \"warn\"\n");
        let config = ZmaiConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.general.port, 8000);
        assert_eq!(config.chat.max_message_chars, 16_000);
    }

    #[test]
    fn test_load_invalid_backend_is_config_error() {
        let file = create_temp_config("[storage]\nbackend = \"redis\"\n");
        let err = ZmaiConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ZmaiError::Config(_)));
    }

    #[test]
    fn test_load_optional_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = ZmaiConfig::load_optional(&dir.path().join("zmai.toml")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_optional_reports_parse_errors_with_path() {
        let file = create_temp_config("[general]\nport = \"not-a-number\"\n");
        let err = ZmaiConfig::load_optional(file.path()).unwrap_err();
        match err {
            ZmaiError::Config(msg) => assert!(msg.contains(&file.path().display().to_string())),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_optional_reads_existing_file() {
        let file = create_temp_config("[storage]\nbackend = \"file\"\n");
        let config = ZmaiConfig::load_optional(file.path()).unwrap().unwrap();
        assert_eq!(config.storage.backend, StorageBackend::File);
    }

    #[test]
    fn test_backend_names() {
        assert_eq!(StorageBackend::Sqlite.as_str(), "sqlite");
        assert_eq!(StorageBackend::File.as_str(), "file");
        assert_eq!(CompletionBackend::Openai.as_str(), "openai");
        assert_eq!(CompletionBackend::Ollama.as_str(), "ollama");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-test"),
            ("USE_OLLAMA", "1"),
            ("OLLAMA_MODEL", "phi3"),
            ("DB_PATH", "/tmp/history.db"),
            ("PORT", "8123"),
        ]
        .into_iter()
        .collect();

        let mut config = ZmaiConfig::default();
        config.apply_overrides_from(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.completion.openai.api_key, "sk-test");
        assert_eq!(config.completion.provider, CompletionBackend::Ollama);
        assert_eq!(config.completion.ollama.model, "phi3");
        assert_eq!(config.db_path(), PathBuf::from("/tmp/history.db"));
        assert_eq!(config.general.port, 8123);
    }

    #[test]
    fn test_env_overrides_ignore_invalid_values() {
        let mut config = ZmaiConfig::default();
        config.apply_overrides_from(|k| match k {
            "USE_OLLAMA" => Some("0".to_string()),
            "PORT" => Some("not-a-port".to_string()),
            _ => None,
        });
        assert_eq!(config.completion.provider, CompletionBackend::Openai);
        assert_eq!(config.general.port, 8000);
    }

    #[test]
    fn test_relative_paths_resolve_against_data_dir() {
        let mut config = ZmaiConfig::default();
        config.general.data_dir = "/var/lib/zmai".to_string();
        assert_eq!(config.db_path(), PathBuf::from("/var/lib/zmai/chat_history.db"));
        assert_eq!(
            config.system_prompt_path(),
            Some(PathBuf::from("/var/lib/zmai/system_prompt.txt"))
        );

        config.chat.system_prompt_file = None;
        assert_eq!(config.system_prompt_path(), None);
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/abs/path"), PathBuf::from("/abs/path"));
        assert_eq!(expand_home("relative"), PathBuf::from("relative"));
        let expanded = expand_home("~/.zmai/data");
        assert!(expanded.ends_with(".zmai/data"));
        assert!(!expanded.to_string_lossy().starts_with('~'));
    }
}
