//! zmai server binary - composition root.
//!
//! 1. Initialize tracing
//! 2. Resolve configuration (file, environment, CLI flags)
//! 3. Open the configured conversation store (SQLite or flat files)
//! 4. Build the completion and search providers and load the system prompt
//! 5. Serve the axum API until Ctrl-C

mod cli;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

use zmai_api::{start_server, AppState};
use zmai_chat::{build_completion_provider, DuckDuckGoSearch, SystemPrompt};
use zmai_core::config::{CompletionBackend, StorageBackend, ZmaiConfig};
use zmai_core::error::ZmaiError;
use zmai_storage::{ConversationStore, Database, FileConversationStore, SqliteConversationStore};

use crate::cli::CliArgs;

/// Open the conversation store selected by `storage.backend`.
fn open_store(config: &ZmaiConfig) -> Result<Arc<dyn ConversationStore>, ZmaiError> {
    match config.storage.backend {
        StorageBackend::Sqlite => {
            let db_path = config.db_path();
            let db = Database::new(&db_path)?;
            tracing::info!(path = %db_path.display(), "SQLite conversation store opened");
            Ok(Arc::new(SqliteConversationStore::new(Arc::new(db))))
        }
        StorageBackend::File => {
            let dir = config.conversations_dir();
            let store = FileConversationStore::new(&dir)?;
            tracing::info!(path = %dir.display(), "File conversation store opened");
            Ok(Arc::new(store))
        }
    }
}

/// Resolves on Ctrl-C. If the handler cannot be installed, never resolves.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}

/// Install the global subscriber before anything can log.
///
/// `RUST_LOG` fixes the filter for the whole run. Otherwise the filter starts
/// at `bootstrap_level` and the returned handle lets the caller switch to the
/// configured level once the configuration is known.
fn init_tracing(bootstrap_level: &str) -> Option<reload::Handle<EnvFilter, Registry>> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
        return None;
    }

    let (filter, handle) = reload::Layer::new(EnvFilter::new(bootstrap_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
    Some(handle)
}

fn apply_log_level(handle: &reload::Handle<EnvFilter, Registry>, level: &str) {
    match EnvFilter::try_new(level) {
        Ok(filter) => {
            if let Err(e) = handle.reload(filter) {
                tracing::warn!(error = %e, "Failed to apply configured log level");
            }
        }
        Err(e) => tracing::warn!(level = %level, error = %e, "Ignoring invalid log level"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Tracing first, so configuration problems are reported.
    let log_handle = init_tracing(args.log_level.as_deref().unwrap_or("info"));
    tracing::info!("Starting zmai v{}", env!("CARGO_PKG_VERSION"));

    // Config: file, then environment, then flags.
    let source = args.config_source();
    let mut config = match source.load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(path = %source.path().display(), error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };
    config.apply_env_overrides();
    args.apply_to(&mut config);

    if let Some(handle) = &log_handle {
        apply_log_level(handle, &config.general.log_level);
    }
    tracing::info!(
        storage = config.storage.backend.as_str(),
        completion = config.completion.provider.as_str(),
        "Configuration resolved"
    );

    let data_dir = config.data_dir();
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let store = open_store(&config)?;

    let completion = build_completion_provider(&config.completion)?;
    if config.completion.provider == CompletionBackend::Openai
        && config.completion.openai.api_key.is_empty()
    {
        tracing::warn!("No OpenAI API key configured; chat requests will fail until one is set");
    }
    tracing::info!(provider = completion.name(), "Completion provider ready");

    let search = Arc::new(DuckDuckGoSearch::new(&config.search)?);
    let system_prompt = SystemPrompt::load(
        config.system_prompt_path().as_deref(),
        &config.chat.default_system_prompt,
    );

    let state = AppState::new(config.clone(), store, completion, search, system_prompt);
    start_server(&config, state, shutdown_signal()).await?;

    Ok(())
}
