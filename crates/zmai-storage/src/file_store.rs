//! Flat-file conversation store.
//!
//! Each conversation is two sibling files in one directory:
//! `<id>.messages.json` holds the message array and `<id>.meta.json` holds
//! the metadata record. Files are replaced with write-temp-then-rename, so a
//! reader sees either the previous or the new version, never a torn write.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use zmai_core::error::ZmaiError;
use zmai_core::types::{
    generate_conversation_id, validate_conversation_id, Conversation, ConversationMeta,
    ConversationSummary, Message, NewConversation,
};

use crate::store::ConversationStore;

const MESSAGES_SUFFIX: &str = ".messages.json";
const META_SUFFIX: &str = ".meta.json";

/// On-disk metadata record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MetaFile {
    title: String,
    color: String,
    #[serde(default)]
    owner_id: Option<String>,
    #[serde(default)]
    search_enabled: bool,
    /// Creation time in epoch milliseconds; orders the listing.
    #[serde(default)]
    created_at: i64,
}

impl MetaFile {
    fn new(meta: ConversationMeta) -> Self {
        Self {
            title: meta.title,
            color: meta.color,
            owner_id: meta.owner_id,
            search_enabled: meta.search_enabled,
            created_at: Utc::now().timestamp_millis(),
        }
    }

    fn to_meta(&self) -> ConversationMeta {
        ConversationMeta {
            title: self.title.clone(),
            color: self.color.clone(),
            owner_id: self.owner_id.clone(),
            search_enabled: self.search_enabled,
        }
    }
}

/// Conversation store over a directory of JSON files.
///
/// All operations are serialized by one store-wide mutex, so within a
/// process no caller observes a conversation mid-update.
pub struct FileConversationStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileConversationStore {
    /// Open (or create) a store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ZmaiError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            ZmaiError::Storage(format!(
                "Failed to create conversations directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        info!("File conversation store at {}", dir.display());
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    /// Root directory of the store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>, ZmaiError> {
        self.lock
            .lock()
            .map_err(|e| ZmaiError::Storage(format!("File store lock poisoned: {}", e)))
    }

    fn messages_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}{}", id, MESSAGES_SUFFIX))
    }

    fn meta_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}{}", id, META_SUFFIX))
    }

    fn read_messages(&self, id: &str) -> Result<Vec<Message>, ZmaiError> {
        Ok(read_json(&self.messages_path(id))?.unwrap_or_default())
    }

    fn read_meta(&self, id: &str) -> Result<Option<MetaFile>, ZmaiError> {
        read_json(&self.meta_path(id))
    }

    /// Load the metadata record, creating the default one if absent.
    fn ensure_meta(&self, id: &str) -> Result<MetaFile, ZmaiError> {
        match self.read_meta(id)? {
            Some(meta) => Ok(meta),
            None => {
                let meta = MetaFile::new(ConversationMeta::default());
                write_json_atomic(&self.meta_path(id), &meta)?;
                Ok(meta)
            }
        }
    }

    fn update_meta<F>(&self, id: &str, update: F) -> Result<ConversationMeta, ZmaiError>
    where
        F: FnOnce(&mut MetaFile),
    {
        validate_conversation_id(id)?;
        let _guard = self.guard()?;
        let mut meta = self.ensure_meta(id)?;
        update(&mut meta);
        write_json_atomic(&self.meta_path(id), &meta)?;
        Ok(meta.to_meta())
    }
}

impl ConversationStore for FileConversationStore {
    fn backend_name(&self) -> &'static str {
        "file"
    }

    fn create_conversation(&self, new: NewConversation) -> Result<Conversation, ZmaiError> {
        let id = generate_conversation_id();
        let meta = MetaFile::new(new.into_meta());

        let _guard = self.guard()?;
        write_json_atomic(&self.messages_path(&id), &Vec::<Message>::new())?;
        write_json_atomic(&self.meta_path(&id), &meta)?;

        debug!(conversation_id = %id, "Conversation created");
        Ok(Conversation {
            id,
            messages: Vec::new(),
            meta: meta.to_meta(),
        })
    }

    fn list_conversations(
        &self,
        owner_id: Option<&str>,
    ) -> Result<Vec<ConversationSummary>, ZmaiError> {
        let _guard = self.guard()?;
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            ZmaiError::Storage(format!("Failed to read {}: {}", self.dir.display(), e))
        })?;

        let mut rows = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ZmaiError::Storage(e.to_string()))?;
            let name = entry.file_name();
            let Some(id) = name.to_str().and_then(|n| n.strip_suffix(META_SUFFIX)) else {
                continue;
            };
            if validate_conversation_id(id).is_err() {
                continue;
            }
            let Some(meta) = self.read_meta(id)? else {
                continue;
            };
            if owner_id.is_some() && meta.owner_id.as_deref() != owner_id {
                continue;
            }
            rows.push((meta.created_at, id.to_string(), meta));
        }

        rows.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
        Ok(rows
            .into_iter()
            .map(|(_, id, meta)| ConversationSummary {
                id,
                title: meta.title,
                color: meta.color,
                owner_id: meta.owner_id,
            })
            .collect())
    }

    fn get_conversation(&self, id: &str) -> Result<Conversation, ZmaiError> {
        validate_conversation_id(id)?;
        let _guard = self.guard()?;
        let messages = self.read_messages(id)?;
        let meta = self
            .read_meta(id)?
            .map(|m| m.to_meta())
            .unwrap_or_default();
        Ok(Conversation {
            id: id.to_string(),
            messages,
            meta,
        })
    }

    fn exists(&self, id: &str) -> Result<bool, ZmaiError> {
        validate_conversation_id(id)?;
        let _guard = self.guard()?;
        Ok(self.read_meta(id)?.is_some())
    }

    fn append_turn(
        &self,
        id: &str,
        user: &Message,
        assistant: &Message,
    ) -> Result<(), ZmaiError> {
        validate_conversation_id(id)?;
        let _guard = self.guard()?;

        // Metadata first: an interruption after this point leaves a valid,
        // empty conversation rather than a log without a record.
        self.ensure_meta(id)?;

        let mut messages = self.read_messages(id)?;
        messages.push(user.clone());
        messages.push(assistant.clone());
        write_json_atomic(&self.messages_path(id), &messages)?;

        debug!(conversation_id = %id, total = messages.len(), "Turn appended");
        Ok(())
    }

    fn rename_conversation(&self, id: &str, title: &str) -> Result<ConversationMeta, ZmaiError> {
        self.update_meta(id, |meta| meta.title = title.to_string())
    }

    fn set_color(&self, id: &str, color: &str) -> Result<ConversationMeta, ZmaiError> {
        self.update_meta(id, |meta| meta.color = color.to_string())
    }

    fn set_search_enabled(
        &self,
        id: &str,
        enabled: bool,
    ) -> Result<ConversationMeta, ZmaiError> {
        self.update_meta(id, |meta| meta.search_enabled = enabled)
    }

    fn delete_conversation(&self, id: &str) -> Result<(), ZmaiError> {
        validate_conversation_id(id)?;
        let _guard = self.guard()?;
        // Log before metadata, so an interrupted delete leaves an empty
        // conversation rather than history without a record.
        remove_if_exists(&self.messages_path(id))?;
        remove_if_exists(&self.meta_path(id))?;
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ZmaiError> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(ZmaiError::Storage(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| ZmaiError::Storage(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Serialize `value` to a temporary sibling, flush it, then rename over
/// `path`.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), ZmaiError> {
    let contents = serde_json::to_vec_pretty(value)?;
    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let write = || -> std::io::Result<()> {
        let mut file = File::create(&tmp_path)?;
        file.write_all(&contents)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    };

    write().map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        ZmaiError::Storage(format!("Failed to write {}: {}", path.display(), e))
    })
}

fn remove_if_exists(path: &Path) -> Result<(), ZmaiError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ZmaiError::Storage(format!(
            "Failed to remove {}: {}",
            path.display(),
            e
        ))),
    }
}
