use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// The single slot remembering which conversation is active
pub trait ConversationStore: Send + Sync {
    fn load(&self) -> Result<Option<i64>>;
    fn save(&self, id: i64) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

#[derive(Serialize, Deserialize)]
struct StoredConversation {
    conversation_id: i64,
}

/// Keeps the active conversation id in a small JSON file so it survives restarts
pub struct FileConversationStore {
    path: PathBuf,
}

impl FileConversationStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// `~/.config/metr/conversation.json`
    pub fn default_path() -> Result<PathBuf> {
        let home_dir =
            dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))?;
        Ok(home_dir
            .join(".config")
            .join("metr")
            .join("conversation.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConversationStore for FileConversationStore {
    fn load(&self) -> Result<Option<i64>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let stored: StoredConversation = serde_json::from_str(&content)
            .with_context(|| format!("Invalid conversation file {}", self.path.display()))?;
        Ok(Some(stored.conversation_id))
    }

    fn save(&self, id: i64) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&StoredConversation {
            conversation_id: id,
        })?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// Store that forgets everything when the process exits
#[derive(Default)]
pub struct MemoryConversationStore {
    slot: Mutex<Option<i64>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(id: i64) -> Self {
        Self {
            slot: Mutex::new(Some(id)),
        }
    }
}

impl ConversationStore for MemoryConversationStore {
    fn load(&self) -> Result<Option<i64>> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| anyhow!("Conversation store lock poisoned"))?;
        Ok(*slot)
    }

    fn save(&self, id: i64) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow!("Conversation store lock poisoned"))?;
        *slot = Some(id);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow!("Conversation store lock poisoned"))?;
        *slot = None;
        Ok(())
    }
}
