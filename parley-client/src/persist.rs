//! Conversation persistence: one newline-delimited JSON file per contact.
//!
//! Each line is one serialized [`Message`], in arrival order. Saving rewrites
//! the whole file, so the file on disk always reflects one consistent
//! snapshot of the conversation.

use std::path::{Path, PathBuf};

use parley_core::{Conversation, Message};
use parley_types::ContactId;
use thiserror::Error;
use tracing::debug;

/// Persistence errors.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Reading or writing the file failed.
    #[error("conversation file {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A line in the file is not a valid message.
    #[error("conversation file {path} line {line}: {source}")]
    Corrupt {
        /// File involved.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// Parse error.
        #[source]
        source: serde_json::Error,
    },

    /// A message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Directory of per-contact conversation files.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    dir: PathBuf,
}

impl ConversationStore {
    /// Store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding `contact`'s conversation.
    ///
    /// Group ids are base64 and may contain `/`, which is replaced.
    pub fn path_for(&self, contact: &ContactId) -> PathBuf {
        self.dir.join(contact.as_str().replace('/', "_"))
    }

    /// Load a conversation's messages in stored order.
    ///
    /// A missing file is an empty conversation.
    pub async fn load(&self, contact: &ContactId) -> Result<Vec<Message>, PersistError> {
        let path = self.path_for(contact);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(PersistError::Io { path, source }),
        };

        let mut messages = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let message = serde_json::from_str(line).map_err(|source| PersistError::Corrupt {
                path: path.clone(),
                line: index + 1,
                source,
            })?;
            messages.push(message);
        }
        debug!(contact = %contact, count = messages.len(), "loaded conversation");
        Ok(messages)
    }

    /// Rewrite a conversation's file from scratch.
    pub async fn save(&self, conversation: &Conversation) -> Result<(), PersistError> {
        let mut contents = String::new();
        for message in conversation.messages() {
            contents.push_str(&serde_json::to_string(message)?);
            contents.push('\n');
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| PersistError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let path = self.path_for(conversation.contact());
        let staging = path.with_extension("tmp");
        let io_err = |source| PersistError::Io {
            path: path.clone(),
            source,
        };
        tokio::fs::write(&staging, contents).await.map_err(io_err)?;
        set_file_permissions_0600(&staging).await.map_err(io_err)?;
        tokio::fs::rename(&staging, &path).await.map_err(io_err)?;

        debug!(contact = %conversation.contact(), count = conversation.len(), "saved conversation");
        Ok(())
    }
}

/// Conversation logs are private; owner-only on Unix.
async fn set_file_permissions_0600(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::Contact;
    use tempfile::tempdir;

    fn sample() -> Conversation {
        let bob = Contact::new("+15550001111").with_name("Bob");
        let mut conv = Conversation::new(bob.id.clone());
        conv.upsert(Message::incoming(300, "first", &bob));
        conv.upsert(Message::outgoing(100, "second"));
        conv.upsert(Message::incoming(200, "third", &bob));
        conv
    }

    #[tokio::test]
    async fn save_then_load_keeps_arrival_order() {
        let dir = tempdir().unwrap();
        let store = ConversationStore::new(dir.path().join("conversations"));
        let conv = sample();

        store.save(&conv).await.unwrap();
        let loaded = store.load(conv.contact()).await.unwrap();

        let order: Vec<i64> = loaded.iter().map(|m| m.timestamp).collect();
        assert_eq!(order, vec![300, 100, 200]);
        assert_eq!(loaded[1].content, "second");
        assert!(loaded[1].from_self);
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let store = ConversationStore::new(dir.path());
        let loaded = store.load(&ContactId::new("+19999999999")).await.unwrap();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn save_rewrites_whole_file() {
        let dir = tempdir().unwrap();
        let store = ConversationStore::new(dir.path());
        let mut conv = sample();
        store.save(&conv).await.unwrap();

        conv.upsert(Message::outgoing(400, "fourth"));
        store.save(&conv).await.unwrap();

        let raw = std::fs::read_to_string(store.path_for(conv.contact())).unwrap();
        assert_eq!(raw.lines().count(), 4);
        assert!(!store.path_for(conv.contact()).with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_line_is_reported() {
        let dir = tempdir().unwrap();
        let store = ConversationStore::new(dir.path());
        let id = ContactId::new("+15550001111");
        std::fs::write(
            store.path_for(&id),
            "{\"content\":\"ok\",\"timestamp\":1}\n{broken\n",
        )
        .unwrap();

        let err = store.load(&id).await.unwrap_err();
        assert!(matches!(err, PersistError::Corrupt { line: 2, .. }));
    }

    #[test]
    fn group_ids_are_safe_file_names() {
        let store = ConversationStore::new("/data");
        let path = store.path_for(&ContactId::new("ab/cd+ef=="));
        assert_eq!(path, PathBuf::from("/data/ab_cd+ef=="));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let store = ConversationStore::new(dir.path());
        let conv = sample();
        store.save(&conv).await.unwrap();

        let mode = std::fs::metadata(store.path_for(conv.contact()))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
