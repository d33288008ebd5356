//! Conversation threads and their on-disk store.
//!
//! A thread is an append-only sequence of messages saved as one JSON file
//! under the threads directory, keyed by a random identifier assigned at
//! creation. Messages are never reordered, edited, or deleted.

use std::fs;
use std::io;

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::{ColloquyError, Result};
use crate::paths::{self, StoragePaths};

/// Who authored a message in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Message {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One conversation: an identifier plus its ordered message history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub messages: Vec<Message>,
}

impl Thread {
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }
}

/// Reads and writes thread records under the storage root.
pub struct ThreadStore {
    paths: StoragePaths,
}

impl ThreadStore {
    pub fn new(paths: StoragePaths) -> Self {
        ThreadStore { paths }
    }

    /// A fresh thread with a random identifier and no messages. Nothing is
    /// written to disk until `save` is called.
    pub fn create(&self) -> Thread {
        Thread {
            id: Uuid::new_v4().to_string(),
            messages: Vec::new(),
        }
    }

    /// Persist a thread to its dedicated file, creating the threads
    /// directory if needed. The write is atomic with respect to a crash;
    /// a failure is reported to the caller without retrying.
    pub fn save(&self, thread: &Thread) -> Result<()> {
        let path = self.paths.threads_dir().join(&thread.id);
        let body = serde_json::to_vec_pretty(thread)?;
        paths::write_atomic(&path, &body)?;
        Ok(())
    }

    /// Load the thread for `id`. A missing file is `ThreadNotFound`; a file
    /// that is present but undecodable is `ThreadDecode`, never silently an
    /// empty thread.
    pub fn load(&self, id: &str) -> Result<Thread> {
        let path = self.paths.threads_dir().join(id);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ColloquyError::ThreadNotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw).map_err(|source| ColloquyError::ThreadDecode {
            id: id.to_string(),
            source,
        })
    }

    /// Load every thread in the threads directory, skipping entries that
    /// fail to decode with a logged warning. Order is whatever the
    /// filesystem enumeration yields.
    pub fn load_all(&self) -> Result<Vec<Thread>> {
        let dir = self.paths.threads_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut threads = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            match self.load(&name) {
                Ok(thread) => threads.push(thread),
                Err(e) => warn!(file = %name, error = %e, "skipping unreadable thread record"),
            }
        }
        Ok(threads)
    }
}
