//! On-disk locations for everything the tool persists.
//!
//! All state lives under a single root directory, `~/.colloquy` by default.
//! The root is injectable so tests can point the stores at a temporary
//! directory instead of the real home.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{ColloquyError, Result};

const STORAGE_DIR_NAME: &str = ".colloquy";

#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl StoragePaths {
    /// Storage rooted at an explicit directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        StoragePaths { root: root.into() }
    }

    /// Storage rooted at `~/.colloquy`.
    pub fn resolve() -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            ColloquyError::Config("could not determine the home directory".to_string())
        })?;
        Ok(Self::new(home.join(STORAGE_DIR_NAME)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The config record holding the API key and prompt-mode flag.
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config")
    }

    /// The marker file naming the active thread.
    pub fn active_marker(&self) -> PathBuf {
        self.root.join("activeThread")
    }

    /// The directory holding one file per thread.
    pub fn threads_dir(&self) -> PathBuf {
        self.root.join("threads")
    }
}

/// Write a file so that a crash mid-write never leaves a truncated record
/// visible under the final name: write to a sibling temp file, then rename.
/// Parent directories are created as needed.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}
