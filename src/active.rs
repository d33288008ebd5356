//! The active-thread marker and the continue-or-new decision.
//!
//! The marker is a plain-text file holding one thread identifier. It is a
//! weak reference: the thread it names may have been removed or corrupted
//! out from under it, in which case it is treated as absent.

use std::io::{BufRead, Write};

use tracing::warn;

use crate::error::Result;
use crate::paths::{self, StoragePaths};
use crate::thread::{Thread, ThreadStore};

pub struct ActiveThread {
    paths: StoragePaths,
}

impl ActiveThread {
    pub fn new(paths: StoragePaths) -> Self {
        ActiveThread { paths }
    }

    /// The identifier in the marker file, or `None` when the file is
    /// missing or blank after trimming.
    pub fn get(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(self.paths.active_marker()) {
            Ok(raw) => {
                let id = raw.trim();
                if id.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(id.to_string()))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrite the marker with `id`, creating parent directories as
    /// needed. No history is kept.
    pub fn set(&self, id: &str) -> Result<()> {
        paths::write_atomic(&self.paths.active_marker(), id.as_bytes())?;
        Ok(())
    }

    /// Resolve the thread a command should operate on.
    ///
    /// When the marker names a thread that loads, and `interactive` is set,
    /// the user is asked whether to continue it; answering exactly "n"
    /// (case-insensitive, trimmed) starts a fresh thread, anything else
    /// continues. When the marker is absent, or the thread it names cannot
    /// be loaded, a fresh thread is created without asking.
    ///
    /// A fresh thread is not persisted here and the marker is not updated;
    /// the caller does both only after a completed exchange. Until then the
    /// new thread exists only in memory.
    pub fn resolve_or_create<R: BufRead, W: Write>(
        &self,
        store: &ThreadStore,
        interactive: bool,
        input: &mut R,
        output: &mut W,
    ) -> Result<Thread> {
        let Some(id) = self.get()? else {
            return Ok(store.create());
        };

        let thread = match store.load(&id) {
            Ok(thread) => thread,
            Err(e) => {
                warn!(thread = %id, error = %e, "active thread is unusable, starting a new one");
                return Ok(store.create());
            }
        };

        if !interactive {
            return Ok(thread);
        }

        write!(
            output,
            "Continue the current conversation ({} messages)? [Y/n] ",
            thread.messages.len()
        )?;
        output.flush()?;

        let mut answer = String::new();
        input.read_line(&mut answer)?;
        if answer.trim().eq_ignore_ascii_case("n") {
            Ok(store.create())
        } else {
            Ok(thread)
        }
    }
}
