//! The persisted config record: API credential and prompt-mode flag.

use std::env;
use std::fs;
use std::io;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ColloquyError, Result};
use crate::paths::{self, StoragePaths};

/// Environment variable that overrides the persisted API key.
pub const API_KEY_ENV_VAR: &str = "COLLOQUY_API_KEY";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub api_key: String,
    #[serde(default)]
    pub prompt_mode: bool,
}

/// Reads and writes the single config record. The record is overwritten
/// wholesale on each save; there is no partial update.
pub struct ConfigStore {
    paths: StoragePaths,
}

impl ConfigStore {
    pub fn new(paths: StoragePaths) -> Self {
        ConfigStore { paths }
    }

    /// The persisted record, or `None` when the file is absent. A record
    /// that fails to decode is also reported as `None`, but logged as
    /// corrupt rather than missing.
    pub fn load(&self) -> Result<Option<Settings>> {
        let raw = match fs::read_to_string(self.paths.config_file()) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&raw) {
            Ok(settings) => Ok(Some(settings)),
            Err(e) => {
                warn!(error = %e, "config record is corrupt, treating it as absent");
                Ok(None)
            }
        }
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        let body = serde_json::to_vec_pretty(settings)?;
        paths::write_atomic(&self.paths.config_file(), &body)?;
        Ok(())
    }

    /// The API key commands should use: the environment variable always
    /// wins, the persisted record is the fallback, and neither being
    /// usable is `MissingCredential`.
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Ok(key) = env::var(API_KEY_ENV_VAR) {
            if !key.is_empty() {
                return Ok(key);
            }
        }
        match self.load()? {
            Some(settings) if !settings.api_key.is_empty() => Ok(settings.api_key),
            _ => Err(ColloquyError::MissingCredential),
        }
    }
}
