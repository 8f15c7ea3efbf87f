//! Durable storage for the single session identity.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Holds at most one identity token. All operations are total: an empty
/// string from [`SessionStore::get`] means "logged out".
pub trait SessionStore: Send + Sync {
    fn get(&self) -> String;
    fn set(&self, identity: &str);
    fn clear(&self);
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    identity: Mutex<String>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(identity: impl Into<String>) -> Self {
        Self {
            identity: Mutex::new(identity.into()),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self) -> String {
        self.identity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, identity: &str) {
        *self.identity.lock().unwrap_or_else(PoisonError::into_inner) = identity.to_string();
    }

    fn clear(&self) {
        self.identity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedSession {
    user_id: String,
}

/// Keeps the identity in a small JSON document so it survives restarts.
///
/// Writes land in a sibling temp file first and are renamed into place.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<String>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read session file '{}'", self.path.display())
                })
            }
        };
        let persisted: PersistedSession = serde_json::from_str(&raw).with_context(|| {
            format!("session file '{}' is malformed", self.path.display())
        })?;
        Ok(Some(persisted.user_id))
    }

    fn write(&self, identity: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create session directory '{}'", parent.display())
            })?;
        }
        let serialized = serde_json::to_string(&PersistedSession {
            user_id: identity.to_string(),
        })?;
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, serialized)
            .with_context(|| format!("failed to write '{}'", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path).with_context(|| {
            format!("failed to move session file into '{}'", self.path.display())
        })?;
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err)
                .with_context(|| format!("failed to remove '{}'", self.path.display())),
        }
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self) -> String {
        match self.read() {
            Ok(identity) => identity.unwrap_or_default(),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "session: treating unreadable session as logged out");
                String::new()
            }
        }
    }

    fn set(&self, identity: &str) {
        if identity.is_empty() {
            self.clear();
            return;
        }
        match self.write(identity) {
            Ok(()) => debug!(path = %self.path.display(), "session: identity persisted"),
            Err(err) => warn!(error = %format!("{err:#}"), "session: failed to persist identity"),
        }
    }

    fn clear(&self) {
        if let Err(err) = self.remove() {
            warn!(error = %format!("{err:#}"), "session: failed to clear identity");
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
