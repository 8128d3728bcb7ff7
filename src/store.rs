//! Persisted client state.
//!
//! A small string key/value store kept in one JSON file, playing the role
//! browser local storage plays for the web client. Keys:
//! - `lastRoom`, `lastName`: most recent room and name, for rejoining
//! - `player:<roomCode>`: the name this client plays as in a room
//! - `ai-lock:<roomCode>:<playerName>`: set once a player used AI generation
//! - `sfx-enabled`: sound effects, on unless exactly `"false"`

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const LAST_ROOM: &str = "lastRoom";
pub const LAST_NAME: &str = "lastName";
pub const SFX_ENABLED: &str = "sfx-enabled";

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to access state file: {0}")]
    Io(#[from] std::io::Error),

    #[error("State file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn player_key(code: &str) -> String {
    format!("player:{}", code.to_uppercase())
}

pub fn ai_lock_key(code: &str, name: &str) -> String {
    format!("ai-lock:{}:{}", code.to_uppercase(), name.trim().to_lowercase())
}

#[derive(Debug)]
pub struct LocalStore {
    path: Option<PathBuf>,
    entries: BTreeMap<String, String>,
}

impl LocalStore {
    /// Open the store at `path`; a missing file is an empty store
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path: Some(path),
            entries,
        })
    }

    /// A store that never touches disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) -> StoreResult<()> {
        self.entries.insert(key.to_string(), value.into());
        self.save()
    }

    pub fn remove(&mut self, key: &str) -> StoreResult<()> {
        if self.entries.remove(key).is_some() {
            self.save()?;
        }
        Ok(())
    }

    pub fn last_room(&self) -> Option<&str> {
        self.get(LAST_ROOM)
    }

    pub fn last_name(&self) -> Option<&str> {
        self.get(LAST_NAME)
    }

    /// Name this client plays as in `code`, falling back to the last used name
    pub fn player_for(&self, code: &str) -> Option<&str> {
        self.get(&player_key(code)).or_else(|| self.last_name())
    }

    /// Record a successful create/join
    pub fn remember_room(&mut self, code: &str, name: &str) -> StoreResult<()> {
        let code = code.to_uppercase();
        self.entries.insert(LAST_ROOM.to_string(), code.clone());
        self.entries.insert(LAST_NAME.to_string(), name.to_string());
        self.entries.insert(player_key(&code), name.to_string());
        self.save()
    }

    /// Drop everything scoped to `code` (on leave or room-not-found)
    pub fn forget_room(&mut self, code: &str) -> StoreResult<()> {
        let player = player_key(code);
        let lock_prefix = format!("ai-lock:{}:", code.to_uppercase());
        let before = self.entries.len();

        self.entries
            .retain(|key, _| key != &player && !key.starts_with(&lock_prefix));
        if self
            .last_room()
            .is_some_and(|room| room.eq_ignore_ascii_case(code))
        {
            self.entries.remove(LAST_ROOM);
        }

        if self.entries.len() != before {
            self.save()?;
        }
        Ok(())
    }

    pub fn ai_locked(&self, code: &str, name: &str) -> bool {
        self.get(&ai_lock_key(code, name)).is_some()
    }

    pub fn lock_ai(&mut self, code: &str, name: &str) -> StoreResult<()> {
        self.set(&ai_lock_key(code, name), "true")
    }

    pub fn unlock_ai(&mut self, code: &str, name: &str) -> StoreResult<()> {
        self.remove(&ai_lock_key(code, name))
    }

    pub fn sfx_enabled(&self) -> bool {
        self.get(SFX_ENABLED) != Some("false")
    }

    pub fn set_sfx_enabled(&mut self, enabled: bool) -> StoreResult<()> {
        self.set(SFX_ENABLED, if enabled { "true" } else { "false" })
    }

    /// Write the file atomically (temp file, then rename)
    fn save(&self) -> StoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&self.entries)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}
