//! Saved-game persistence.
//!
//! Finished games are stored newest-first and addressed by their `at`
//! timestamp. The server always keeps a local JSON file store; an optional
//! primary store (a remote backend) sits in front of it, and when the primary
//! fails the save lands locally and the caller is told so it can warn the
//! player.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{info, warn};

use crate::game::error::StorageError;
use crate::models::saved_game::SavedGame;

pub trait SavedGameStore {
    fn list(&self, user_id: i64) -> Result<Vec<SavedGame>, StorageError>;
    fn save(&self, game: &SavedGame) -> Result<(), StorageError>;
    fn delete(&self, user_id: i64, at: u64) -> Result<(), StorageError>;
}

/// JSON-file store on local disk. The whole list is small (one record per
/// finished game) so it is rewritten atomically under a lock on every change.
pub struct LocalStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl LocalStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("saved-games.json"),
            lock: Mutex::new(()),
        }
    }

    fn read_all(&self) -> Result<Vec<SavedGame>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        serde_json::from_str(&raw).map_err(|e| StorageError::Corrupt(e.to_string()))
    }

    fn write_all(&self, games: &[SavedGame]) -> Result<(), StorageError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let raw =
            serde_json::to_string_pretty(games).map_err(|e| StorageError::Corrupt(e.to_string()))?;
        fs::write(&self.path, raw)?;
        Ok(())
    }
}

impl SavedGameStore for LocalStore {
    fn list(&self, user_id: i64) -> Result<Vec<SavedGame>, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|g| g.user_id == user_id)
            .collect())
    }

    fn save(&self, game: &SavedGame) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut games = self.read_all()?;
        games.insert(0, game.clone());
        self.write_all(&games)
    }

    fn delete(&self, user_id: i64, at: u64) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut games = self.read_all()?;
        let before = games.len();
        games.retain(|g| !(g.user_id == user_id && g.at == at));
        if games.len() == before {
            return Err(StorageError::NotFound(at));
        }
        self.write_all(&games)
    }
}

/// In-memory store, used as a test double for the primary slot.
#[derive(Default)]
pub struct MemoryStore {
    games: Mutex<Vec<SavedGame>>,
}

impl SavedGameStore for MemoryStore {
    fn list(&self, user_id: i64) -> Result<Vec<SavedGame>, StorageError> {
        let games = self.games.lock().unwrap_or_else(|e| e.into_inner());
        Ok(games
            .iter()
            .filter(|g| g.user_id == user_id)
            .cloned()
            .collect())
    }

    fn save(&self, game: &SavedGame) -> Result<(), StorageError> {
        let mut games = self.games.lock().unwrap_or_else(|e| e.into_inner());
        games.insert(0, game.clone());
        Ok(())
    }

    fn delete(&self, user_id: i64, at: u64) -> Result<(), StorageError> {
        let mut games = self.games.lock().unwrap_or_else(|e| e.into_inner());
        let before = games.len();
        games.retain(|g| !(g.user_id == user_id && g.at == at));
        if games.len() == before {
            return Err(StorageError::NotFound(at));
        }
        Ok(())
    }
}

/// Where a save actually ended up.
pub struct SaveReceipt {
    pub local_only: bool,
}

/// Storage front: primary store with local fallback.
pub struct Storage {
    primary: Option<Box<dyn SavedGameStore + Send + Sync>>,
    local: LocalStore,
}

impl Storage {
    pub fn local_only(data_dir: &Path) -> Self {
        Self {
            primary: None,
            local: LocalStore::new(data_dir),
        }
    }

    pub fn with_primary(primary: Box<dyn SavedGameStore + Send + Sync>, data_dir: &Path) -> Self {
        Self {
            primary: Some(primary),
            local: LocalStore::new(data_dir),
        }
    }

    pub fn list(&self, user_id: i64) -> Result<Vec<SavedGame>, StorageError> {
        if let Some(primary) = &self.primary {
            match primary.list(user_id) {
                Ok(games) => return Ok(games),
                Err(e) => warn!("primary store list failed, using local: {}", e),
            }
        }
        self.local.list(user_id)
    }

    pub fn save(&self, game: &SavedGame) -> Result<SaveReceipt, StorageError> {
        if let Some(primary) = &self.primary {
            match primary.save(game) {
                Ok(()) => {
                    info!("game {} saved to the primary store", game.at);
                    return Ok(SaveReceipt { local_only: false });
                }
                Err(e) => warn!("primary store save failed, saving locally: {}", e),
            }
        }
        self.local.save(game)?;
        Ok(SaveReceipt { local_only: true })
    }

    pub fn delete(&self, user_id: i64, at: u64) -> Result<(), StorageError> {
        if let Some(primary) = &self.primary {
            match primary.delete(user_id, at) {
                Ok(()) => return Ok(()),
                Err(e) => warn!("primary store delete failed, trying local: {}", e),
            }
        }
        self.local.delete(user_id, at)
    }
}
