use std::collections::HashSet;
use std::sync::Mutex;

use crate::config::AppConfig;
use crate::storage::Storage;

/// Application state shared between connections
pub struct AppState {
    /// Ids of live WebSocket connections, for lifecycle logging.
    pub connections: Mutex<HashSet<String>>,
    pub storage: Storage,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            connections: Mutex::new(HashSet::new()),
            storage: Storage::local_only(&config.data_dir),
            config,
        }
    }
}
