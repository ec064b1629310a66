use anyhow::Result;

use crate::rank::{BoardWindow, DEFAULT_BOARD_LIMIT};
use crate::round::RoundConfig;
use crate::store::{FileSlot, KvSlot, MemorySlot, Participant, SqliteSlot, StoreConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    File,
    Memory,
}

impl StoreBackend {
    pub fn from_env() -> Self {
        match std::env::var("STORE_BACKEND").unwrap_or_else(|_| "sqlite".to_string()).as_str() {
            "file" => StoreBackend::File,
            "memory" => StoreBackend::Memory,
            _ => StoreBackend::Sqlite,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Sqlite => "sqlite",
            StoreBackend::File => "file",
            StoreBackend::Memory => "memory",
        }
    }

    /// Open the slot at `path` (a database file for sqlite, a directory for files).
    pub fn open(self, path: &str) -> Result<Box<dyn KvSlot + Send>> {
        Ok(match self {
            StoreBackend::Sqlite => Box::new(SqliteSlot::open(path)?),
            StoreBackend::File => Box::new(FileSlot::open(path)?),
            StoreBackend::Memory => Box::new(MemorySlot::new()),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub store_path: String,
    pub store: StoreConfig,
    pub round: RoundConfig,
    pub board_limit: usize,
    pub board_window: BoardWindow,
    pub player_id: String,
    pub player_name: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        let store_backend = StoreBackend::from_env();
        let default_path = match store_backend {
            StoreBackend::File => "./pressure-data",
            _ => "./pressure.sqlite",
        };
        let d = StoreConfig::default();
        Self {
            store_backend,
            store_path: std::env::var("STORE_PATH").unwrap_or_else(|_| default_path.to_string()),
            store: StoreConfig {
                key: std::env::var("STORE_KEY").unwrap_or(d.key),
                retention_days: std::env::var("RETENTION_DAYS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.retention_days),
                banked_cap: std::env::var("BANKED_CAP").ok().and_then(|v| v.parse().ok()).unwrap_or(d.banked_cap),
                saved_cap: std::env::var("SAVED_CAP").ok().and_then(|v| v.parse().ok()).unwrap_or(d.saved_cap),
            },
            round: RoundConfig::from_env(),
            board_limit: std::env::var("BOARD_LIMIT").ok().and_then(|v| v.parse().ok()).unwrap_or(DEFAULT_BOARD_LIMIT),
            board_window: std::env::var("BOARD_MODE").ok().and_then(|v| BoardWindow::parse(&v)).unwrap_or(BoardWindow::Daily),
            player_id: std::env::var("PLAYER_ID")
                .ok()
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| "local-player".to_string()),
            player_name: std::env::var("PLAYER_NAME").ok().filter(|n| !n.trim().is_empty()),
        }
    }

    pub fn participant(&self) -> Participant {
        Participant {
            id: self.player_id.clone(),
            display_name: self.player_name.clone(),
        }
    }

    pub fn open_slot(&self) -> Result<Box<dyn KvSlot + Send>> {
        self.store_backend.open(&self.store_path)
    }
}
