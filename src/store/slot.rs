//! Durable key-value slots the score store persists into.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

/// Persistence provider. Both calls may fail; the store decides what a failure means.
pub trait KvSlot {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn set(&mut self, key: &str, value: &[u8]) -> Result<()>;
}

impl<S: KvSlot + ?Sized> KvSlot for Box<S> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<()> {
        (**self).set(key, value)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemorySlot {
    values: HashMap<String, Vec<u8>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot pre-seeded with raw bytes, e.g. a record written by an older build.
    pub fn with_value(key: &str, value: impl Into<Vec<u8>>) -> Self {
        let mut slot = Self::new();
        slot.values.insert(key.to_string(), value.into());
        slot
    }

    pub fn raw(&self, key: &str) -> Option<&[u8]> {
        self.values.get(key).map(|v| v.as_slice())
    }
}

impl KvSlot for MemorySlot {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.values.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// One `<key>.json` file per key under a directory. Writes go through a temp file + rename.
#[derive(Debug, Clone)]
pub struct FileSlot {
    dir: PathBuf,
}

impl FileSlot {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).with_context(|| format!("create slot dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", name))
    }
}

impl KvSlot for FileSlot {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
        Ok(Some(bytes))
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("rename to {}", path.display()))?;
        Ok(())
    }
}

pub struct SqliteSlot {
    conn: Connection,
}

impl SqliteSlot {
    pub fn open(path: &str) -> Result<Self> {
        let mut slot = Self { conn: Connection::open(path)? };
        slot.init()?;
        Ok(slot)
    }

    pub fn in_memory() -> Result<Self> {
        let mut slot = Self { conn: Connection::open_in_memory()? };
        slot.init()?;
        Ok(slot)
    }

    fn init(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                updated_ms INTEGER NOT NULL
            );
            COMMIT;",
        )?;
        Ok(())
    }
}

impl KvSlot for SqliteSlot {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, Vec<u8>>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.conn.execute(
            "INSERT INTO kv (key, value, updated_ms) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_ms = excluded.updated_ms",
            params![key, value, Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }
}
