//! Bounded, append-only score history persisted into a key-value slot.
//!
//! Every mutation runs refresh → mutate → prune → persist while holding `&mut self`,
//! so two calls can never interleave. A failing slot never reaches the caller: the
//! store keeps working in memory and reports [`PersistStatus::Degraded`].

pub mod codec;
pub mod event;
pub mod queue;
pub mod slot;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::GameError;
use crate::logging::{
    log_audit, log_pruned, log_score_appended, log_store_degraded, log_store_fallback,
    log_store_load, log_store_reset,
};
use crate::source::Clock;
use codec::{Decoded, LegacyFormat};
pub use event::{BankDetail, Origin, Participant, ScoreEvent};
pub use slot::{FileSlot, KvSlot, MemorySlot, SqliteSlot};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub key: String,
    pub retention_days: u32,
    pub banked_cap: usize,
    pub saved_cap: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            key: "base_pressure_state".to_string(),
            retention_days: 40,
            banked_cap: 400,
            saved_cap: 200,
        }
    }
}

impl StoreConfig {
    pub fn retention_ms(&self) -> i64 {
        self.retention_days as i64 * DAY_MS
    }
}

/// The two insertion-ordered histories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreLog {
    pub banked: Vec<ScoreEvent>,
    pub saved: Vec<ScoreEvent>,
}

impl ScoreLog {
    pub fn is_empty(&self) -> bool {
        self.banked.is_empty() && self.saved.is_empty()
    }

    /// Drop entries older than the retention window, then keep the newest N/M.
    /// Returns how many entries were dropped from each list.
    pub fn prune(&mut self, now_ms: i64, cfg: &StoreConfig) -> (usize, usize) {
        let cutoff = now_ms.saturating_sub(cfg.retention_ms());
        (
            prune_list(&mut self.banked, cutoff, cfg.banked_cap),
            prune_list(&mut self.saved, cutoff, cfg.saved_cap),
        )
    }

    pub fn pruned(mut self, now_ms: i64, cfg: &StoreConfig) -> Self {
        self.prune(now_ms, cfg);
        self
    }

    /// Highest banked running total recorded for a participant.
    pub fn best_banked(&self, participant_id: &str) -> u64 {
        best_of(&self.banked, participant_id)
    }

    pub fn best_saved(&self, participant_id: &str) -> u64 {
        best_of(&self.saved, participant_id)
    }

    /// Most recently appended BANKED event of a participant.
    pub fn last_banked(&self, participant_id: &str) -> Option<&ScoreEvent> {
        self.banked.iter().rev().find(|e| e.participant_id == participant_id)
    }
}

fn prune_list(events: &mut Vec<ScoreEvent>, cutoff: i64, cap: usize) -> usize {
    let before = events.len();
    events.retain(|e| e.ts >= cutoff);
    if events.len() > cap {
        let excess = events.len() - cap;
        events.drain(..excess);
    }
    before - events.len()
}

fn best_of(events: &[ScoreEvent], participant_id: &str) -> u64 {
    events
        .iter()
        .filter(|e| e.participant_id == participant_id)
        .map(|e| e.score)
        .max()
        .unwrap_or(0)
}

/// Result of writing the record after a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistStatus {
    Persisted,
    /// The slot rejected the write; the change lives in memory only.
    Degraded,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// Nothing stored under the key.
    Empty,
    Loaded,
    Migrated(LegacyFormat),
    /// Stored record was unusable and has been discarded.
    Corrupt(GameError),
    /// The slot could not be read; starting empty in memory.
    Unavailable(String),
}

impl LoadOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadOutcome::Empty => "empty",
            LoadOutcome::Loaded => "loaded",
            LoadOutcome::Migrated(_) => "migrated",
            LoadOutcome::Corrupt(_) => "corrupt",
            LoadOutcome::Unavailable(_) => "unavailable",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub outcome: LoadOutcome,
    pub banked: usize,
    pub saved: usize,
}

impl LoadReport {
    /// The corrupt-state error a host may want to surface, if the load fell back.
    pub fn warning(&self) -> Option<&GameError> {
        match &self.outcome {
            LoadOutcome::Corrupt(err) => Some(err),
            _ => None,
        }
    }
}

pub struct ScoreStore<S: KvSlot> {
    slot: S,
    cfg: StoreConfig,
    clock: Arc<dyn Clock>,
    log: ScoreLog,
    degraded: bool,
    last_digest: Option<String>,
}

impl<S: KvSlot> ScoreStore<S> {
    /// Read the slot and build a store. Never fails: absent, corrupt or unreadable
    /// records all start an empty store, and the report says which.
    pub fn load(slot: S, cfg: StoreConfig, clock: Arc<dyn Clock>) -> (Self, LoadReport) {
        let mut store = Self {
            slot,
            cfg,
            clock,
            log: ScoreLog::default(),
            degraded: false,
            last_digest: None,
        };
        let outcome = store.read_slot();
        store.prune();
        if matches!(outcome, LoadOutcome::Migrated(_)) {
            // rewrite in the current layout so the legacy record is read only once
            store.persist();
        }
        let report = LoadReport {
            outcome,
            banked: store.log.banked.len(),
            saved: store.log.saved.len(),
        };
        log_store_load(&store.cfg.key, report.outcome.as_str(), report.banked, report.saved);
        (store, report)
    }

    fn read_slot(&mut self) -> LoadOutcome {
        match self.slot.get(&self.cfg.key) {
            Ok(None) => LoadOutcome::Empty,
            Ok(Some(bytes)) => match codec::decode(&bytes) {
                Ok(Decoded::Current(log)) => {
                    self.log = log;
                    self.last_digest = Some(codec::digest(&bytes));
                    LoadOutcome::Loaded
                }
                Ok(Decoded::Migrated(log, format)) => {
                    self.log = log;
                    LoadOutcome::Migrated(format)
                }
                Err(err) => {
                    log_store_fallback(&self.cfg.key, &err.to_string());
                    LoadOutcome::Corrupt(err)
                }
            },
            Err(err) => {
                self.degraded = true;
                log_store_degraded(&self.cfg.key, "get", &err.to_string());
                LoadOutcome::Unavailable(err.to_string())
            }
        }
    }

    /// Pick up writes made through another handle on the same slot. Skipped while
    /// degraded, where memory is the only up-to-date copy.
    fn refresh(&mut self) {
        if self.degraded {
            return;
        }
        if let Ok(Some(bytes)) = self.slot.get(&self.cfg.key) {
            let digest = codec::digest(&bytes);
            if self.last_digest.as_deref() == Some(digest.as_str()) {
                return;
            }
            if let Ok(decoded) = codec::decode(&bytes) {
                self.log = decoded.into_log();
                self.last_digest = Some(digest);
            }
        }
    }

    pub fn append_banked(&mut self, mut event: ScoreEvent) -> Result<PersistStatus, GameError> {
        event.origin = Origin::Banked;
        self.append(event)
    }

    pub fn append_saved(&mut self, mut event: ScoreEvent) -> Result<PersistStatus, GameError> {
        event.origin = Origin::Saved;
        event.detail = None;
        self.append(event)
    }

    fn append(&mut self, event: ScoreEvent) -> Result<PersistStatus, GameError> {
        event.validate()?;
        self.refresh();
        log_score_appended(event.origin.as_str(), &event.participant_id, event.score, event.ts);
        match event.origin {
            Origin::Banked => self.log.banked.push(event),
            Origin::Saved => self.log.saved.push(event),
        }
        Ok(self.persist())
    }

    /// Clear both histories. Irreversible.
    pub fn reset(&mut self) -> PersistStatus {
        self.log = ScoreLog::default();
        log_store_reset(&self.cfg.key);
        self.persist()
    }

    pub fn prune(&mut self) {
        let (banked, saved) = self.log.prune(self.clock.now_ms(), &self.cfg);
        if banked + saved > 0 {
            log_pruned(banked, saved);
        }
    }

    /// Prune and write the record.
    pub fn persist(&mut self) -> PersistStatus {
        self.prune();
        let bytes = match codec::encode(&self.log) {
            Ok(bytes) => bytes,
            Err(err) => {
                log_store_degraded(&self.cfg.key, "encode", &err.to_string());
                self.degraded = true;
                return PersistStatus::Degraded;
            }
        };
        match self.slot.set(&self.cfg.key, &bytes) {
            Ok(()) => {
                let digest = codec::digest(&bytes);
                log_audit(&self.cfg.key, &digest, bytes.len());
                self.last_digest = Some(digest);
                self.degraded = false;
                PersistStatus::Persisted
            }
            Err(err) => {
                log_store_degraded(&self.cfg.key, "set", &err.to_string());
                self.degraded = true;
                PersistStatus::Degraded
            }
        }
    }

    /// Current histories with the retention window applied as of now.
    pub fn snapshot(&self) -> ScoreLog {
        self.log.clone().pruned(self.clock.now_ms(), &self.cfg)
    }

    pub fn log(&self) -> &ScoreLog {
        &self.log
    }

    pub fn banked(&self) -> &[ScoreEvent] {
        &self.log.banked
    }

    pub fn saved(&self) -> &[ScoreEvent] {
        &self.log.saved
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn config(&self) -> &StoreConfig {
        &self.cfg
    }

    pub fn slot(&self) -> &S {
        &self.slot
    }

    pub fn into_slot(self) -> S {
        self.slot
    }
}
