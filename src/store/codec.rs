//! Persisted record format and migration from older layouts.
//!
//! Current layout: `{"version": 3, "banked": [...], "saved": [...]}`.
//! Older layouts still accepted on load:
//! - `{"banks": [...], "saves": [...]}` with `wallet`/`total`/`name`/`username` fields
//! - a flat list of events where saved entries carry `minted: true` (or `saved: true`)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::event::{BankDetail, Origin, ScoreEvent};
use super::ScoreLog;
use crate::error::GameError;

pub const FORMAT_VERSION: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyFormat {
    /// `{banks, saves}` record.
    SplitLists,
    /// One undifferentiated list.
    FlatList,
}

impl LegacyFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LegacyFormat::SplitLists => "split_lists",
            LegacyFormat::FlatList => "flat_list",
        }
    }
}

#[derive(Debug)]
pub enum Decoded {
    Current(ScoreLog),
    Migrated(ScoreLog, LegacyFormat),
}

impl Decoded {
    pub fn into_log(self) -> ScoreLog {
        match self {
            Decoded::Current(log) | Decoded::Migrated(log, _) => log,
        }
    }
}

#[derive(Serialize)]
struct RecordRef<'a> {
    version: u32,
    banked: &'a [ScoreEvent],
    saved: &'a [ScoreEvent],
}

/// A missing `version` reads as the current layout written without a stamp.
#[derive(Deserialize)]
struct Record {
    #[serde(default = "unstamped")]
    version: u32,
    #[serde(default)]
    banked: Vec<ScoreEvent>,
    #[serde(default)]
    saved: Vec<ScoreEvent>,
}

fn unstamped() -> u32 {
    FORMAT_VERSION
}

pub fn encode(log: &ScoreLog) -> Result<Vec<u8>> {
    let record = RecordRef {
        version: FORMAT_VERSION,
        banked: &log.banked,
        saved: &log.saved,
    };
    Ok(serde_json::to_vec(&record)?)
}

pub fn decode(bytes: &[u8]) -> Result<Decoded, GameError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| GameError::corrupt(format!("not json: {}", e)))?;

    match &value {
        Value::Object(map)
            if map.contains_key("version") || map.contains_key("banked") || map.contains_key("saved") =>
        {
            let record = Record::deserialize(&value)
                .map_err(|e| GameError::corrupt(format!("bad record: {}", e)))?;
            if record.version > FORMAT_VERSION {
                return Err(GameError::corrupt(format!(
                    "unknown record version {}",
                    record.version
                )));
            }
            Ok(Decoded::Current(ScoreLog {
                banked: with_origin(record.banked, Origin::Banked),
                saved: with_origin(record.saved, Origin::Saved),
            }))
        }
        Value::Object(map) if map.contains_key("banks") || map.contains_key("saves") => {
            let banked = legacy_list(map.get("banks"), Origin::Banked)?;
            let saved = legacy_list(map.get("saves"), Origin::Saved)?;
            Ok(Decoded::Migrated(ScoreLog { banked, saved }, LegacyFormat::SplitLists))
        }
        Value::Array(items) => {
            let banked = items
                .iter()
                .filter_map(|v| legacy_event(v, Origin::Banked))
                .collect();
            let saved = items
                .iter()
                .filter(|v| flag(v, "minted") || flag(v, "saved"))
                .filter_map(|v| legacy_event(v, Origin::Saved))
                .collect();
            Ok(Decoded::Migrated(ScoreLog { banked, saved }, LegacyFormat::FlatList))
        }
        _ => Err(GameError::corrupt("unrecognized record shape")),
    }
}

/// Hex SHA-256 of an encoded record.
pub fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn with_origin(mut events: Vec<ScoreEvent>, origin: Origin) -> Vec<ScoreEvent> {
    for e in &mut events {
        e.origin = origin;
    }
    events
}

fn legacy_list(value: Option<&Value>, origin: Origin) -> Result<Vec<ScoreEvent>, GameError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.iter().filter_map(|v| legacy_event(v, origin)).collect()),
        Some(_) => Err(GameError::corrupt(format!("{} list is not an array", origin.as_str()))),
    }
}

fn flag(v: &Value, key: &str) -> bool {
    v.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Map one legacy entry onto the current shape. Entries without an identity or with a
/// negative score are dropped; a missing timestamp becomes 0 and is pruned as expired.
fn legacy_event(v: &Value, origin: Origin) -> Option<ScoreEvent> {
    let participant_id = ["participantId", "wallet"]
        .iter()
        .find_map(|k| v.get(*k).and_then(Value::as_str))
        .filter(|s| !s.trim().is_empty())?
        .to_string();

    let score_keys: &[&str] = match origin {
        Origin::Saved => &["score", "total"],
        Origin::Banked => &["total", "score"],
    };
    let score = score_keys.iter().find_map(|k| v.get(*k).and_then(as_score));
    let score = match score {
        Some(Some(s)) => s,
        Some(None) => return None,
        None => 0,
    };

    let ts = v.get("ts").and_then(Value::as_f64).map(|t| t as i64).unwrap_or(0);

    let display_name = v
        .get("displayName")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            v.get("username")
                .and_then(Value::as_str)
                .filter(|u| !u.is_empty())
                .map(|u| format!("@{}", u))
        })
        .or_else(|| v.get("name").and_then(Value::as_str).map(str::to_string))
        .filter(|n| !n.is_empty());

    let detail = match origin {
        Origin::Banked => match (v.get("run").and_then(as_score), v.get("pumps").and_then(Value::as_u64)) {
            (Some(Some(run_points)), Some(pumps)) => Some(BankDetail {
                run_points,
                pumps: pumps.min(u32::MAX as u64) as u32,
                multiplier: v.get("mult").and_then(Value::as_f64).unwrap_or(1.0),
            }),
            _ => None,
        },
        Origin::Saved => None,
    };

    Some(ScoreEvent {
        ts,
        participant_id,
        score,
        display_name,
        detail,
        origin,
    })
}

/// `Some(None)` for a present but negative score, so the caller can drop the entry.
fn as_score(v: &Value) -> Option<Option<u64>> {
    let n = v.as_f64()?;
    if n < 0.0 {
        Some(None)
    } else {
        Some(Some(n.floor() as u64))
    }
}
