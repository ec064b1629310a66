//! Structured JSON-lines logging.
//!
//! One record per line with run id, sequence number, level, domain and an event
//! name, so a session can be replayed or grepped after the fact.
//! Records go to stderr; stdout belongs to the game loop. When `LOG_DIR` is set
//! they are also appended under `LOG_DIR/<run_id>/`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

// =============================================================================
// Log Domains (categories for filtering)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Round,   // Round starts, pumps, pops, banks
    Store,   // Load, append, prune, persistence health
    Rank,    // Leaderboard queries and previews
    Session, // Player totals, save offers, commits
    System,  // Startup, shutdown
    Audit,   // Digests of persisted records
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Round => "round",
            Domain::Store => "store",
            Domain::Rank => "rank",
            Domain::Session => "session",
            Domain::System => "system",
            Domain::Audit => "audit",
        }
    }

    pub fn is_enabled(&self) -> bool {
        // LOG_DOMAINS: comma-separated list or "all"
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Run context
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug)]
struct RunContext {
    run_id: String,
    events: Option<Mutex<BufWriter<File>>>,
    trace: Option<Mutex<BufWriter<File>>>,
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()));
        let (events, trace) = match std::env::var("LOG_DIR") {
            Ok(base) => {
                let mut run_dir = PathBuf::from(base);
                run_dir.push(&run_id);
                if let Err(err) = create_dir_all(&run_dir) {
                    eprintln!("[log] failed to create run dir: {}", err);
                }
                (
                    open_sink(run_dir.join("events.jsonl")),
                    open_sink(run_dir.join("trace.jsonl")),
                )
            }
            Err(_) => (None, None),
        };
        RunContext { run_id, events, trace }
    })
}

fn open_sink(path: PathBuf) -> Option<Mutex<BufWriter<File>>> {
    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => Some(Mutex::new(BufWriter::new(file))),
        Err(err) => {
            eprintln!("[log] failed to open {}: {}", path.display(), err);
            None
        }
    }
}

fn split_fields(mut fields: Map<String, Value>) -> (Map<String, Value>, Map<String, Value>) {
    let mut top = Map::new();
    for key in ["participant_id", "round", "msg"] {
        if let Some(value) = fields.remove(key) {
            top.insert(key.to_string(), value);
        }
    }
    (top, fields)
}

fn write_line(writer: &Option<Mutex<BufWriter<File>>>, line: &str) {
    if let Some(writer) = writer {
        if let Ok(mut w) = writer.lock() {
            let _ = writeln!(w, "{}", line);
            let _ = w.flush();
        }
    }
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Epoch milliseconds
pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    if level < Level::from_env() || !domain.is_enabled() {
        return;
    }
    emit_record(level, domain.as_str(), event, fields);
}

fn emit_record(level: Level, component: &str, event: &str, fields: Map<String, Value>) {
    let ctx = ensure_run_context();
    let (mut top, data) = split_fields(fields);

    let msg = top.remove("msg").unwrap_or(Value::String(String::new()));
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(ctx.run_id.clone()));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(component));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    for (k, v) in top {
        entry.insert(k, v);
    }
    entry.insert("data".to_string(), Value::Object(data));

    let line = Value::Object(entry).to_string();
    match level {
        Level::Trace | Level::Debug => write_line(&ctx.trace, &line),
        _ => write_line(&ctx.events, &line),
    }
    eprintln!("{}", line);
}

// =============================================================================
// Round logs
// =============================================================================

pub fn log_round_start(participant_id: &str, round: u64, streak: u32) {
    log(
        Level::Debug,
        Domain::Round,
        "round_start",
        obj(&[
            ("participant_id", v_str(participant_id)),
            ("round", json!(round)),
            ("streak", json!(streak)),
        ]),
    );
}

pub fn log_pump(participant_id: &str, round: u64, pumps: u32, ratio: f64, tier: &str, gained: u64) {
    log(
        Level::Trace,
        Domain::Round,
        "pump",
        obj(&[
            ("participant_id", v_str(participant_id)),
            ("round", json!(round)),
            ("pumps", json!(pumps)),
            ("ratio", v_num(ratio)),
            ("tier", v_str(tier)),
            ("gained", json!(gained)),
        ]),
    );
}

pub fn log_pop(participant_id: &str, round: u64, forfeited: u64, surprise: bool) {
    log(
        Level::Info,
        Domain::Round,
        "pop",
        obj(&[
            ("participant_id", v_str(participant_id)),
            ("round", json!(round)),
            ("forfeited", json!(forfeited)),
            ("surprise", json!(surprise)),
        ]),
    );
}

pub fn log_bank(participant_id: &str, round: u64, points: u64, total: u64, streak: u32) {
    log(
        Level::Info,
        Domain::Round,
        "bank",
        obj(&[
            ("participant_id", v_str(participant_id)),
            ("round", json!(round)),
            ("points", json!(points)),
            ("total", json!(total)),
            ("streak", json!(streak)),
        ]),
    );
}

pub fn log_rejected(participant_id: &str, op: &str, reason: &str) {
    log(
        Level::Debug,
        Domain::Round,
        "rejected",
        obj(&[
            ("participant_id", v_str(participant_id)),
            ("op", v_str(op)),
            ("msg", v_str(reason)),
        ]),
    );
}

// =============================================================================
// Store logs
// =============================================================================

pub fn log_store_load(key: &str, outcome: &str, banked: usize, saved: usize) {
    log(
        Level::Info,
        Domain::Store,
        "load",
        obj(&[
            ("key", v_str(key)),
            ("outcome", v_str(outcome)),
            ("banked", json!(banked)),
            ("saved", json!(saved)),
        ]),
    );
}

/// Persisted record was unusable and has been discarded.
pub fn log_store_fallback(key: &str, reason: &str) {
    log(
        Level::Warn,
        Domain::Store,
        "corrupt_fallback",
        obj(&[("key", v_str(key)), ("msg", v_str(reason))]),
    );
}

/// Slot read or write failed; the store keeps running in memory.
pub fn log_store_degraded(key: &str, op: &str, reason: &str) {
    log(
        Level::Warn,
        Domain::Store,
        "degraded",
        obj(&[("key", v_str(key)), ("op", v_str(op)), ("msg", v_str(reason))]),
    );
}

pub fn log_score_appended(origin: &str, participant_id: &str, score: u64, ts: i64) {
    log(
        Level::Debug,
        Domain::Store,
        "append",
        obj(&[
            ("origin", v_str(origin)),
            ("participant_id", v_str(participant_id)),
            ("score", json!(score)),
            ("event_ts", json!(ts)),
        ]),
    );
}

pub fn log_pruned(banked_dropped: usize, saved_dropped: usize) {
    log(
        Level::Debug,
        Domain::Store,
        "prune",
        obj(&[
            ("banked_dropped", json!(banked_dropped)),
            ("saved_dropped", json!(saved_dropped)),
        ]),
    );
}

pub fn log_store_reset(key: &str) {
    log(Level::Warn, Domain::Store, "reset", obj(&[("key", v_str(key))]));
}

// =============================================================================
// Session / rank logs
// =============================================================================

pub fn log_save_offer(participant_id: &str, total: u64, reasons: &[&str], rank: usize, of: usize) {
    log(
        Level::Info,
        Domain::Session,
        "save_offer",
        obj(&[
            ("participant_id", v_str(participant_id)),
            ("total", json!(total)),
            ("reasons", Value::Array(reasons.iter().map(|r| v_str(r)).collect())),
            ("rank", json!(rank)),
            ("of", json!(of)),
        ]),
    );
}

pub fn log_commit(participant_id: &str, score: u64, receipt: &str) {
    log(
        Level::Info,
        Domain::Session,
        "commit",
        obj(&[
            ("participant_id", v_str(participant_id)),
            ("score", json!(score)),
            ("receipt", v_str(receipt)),
        ]),
    );
}

pub fn log_board_query(window: &str, entries: usize, candidates: usize) {
    log(
        Level::Trace,
        Domain::Rank,
        "board",
        obj(&[
            ("window", v_str(window)),
            ("entries", json!(entries)),
            ("candidates", json!(candidates)),
        ]),
    );
}

pub fn log_startup(participant_id: &str, backend: &str, key: &str, pop_model: &str) {
    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("participant_id", v_str(participant_id)),
            ("backend", v_str(backend)),
            ("key", v_str(key)),
            ("pop_model", v_str(pop_model)),
        ]),
    );
}

/// Session summary on shutdown
pub fn log_session_summary(
    participant_id: &str,
    rounds: u64,
    pops: u64,
    banks: u64,
    total: u64,
    best_run: u64,
) {
    log(
        Level::Info,
        Domain::System,
        "session_summary",
        obj(&[
            ("participant_id", v_str(participant_id)),
            ("rounds", json!(rounds)),
            ("pops", json!(pops)),
            ("banks", json!(banks)),
            ("total", json!(total)),
            ("best_run", json!(best_run)),
        ]),
    );
}

// =============================================================================
// Audit Trail Logs
// =============================================================================

/// Digest of the record just written, for comparing slots across runs.
pub fn log_audit(key: &str, digest: &str, bytes: usize) {
    log(
        Level::Debug,
        Domain::Audit,
        "persist",
        obj(&[
            ("key", v_str(key)),
            ("state_hash", v_str(digest)),
            ("bytes", json!(bytes)),
        ]),
    );
}

// =============================================================================
// Utility Functions
// =============================================================================

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

// =============================================================================
// Tests
// =============================================================================
