//! Leaderboard queries over saved scores.
//!
//! Everything here is a pure function of the saved events, the clock and the
//! time zone; nothing is cached and nothing writes back to the store.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Datelike, Days, Local, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use crate::logging::log_board_query;
use crate::source::Clock;
use crate::store::ScoreEvent;

pub const DEFAULT_BOARD_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardWindow {
    Daily,
    Weekly,
    AllTime,
}

impl BoardWindow {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" => Some(BoardWindow::Daily),
            "weekly" | "week" => Some(BoardWindow::Weekly),
            "all" | "alltime" | "all_time" | "all-time" => Some(BoardWindow::AllTime),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BoardWindow::Daily => "daily",
            BoardWindow::Weekly => "weekly",
            BoardWindow::AllTime => "all_time",
        }
    }
}

/// Local midnight of the day containing `now_ms`.
pub fn start_of_local_day<Tz: TimeZone>(tz: &Tz, now_ms: i64) -> Option<i64> {
    let now = tz.timestamp_millis_opt(now_ms).single()?;
    local_midnight(tz, now.date_naive())
}

/// Local midnight of the Monday starting the ISO week containing `now_ms`.
pub fn start_of_iso_week<Tz: TimeZone>(tz: &Tz, now_ms: i64) -> Option<i64> {
    let now = tz.timestamp_millis_opt(now_ms).single()?;
    let date = now.date_naive();
    let back = date.weekday().num_days_from_monday() as u64;
    local_midnight(tz, date.checked_sub_days(Days::new(back))?)
}

fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> Option<i64> {
    // A DST jump can skip midnight; the day then starts at the first hour that exists.
    (0..24).find_map(|hour| {
        let naive = date.and_hms_opt(hour, 0, 0)?;
        tz.from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.timestamp_millis())
    })
}

/// Inclusive lower bound of a window, `None` for all-time.
pub fn window_start<Tz: TimeZone>(tz: &Tz, window: BoardWindow, now_ms: i64) -> Option<i64> {
    match window {
        BoardWindow::Daily => Some(start_of_local_day(tz, now_ms).unwrap_or(i64::MIN)),
        BoardWindow::Weekly => Some(start_of_iso_week(tz, now_ms).unwrap_or(i64::MIN)),
        BoardWindow::AllTime => None,
    }
}

/// Board order: higher score first, then the more recent entry. The remaining keys
/// only make the order total so reductions do not depend on input order.
pub fn board_cmp(a: &ScoreEvent, b: &ScoreEvent) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| b.ts.cmp(&a.ts))
        .then_with(|| a.participant_id.cmp(&b.participant_id))
        .then_with(|| a.display_name.cmp(&b.display_name))
}

/// Only saves with an identity and a positive score make the board.
fn is_board_entry(e: &ScoreEvent) -> bool {
    !e.participant_id.is_empty() && e.score > 0
}

/// One event per participant: the best by [`board_cmp`]. Returned in board order.
pub fn best_per_participant<'a, I>(events: I) -> Vec<ScoreEvent>
where
    I: IntoIterator<Item = &'a ScoreEvent>,
{
    let mut best: BTreeMap<&str, &ScoreEvent> = BTreeMap::new();
    for e in events.into_iter().filter(|e| is_board_entry(e)) {
        let replace = match best.get(e.participant_id.as_str()) {
            Some(prev) => board_cmp(e, prev) == Ordering::Less,
            None => true,
        };
        if replace {
            best.insert(e.participant_id.as_str(), e);
        }
    }
    let mut out: Vec<ScoreEvent> = best.into_values().cloned().collect();
    out.sort_by(board_cmp);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RankPreview {
    /// 1-based position the candidate would take.
    pub rank: usize,
    /// Participants on the previewed board, candidate included.
    pub total: usize,
}

pub struct RankEngine<Tz: TimeZone = Local> {
    tz: Tz,
    clock: Arc<dyn Clock>,
}

impl RankEngine<Local> {
    pub fn local(clock: Arc<dyn Clock>) -> Self {
        Self { tz: Local, clock }
    }
}

impl<Tz: TimeZone> RankEngine<Tz> {
    pub fn new(tz: Tz, clock: Arc<dyn Clock>) -> Self {
        Self { tz, clock }
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub fn filter_by_window<'a>(&self, events: &'a [ScoreEvent], window: BoardWindow) -> Vec<&'a ScoreEvent> {
        match window_start(&self.tz, window, self.clock.now_ms()) {
            Some(start) => events.iter().filter(|e| e.ts >= start).collect(),
            None => events.iter().collect(),
        }
    }

    /// Top `limit` participants of the window.
    pub fn ranked_board(&self, saved: &[ScoreEvent], window: BoardWindow, limit: usize) -> Vec<ScoreEvent> {
        let in_window = self.filter_by_window(saved, window);
        let candidates = in_window.len();
        let mut board = best_per_participant(in_window);
        board.truncate(limit);
        log_board_query(window.as_str(), board.len(), candidates);
        board
    }

    /// Where `candidate` would land if saved now, replacing its participant's current
    /// entry. The board is not truncated and nothing is written.
    pub fn preview_rank(&self, saved: &[ScoreEvent], window: BoardWindow, candidate: &ScoreEvent) -> RankPreview {
        let mut board: Vec<ScoreEvent> = best_per_participant(self.filter_by_window(saved, window))
            .into_iter()
            .filter(|e| e.participant_id != candidate.participant_id)
            .collect();
        board.push(candidate.clone());
        board.sort_by(board_cmp);
        let rank = board
            .iter()
            .position(|e| e.participant_id == candidate.participant_id)
            .map(|i| i + 1)
            .unwrap_or(board.len());
        RankPreview { rank, total: board.len() }
    }
}
