//! Leaderboard behavior through the store and rank engine together.

use std::sync::Arc;

use chrono::{FixedOffset, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use basepressure::rank::{best_per_participant, start_of_local_day, BoardWindow, RankEngine, RankPreview};
use basepressure::source::ManualClock;
use basepressure::store::{MemorySlot, Participant, ScoreEvent, ScoreStore, StoreConfig};
use basepressure::verify::invariants::assert_board_order;

// 2024-01-10 15:30:00 UTC
const NOW: i64 = 1_704_900_600_000;
const HOUR: i64 = 3_600_000;

fn saved(ts: i64, who: &str, score: u64) -> ScoreEvent {
    ScoreEvent::saved(ts, &Participant::new(who), score)
}

fn fresh_store(clock: Arc<ManualClock>) -> ScoreStore<MemorySlot> {
    ScoreStore::load(MemorySlot::new(), StoreConfig::default(), clock).0
}

fn scores(board: &[ScoreEvent]) -> Vec<(&str, u64)> {
    board.iter().map(|e| (e.participant_id.as_str(), e.score)).collect()
}

// ---------------------------------------------------------------------------
// Documented scenarios
// ---------------------------------------------------------------------------
#[test]
fn all_time_board_orders_by_score() {
    // Epoch-relative timestamps, so keep retention from pruning them.
    let clock = Arc::new(ManualClock::new(1));
    let mut store = fresh_store(clock.clone());
    store.append_saved(saved(0, "0xA", 100)).unwrap();
    store.append_saved(saved(1, "0xB", 150)).unwrap();

    let ranks = RankEngine::new(Utc, clock);
    let board = ranks.ranked_board(store.saved(), BoardWindow::AllTime, 10);
    assert_eq!(scores(&board), vec![("0xB", 150), ("0xA", 100)]);
}

#[test]
fn later_lower_save_does_not_replace_best() {
    let clock = Arc::new(ManualClock::new(NOW));
    let mut store = fresh_store(clock.clone());
    store.append_saved(saved(NOW - 2 * HOUR, "0xA", 100)).unwrap();
    store.append_saved(saved(NOW - HOUR, "0xA", 80)).unwrap();

    let best = best_per_participant(store.saved());
    assert_eq!(best.len(), 1);
    assert_eq!(best[0].score, 100);
    assert_eq!(best[0].ts, NOW - 2 * HOUR);
}

#[test]
fn preview_ranks_without_writing() {
    let clock = Arc::new(ManualClock::new(NOW));
    let mut store = fresh_store(clock.clone());
    store.append_saved(saved(NOW - 2 * HOUR, "0xA", 150)).unwrap();
    store.append_saved(saved(NOW - HOUR, "0xB", 100)).unwrap();
    let before = store.snapshot();

    let ranks = RankEngine::new(Utc, clock);
    let preview = ranks.preview_rank(store.saved(), BoardWindow::Daily, &saved(NOW, "0xC", 120));
    assert_eq!(preview, RankPreview { rank: 2, total: 3 });
    assert_eq!(store.snapshot(), before);
}

// ---------------------------------------------------------------------------
// Ordering properties
// ---------------------------------------------------------------------------
#[test]
fn best_per_participant_ignores_input_order() {
    let mut events = Vec::new();
    for i in 0..60u64 {
        let who = format!("0x{}", i % 7);
        // plenty of equal scores to exercise the tie-breaks
        events.push(saved(NOW - (i as i64 % 5) * HOUR, &who, 10 * (i % 4)));
    }
    let expected = best_per_participant(&events);
    let mut rng = StdRng::seed_from_u64(9);
    for _ in 0..50 {
        events.shuffle(&mut rng);
        assert_eq!(best_per_participant(&events), expected);
    }
}

#[test]
fn ranked_board_is_a_total_order() {
    let clock = Arc::new(ManualClock::new(NOW));
    let ranks = RankEngine::new(Utc, clock);
    let mut rng = StdRng::seed_from_u64(3);
    let mut events: Vec<ScoreEvent> = (0..80u64)
        .map(|i| saved(NOW - (i as i64 % 9) * HOUR, &format!("0x{:02}", i % 25), (i * 37) % 11 * 5))
        .collect();
    events.shuffle(&mut rng);

    let board = ranks.ranked_board(&events, BoardWindow::AllTime, 100);
    assert_board_order(&board).unwrap();
    for pair in board.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(a.score > b.score || (a.score == b.score && a.ts >= b.ts));
    }
}

// ---------------------------------------------------------------------------
// Windows
// ---------------------------------------------------------------------------
#[test]
fn daily_window_boundary_is_inclusive() {
    let tz = FixedOffset::west_opt(5 * 3600).unwrap();
    let clock = Arc::new(ManualClock::new(NOW));
    let ranks = RankEngine::new(tz, clock);
    let start = start_of_local_day(&tz, NOW).unwrap();

    let events = vec![saved(start, "0xIN", 10), saved(start - 1, "0xOUT", 99)];
    let board = ranks.ranked_board(&events, BoardWindow::Daily, 10);
    assert_eq!(scores(&board), vec![("0xIN", 10)]);
}

#[test]
fn weekly_board_spans_the_iso_week() {
    let clock = Arc::new(ManualClock::new(NOW));
    let ranks = RankEngine::new(Utc, clock);
    // Monday 00:00, Sunday before it, and today
    let monday = 1_704_672_000_000;
    let events = vec![saved(monday, "0xMON", 5), saved(monday - 1, "0xSUN", 50), saved(NOW, "0xWED", 7)];

    let weekly = ranks.ranked_board(&events, BoardWindow::Weekly, 10);
    assert_eq!(scores(&weekly), vec![("0xWED", 7), ("0xMON", 5)]);
    let daily = ranks.ranked_board(&events, BoardWindow::Daily, 10);
    assert_eq!(scores(&daily), vec![("0xWED", 7)]);
}

#[test]
fn board_rolls_over_at_midnight() {
    let clock = Arc::new(ManualClock::new(NOW));
    let ranks = RankEngine::new(Utc, clock.clone());
    let events = vec![saved(NOW, "0xA", 10)];
    assert_eq!(ranks.ranked_board(&events, BoardWindow::Daily, 10).len(), 1);

    clock.advance(9 * HOUR);
    assert!(ranks.ranked_board(&events, BoardWindow::Daily, 10).is_empty());
    assert_eq!(ranks.ranked_board(&events, BoardWindow::Weekly, 10).len(), 1);
}
