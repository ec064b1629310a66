//! Print the leaderboard from the configured store.
//!
//! Usage: board [daily|weekly|all] [limit]

use std::sync::Arc;

use anyhow::{bail, Result};

use basepressure::config::Config;
use basepressure::rank::{BoardWindow, RankEngine};
use basepressure::source::{Clock, SystemClock};
use basepressure::store::event::short_id;
use basepressure::store::ScoreStore;

fn main() -> Result<()> {
    let cfg = Config::from_env();
    let mut args = std::env::args().skip(1);
    let window = match args.next() {
        Some(arg) => match BoardWindow::parse(&arg) {
            Some(w) => w,
            None => bail!("unknown board '{}', expected daily, weekly or all", arg),
        },
        None => cfg.board_window,
    };
    let limit = args.next().and_then(|v| v.parse().ok()).unwrap_or(cfg.board_limit);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (store, report) = ScoreStore::load(cfg.open_slot()?, cfg.store.clone(), clock.clone());
    if let Some(warning) = report.warning() {
        eprintln!("warning: {}", warning);
    }

    let ranks = RankEngine::local(clock);
    let board = ranks.ranked_board(store.saved(), window, limit);

    println!("=== {} BOARD ({} saved, {} banked) ===", window.as_str().to_uppercase(), report.saved, report.banked);
    if board.is_empty() {
        println!("no saved scores in this window");
    }
    for (i, e) in board.iter().enumerate() {
        let name = e.display_name.clone().unwrap_or_else(|| short_id(&e.participant_id));
        println!("{:>3}. {:<24} {:>8}", i + 1, name, e.score);
    }
    Ok(())
}
