//! Interactive terminal host: one player, one store, commands on stdin.

use std::sync::Arc;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::io::{AsyncBufReadExt, BufReader};

use basepressure::commit::{commit_and_record, LocalCommit};
use basepressure::config::Config;
use basepressure::logging::log_startup;
use basepressure::rank::{BoardWindow, RankEngine};
use basepressure::session::{BankReceipt, PlayerSession};
use basepressure::source::{Clock, SystemClock};
use basepressure::store::event::short_id;
use basepressure::store::queue::StoreHandle;
use basepressure::store::{PersistStatus, ScoreEvent, ScoreStore};

const HELP: &str = "commands: pump | bank | save | board [daily|weekly|all] | preview | status | reset | quit";

fn print_board(board: &[ScoreEvent], window: BoardWindow) {
    println!("--- {} board ---", window.as_str());
    if board.is_empty() {
        println!("  (no saved scores)");
    }
    for (i, e) in board.iter().enumerate() {
        let name = e.display_name.clone().unwrap_or_else(|| short_id(&e.participant_id));
        println!("{:>3}. {:<24} {:>8}", i + 1, name, e.score);
    }
}

fn print_bank(receipt: &BankReceipt) {
    println!(
        "banked {} (x{:.2}, {} pumps) total {} streak {}",
        receipt.points, receipt.multiplier, receipt.pumps, receipt.total, receipt.streak
    );
    if receipt.persist == Some(PersistStatus::Degraded) {
        println!("  storage unavailable, history kept in memory only");
    }
    if let Some(offer) = &receipt.offer {
        let reasons: Vec<&str> = offer.reasons.iter().map(|r| r.as_str()).collect();
        println!(
            "  save {}? would rank #{} of {} on the {} board [{}]",
            offer.total,
            offer.preview.rank,
            offer.preview.total,
            offer.window.as_str(),
            reasons.join(", ")
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let participant = cfg.participant();
    log_startup(
        &participant.id,
        cfg.store_backend.as_str(),
        &cfg.store.key,
        cfg.round.pop_model.as_str(),
    );

    let (store, report) = ScoreStore::load(cfg.open_slot()?, cfg.store.clone(), clock.clone());
    if let Some(warning) = report.warning() {
        println!("previous history was unreadable and has been discarded ({})", warning);
    }
    let mut session = PlayerSession::new(
        participant.clone(),
        cfg.round.clone(),
        StdRng::from_entropy(),
        clock.clone(),
    );
    session.resume(store.log());

    let (store, worker) = StoreHandle::spawn(store);
    let ranks = RankEngine::local(clock.clone());
    let hook = LocalCommit;
    let mut window = cfg.board_window;

    println!("playing as {} (total {})", participant.label(), session.total());
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let mut words = line.split_whitespace();
        let cmd = match words.next() {
            Some(cmd) => cmd.to_ascii_lowercase(),
            None => continue,
        };
        match cmd.as_str() {
            "pump" | "p" => match session.pump() {
                Ok(out) if out.popped => {
                    println!("POP! lost {} points, streak reset", out.forfeited);
                }
                Ok(out) => println!(
                    "+{} run {} x{:.2} pressure {:.0}% {}",
                    out.gained,
                    out.run_points,
                    out.multiplier,
                    out.pressure_ratio * 100.0,
                    out.tier.as_str()
                ),
                Err(err) => println!("{}", err),
            },
            "bank" | "b" => {
                let mut receipt = match session.bank() {
                    Ok(receipt) => receipt,
                    Err(err) => {
                        println!("{}", err);
                        continue;
                    }
                };
                match store.append_banked(receipt.event.clone()).await {
                    Ok(status) => receipt.persist = Some(status),
                    Err(err) => println!("bank not recorded: {}", err),
                }
                let log = store.snapshot().await?;
                receipt.offer = session.save_offer(&log, &ranks, window, &receipt);
                print_bank(&receipt);
            }
            "save" | "s" => {
                let event = match session.save_event() {
                    Ok(event) => event,
                    Err(err) => {
                        println!("{}", err);
                        continue;
                    }
                };
                match commit_and_record(&hook, &store, event).await {
                    Ok((receipt, status)) => {
                        let reference: String = receipt.reference.chars().take(12).collect();
                        println!("saved {} ({})", receipt.score, reference);
                        if status == PersistStatus::Degraded {
                            println!("  storage unavailable, save kept in memory only");
                        }
                    }
                    Err(err) => println!("save failed: {}", err),
                }
            }
            "board" => {
                if let Some(arg) = words.next() {
                    match BoardWindow::parse(arg) {
                        Some(w) => window = w,
                        None => {
                            println!("unknown board '{}'", arg);
                            continue;
                        }
                    }
                }
                let log = store.snapshot().await?;
                print_board(&ranks.ranked_board(&log.saved, window, cfg.board_limit), window);
            }
            "preview" => match session.save_event() {
                Ok(candidate) => {
                    let log = store.snapshot().await?;
                    let preview = ranks.preview_rank(&log.saved, window, &candidate);
                    println!(
                        "{} would rank #{} of {} on the {} board",
                        candidate.score,
                        preview.rank,
                        preview.total,
                        window.as_str()
                    );
                }
                Err(err) => println!("{}", err),
            },
            "status" => {
                let round = session.round();
                println!(
                    "total {} streak {} | round {} pumps {} run {} x{:.2} pressure {:.0}% {}",
                    session.total(),
                    session.streak(),
                    round.round_seq,
                    round.pumps,
                    round.run_points,
                    round.multiplier,
                    session.pressure_ratio() * 100.0,
                    session.risk_tier().as_str()
                );
            }
            "reset" => {
                session.reset();
                if store.reset().await? == PersistStatus::Degraded {
                    println!("storage unavailable, cleared in memory only");
                }
                println!("local history cleared");
            }
            "quit" | "q" | "exit" => break,
            _ => println!("{}", HELP),
        }
    }

    session.log_summary();
    drop(store);
    worker.await?;
    Ok(())
}
