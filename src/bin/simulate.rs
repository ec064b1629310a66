//! Monte Carlo sweep of "bank after N pumps" policies across all cores.
//!
//! SIM_ROUNDS   rounds per policy (default 20000)
//! SIM_MAX_PUMPS  largest N tried (default 20)
//! SIM_SEED     base seed (default 7)

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;

use basepressure::round::{RoundConfig, RoundPhase, RunEngine};
use basepressure::verify::invariants::{assert_pump_step, assert_round_invariants};

#[derive(Debug, Clone, Copy, Default)]
struct PolicyResult {
    target: u32,
    rounds: u64,
    pops: u64,
    surprise_pops: u64,
    points: u64,
    best_streak: u32,
}

fn run_policy(cfg: &RoundConfig, target: u32, rounds: u64, seed: u64) -> Result<PolicyResult, String> {
    let mut engine = RunEngine::new(cfg.clone(), StdRng::seed_from_u64(seed));
    let mut res = PolicyResult { target, rounds, ..Default::default() };

    for _ in 0..rounds {
        engine.start_round();
        while engine.phase() == RoundPhase::Active && engine.state().pumps < target {
            let before = engine.state().clone();
            let out = engine.pump().map_err(|e| e.to_string())?;
            assert_pump_step(&before, engine.state()).map_err(|v| v.msg)?;
            assert_round_invariants(engine.state(), cfg).map_err(|v| v.msg)?;
            if out.popped {
                res.pops += 1;
                if out.surprise {
                    res.surprise_pops += 1;
                }
            }
        }
        if engine.phase() == RoundPhase::Active {
            let bank = engine.bank().map_err(|e| e.to_string())?;
            res.points += bank.points;
            res.best_streak = res.best_streak.max(bank.streak);
            assert_round_invariants(engine.state(), cfg).map_err(|v| v.msg)?;
        }
    }
    Ok(res)
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn main() {
    let cfg = RoundConfig::from_env();
    let rounds: u64 = env_or("SIM_ROUNDS", 20_000);
    let max_pumps: u32 = env_or("SIM_MAX_PUMPS", 20);
    let base_seed: u64 = env_or("SIM_SEED", 7);
    let n_threads = num_cpus::get().clamp(1, max_pumps.max(1) as usize);

    println!("=== POLICY SWEEP ({}) ===\n", cfg.pop_model.as_str());
    println!("Threads: {}", n_threads);
    println!("Rounds per policy: {}", rounds);
    println!();

    let next = Arc::new(AtomicU64::new(1));
    let results = Arc::new(Mutex::new(Vec::new()));
    let failures = Arc::new(Mutex::new(Vec::new()));
    let start = Instant::now();

    let mut handles = vec![];
    for _ in 0..n_threads {
        let cfg = cfg.clone();
        let next = Arc::clone(&next);
        let results = Arc::clone(&results);
        let failures = Arc::clone(&failures);
        handles.push(thread::spawn(move || loop {
            let target = next.fetch_add(1, Ordering::Relaxed) as u32;
            if target > max_pumps {
                break;
            }
            match run_policy(&cfg, target, rounds, base_seed.wrapping_add(target as u64)) {
                Ok(res) => results.lock().unwrap_or_else(|p| p.into_inner()).push(res),
                Err(msg) => failures
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .push(format!("bank@{}: {}", target, msg)),
            }
        }));
    }
    for h in handles {
        if h.join().is_err() {
            eprintln!("worker thread panicked");
        }
    }

    let mut results = results.lock().unwrap_or_else(|p| p.into_inner()).clone();
    results.sort_by_key(|r| r.target);

    println!(
        "{:>8} {:>10} {:>10} {:>12} {:>10}",
        "Bank@", "Pop rate", "Surprise", "Mean pts", "Streak"
    );
    println!("{}", "-".repeat(54));
    let mut best: Option<PolicyResult> = None;
    for r in &results {
        let mean = r.points as f64 / r.rounds.max(1) as f64;
        println!(
            "{:>8} {:>9.1}% {:>9.1}% {:>12.1} {:>10}",
            r.target,
            r.pops as f64 / r.rounds.max(1) as f64 * 100.0,
            r.surprise_pops as f64 / r.rounds.max(1) as f64 * 100.0,
            mean,
            r.best_streak
        );
        if best.map_or(true, |b| mean > b.points as f64 / b.rounds.max(1) as f64) {
            best = Some(*r);
        }
    }

    println!("\n=== Summary ===");
    println!("Total time: {:.2?}", start.elapsed());
    if let Some(b) = best {
        println!("Best policy: bank after {} pumps", b.target);
    }

    let failures = failures.lock().unwrap_or_else(|p| p.into_inner());
    if failures.is_empty() {
        println!("\n✓ Round invariants held in every policy");
    } else {
        for f in failures.iter() {
            println!("❌ {}", f);
        }
        std::process::exit(1);
    }
}
