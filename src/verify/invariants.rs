use crate::rank::board_cmp;
use crate::round::{RoundConfig, RoundPhase, RoundState};
use crate::store::{ScoreLog, StoreConfig};
use std::cmp::Ordering;

#[derive(Debug, Clone)]
pub struct InvariantViolation {
    pub msg: String,
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invariant violated: {}", self.msg)
    }
}

impl std::error::Error for InvariantViolation {}

fn violation(msg: impl Into<String>) -> InvariantViolation {
    InvariantViolation { msg: msg.into() }
}

pub fn assert_round_invariants(state: &RoundState, cfg: &RoundConfig) -> Result<(), InvariantViolation> {
    if state.pressure.is_nan() || state.multiplier.is_nan() || state.burst_threshold.is_nan() {
        return Err(violation("NaN in round state"));
    }
    if state.pressure < 0.0 {
        return Err(violation("pressure negative"));
    }
    if state.multiplier < 1.0 - 1e-9 || state.multiplier > cfg.mult_cap + 1e-9 {
        return Err(violation(format!("multiplier {} outside [1, {}]", state.multiplier, cfg.mult_cap)));
    }
    if state.popped != (state.phase == RoundPhase::Popped) {
        return Err(violation("popped flag disagrees with phase"));
    }
    match state.phase {
        RoundPhase::Popped => {
            if state.run_points != 0 || state.pumps != 0 || state.streak != 0 {
                return Err(violation("popped round kept points, pumps or streak"));
            }
        }
        RoundPhase::Banked => {
            if state.run_points != 0 {
                return Err(violation("banked round still holds points"));
            }
        }
        RoundPhase::Active => {
            if state.pumps == 0 && state.run_points != 0 {
                return Err(violation("points without pumps"));
            }
        }
        RoundPhase::Idle => {}
    }
    Ok(())
}

/// A pump must raise pressure and pump count by exactly one step and never lower the multiplier.
pub fn assert_pump_step(before: &RoundState, after: &RoundState) -> Result<(), InvariantViolation> {
    if before.phase != RoundPhase::Active {
        return Err(violation("pump step taken from a non-active round"));
    }
    if after.phase == RoundPhase::Popped {
        return Ok(());
    }
    if after.pumps != before.pumps + 1 {
        return Err(violation("pump count did not advance by one"));
    }
    if after.pressure <= before.pressure {
        return Err(violation("pressure did not increase"));
    }
    if after.multiplier < before.multiplier {
        return Err(violation("multiplier decreased"));
    }
    if after.run_points < before.run_points {
        return Err(violation("run points decreased without a pop"));
    }
    Ok(())
}

pub fn assert_store_invariants(log: &ScoreLog, cfg: &StoreConfig, now_ms: i64) -> Result<(), InvariantViolation> {
    if log.banked.len() > cfg.banked_cap {
        return Err(violation(format!("{} banked events over cap {}", log.banked.len(), cfg.banked_cap)));
    }
    if log.saved.len() > cfg.saved_cap {
        return Err(violation(format!("{} saved events over cap {}", log.saved.len(), cfg.saved_cap)));
    }
    let cutoff = now_ms - cfg.retention_ms();
    if let Some(e) = log.banked.iter().chain(log.saved.iter()).find(|e| e.ts < cutoff) {
        return Err(violation(format!("event at {} older than retention cutoff {}", e.ts, cutoff)));
    }
    if log.banked.iter().chain(log.saved.iter()).any(|e| e.participant_id.trim().is_empty()) {
        return Err(violation("event without participant"));
    }
    Ok(())
}

/// Board must be strictly ordered and hold one entry per participant.
pub fn assert_board_order(board: &[crate::store::ScoreEvent]) -> Result<(), InvariantViolation> {
    for pair in board.windows(2) {
        if board_cmp(&pair[0], &pair[1]) != Ordering::Less {
            return Err(violation(format!(
                "board out of order at {} ({}) / {} ({})",
                pair[0].participant_id, pair[0].score, pair[1].participant_id, pair[1].score
            )));
        }
    }
    let mut ids: Vec<&str> = board.iter().map(|e| e.participant_id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.len() != board.len() {
        return Err(violation("participant listed twice"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::round::RunEngine;
    use crate::source::ScriptedRandom;
    use crate::store::{Participant, ScoreEvent};

    #[test]
    fn test_round_invariants_hold_through_a_round() {
        let cfg = RoundConfig::default();
        let mut engine = RunEngine::new(cfg.clone(), ScriptedRandom::constant(0.99));
        engine.start_round();
        for _ in 0..5 {
            let before = engine.state().clone();
            if engine.pump().is_err() || engine.state().phase != RoundPhase::Active {
                break;
            }
            assert_pump_step(&before, engine.state()).unwrap();
            assert_round_invariants(engine.state(), &cfg).unwrap();
        }
    }

    #[test]
    fn test_popped_with_points_is_flagged() {
        let cfg = RoundConfig::default();
        let mut state = RoundState::new();
        state.phase = RoundPhase::Popped;
        state.popped = true;
        state.run_points = 10;
        assert!(assert_round_invariants(&state, &cfg).is_err());
    }

    #[test]
    fn test_store_cap_violation() {
        let cfg = StoreConfig { saved_cap: 1, ..StoreConfig::default() };
        let who = Participant::new("0xA");
        let log = ScoreLog {
            banked: vec![],
            saved: vec![ScoreEvent::saved(10, &who, 1), ScoreEvent::saved(11, &who, 2)],
        };
        assert!(assert_store_invariants(&log, &cfg, 20).is_err());
    }

    #[test]
    fn test_board_duplicate_flagged() {
        let board = vec![
            ScoreEvent::saved(2, &Participant::new("0xA"), 20),
            ScoreEvent::saved(1, &Participant::new("0xA"), 10),
        ];
        assert!(assert_board_order(&board).is_err());
    }
}
