//! Round transitions: `(RoundState, action) -> outcome`.
//!
//! The free functions are the whole state machine; [`RunEngine`] just owns a state,
//! a config and a random source so callers have one handle per player.
//!
//! ```text
//! Idle --start--> Active --pump--> Active
//!                   |  \--pump (pop)--> Popped --start--> Active
//!                   \--bank--> Banked --start--> Active
//! ```

use super::state::*;
use super::tuning::{PopModel, RoundConfig};
use crate::error::GameError;
use crate::source::RandomSource;

/// Ratio ceiling for display and tiering.
pub const MAX_DISPLAY_RATIO: f64 = 1.25;

pub fn risk_tier(pressure_ratio: f64) -> RiskTier {
    let x = if pressure_ratio.is_nan() {
        0.0
    } else {
        pressure_ratio.clamp(0.0, MAX_DISPLAY_RATIO)
    };
    if x < 0.45 {
        RiskTier::Safe
    } else if x < 0.70 {
        RiskTier::Warm
    } else if x < 0.90 {
        RiskTier::Danger
    } else {
        RiskTier::Critical
    }
}

/// Zero the round counters and draw a fresh burst threshold. Valid from any phase.
pub fn start_round(
    state: &mut RoundState,
    prior_streak: u32,
    cfg: &RoundConfig,
    rng: &mut dyn RandomSource,
) {
    state.phase = RoundPhase::Active;
    state.pumps = 0;
    state.pressure = 0.0;
    state.multiplier = 1.0;
    state.run_points = 0;
    state.popped = false;
    state.streak = prior_streak;
    state.burst_threshold = cfg.burst_threshold(rng.next_f64());
    state.round_seq += 1;
}

pub fn pump(
    state: &mut RoundState,
    cfg: &RoundConfig,
    rng: &mut dyn RandomSource,
) -> Result<PumpOutcome, GameError> {
    if state.phase != RoundPhase::Active {
        return Err(GameError::invalid_state("pump", state.phase));
    }

    // Pressure first, then reward, then the pop check against the new pressure.
    state.pumps += 1;
    state.pressure += cfg.pressure_add(state.pumps, state.streak, rng.next_f64());

    state.multiplier = cfg.multiplier(state.pumps, state.streak).max(state.multiplier);
    let gained = cfg.reward(state.multiplier);
    state.run_points = state.run_points.saturating_add(gained);

    let ratio = state.pressure_ratio(cfg.max_display_ratio);
    let (popped, surprise) = pop_decision(state, cfg, ratio, rng);

    let mut outcome = PumpOutcome {
        pumps: state.pumps,
        pressure: state.pressure,
        pressure_ratio: ratio,
        tier: risk_tier(ratio),
        multiplier: state.multiplier,
        gained,
        run_points: state.run_points,
        popped,
        forfeited: 0,
        surprise,
    };

    if popped {
        outcome.forfeited = state.run_points;
        outcome.run_points = 0;
        state.phase = RoundPhase::Popped;
        state.popped = true;
        state.run_points = 0;
        state.pumps = 0;
        state.multiplier = 1.0;
        state.streak = 0;
    }

    Ok(outcome)
}

/// Returns `(popped, surprise)`. Draws at most once.
fn pop_decision(
    state: &RoundState,
    cfg: &RoundConfig,
    ratio: f64,
    rng: &mut dyn RandomSource,
) -> (bool, bool) {
    match cfg.pop_model {
        PopModel::ThresholdSurprise => {
            if state.pressure >= state.burst_threshold {
                return (true, false);
            }
            let popped = rng.next_f64() < cfg.surprise_chance(ratio);
            (popped, popped)
        }
        PopModel::Escalating => (rng.next_f64() < cfg.escalating_chance(state.pumps), false),
    }
}

/// Move the unbanked points out of an active round and end it.
pub fn bank(state: &mut RoundState) -> Result<BankOutcome, GameError> {
    if state.phase != RoundPhase::Active {
        return Err(GameError::invalid_state("bank", state.phase));
    }
    if state.run_points == 0 {
        return Err(GameError::invalid_state("bank with no points", state.phase));
    }
    let points = state.run_points;
    state.run_points = 0;
    state.streak += 1;
    state.phase = RoundPhase::Banked;
    Ok(BankOutcome {
        points,
        pumps: state.pumps,
        multiplier: state.multiplier,
        streak: state.streak,
    })
}

/// Single-owner handle over one player's rounds.
#[derive(Debug)]
pub struct RunEngine<R: RandomSource> {
    cfg: RoundConfig,
    state: RoundState,
    rng: R,
}

impl<R: RandomSource> RunEngine<R> {
    /// Starts in [`RoundPhase::Idle`]; call [`RunEngine::start_round`] before pumping.
    pub fn new(cfg: RoundConfig, rng: R) -> Self {
        Self { cfg, state: RoundState::new(), rng }
    }

    pub fn with_streak(cfg: RoundConfig, rng: R, streak: u32) -> Self {
        let mut engine = Self::new(cfg, rng);
        engine.state.streak = streak;
        engine
    }

    pub fn start_round(&mut self) {
        let streak = self.state.streak;
        start_round(&mut self.state, streak, &self.cfg, &mut self.rng);
    }

    pub fn pump(&mut self) -> Result<PumpOutcome, GameError> {
        pump(&mut self.state, &self.cfg, &mut self.rng)
    }

    pub fn bank(&mut self) -> Result<BankOutcome, GameError> {
        bank(&mut self.state)
    }

    pub fn risk_tier(&self) -> RiskTier {
        risk_tier(self.state.pressure_ratio(self.cfg.max_display_ratio))
    }

    pub fn pressure_ratio(&self) -> f64 {
        self.state.pressure_ratio(self.cfg.max_display_ratio)
    }

    /// Drop the streak without touching the current round (local data reset).
    pub fn clear_streak(&mut self) {
        self.state.streak = 0;
    }

    pub fn state(&self) -> &RoundState {
        &self.state
    }

    pub fn config(&self) -> &RoundConfig {
        &self.cfg
    }

    pub fn phase(&self) -> RoundPhase {
        self.state.phase
    }

    pub fn streak(&self) -> u32 {
        self.state.streak
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ScriptedRandom;

    fn engine(draws: Vec<f64>, fallback: f64) -> RunEngine<ScriptedRandom> {
        let mut e = RunEngine::new(RoundConfig::default(), ScriptedRandom::new(draws, fallback));
        e.start_round();
        e
    }

    #[test]
    fn test_new_engine_is_idle() {
        let mut e = RunEngine::new(RoundConfig::default(), ScriptedRandom::constant(0.5));
        assert_eq!(e.phase(), RoundPhase::Idle);
        assert!(matches!(e.pump(), Err(GameError::InvalidState { op: "pump", .. })));
        assert!(e.bank().is_err());
    }

    #[test]
    fn test_start_round_draws_threshold_once() {
        // r = 0 → lowest threshold
        let e = engine(vec![0.0], 0.99);
        assert!((e.state().burst_threshold - 0.85).abs() < 1e-12);
        assert_eq!(e.state().multiplier, 1.0);
        assert_eq!(e.state().round_seq, 1);
    }

    #[test]
    fn test_pump_awards_floor_of_multiplier() {
        // threshold draw, noise draw, surprise draw (0.99 never pops)
        let mut e = engine(vec![0.99, 0.5], 0.99);
        let out = e.pump().unwrap();
        assert_eq!(out.pumps, 1);
        assert!((out.multiplier - 1.11).abs() < 1e-12);
        assert_eq!(out.gained, 11);
        assert_eq!(out.run_points, 11);
        assert!(!out.popped);
        // ramp 0.06 + 0.012, no streak, zero noise
        assert!((out.pressure - 0.072).abs() < 1e-12);
        assert_eq!(out.tier, RiskTier::Safe);
    }

    #[test]
    fn test_threshold_crossing_pops_without_surprise_draw() {
        let mut e = engine(vec![0.0], 0.5);
        loop {
            let draws_before = e.rng.consumed();
            let out = e.pump().unwrap();
            if out.popped {
                assert!(!out.surprise);
                assert!(out.forfeited > 0);
                assert_eq!(out.run_points, 0);
                // only the noise draw was consumed on the popping pump
                assert_eq!(e.rng.consumed() - draws_before, 1);
                break;
            }
        }
        assert_eq!(e.phase(), RoundPhase::Popped);
        assert!(e.state().popped);
        assert_eq!(e.state().run_points, 0);
        assert_eq!(e.state().pumps, 0);
        assert_eq!(e.state().multiplier, 1.0);
    }

    #[test]
    fn test_surprise_pop_on_low_draw() {
        // threshold 0.85, noise 0.5, surprise draw 0.0 < 0.2%
        let mut e = engine(vec![0.0, 0.5, 0.0], 0.99);
        let out = e.pump().unwrap();
        assert!(out.popped);
        assert!(out.surprise);
        assert_eq!(out.forfeited, 11);
    }

    #[test]
    fn test_pop_resets_streak() {
        let rng = ScriptedRandom::new(vec![0.5, 0.5, 0.0], 0.99);
        let mut e = RunEngine::with_streak(RoundConfig::default(), rng, 4);
        e.start_round();
        assert_eq!(e.streak(), 4);
        let out = e.pump().unwrap();
        assert!(out.popped);
        assert_eq!(e.streak(), 0);
    }

    #[test]
    fn test_bank_moves_points_and_extends_streak() {
        let mut e = engine(vec![0.99], 0.5);
        e.pump().unwrap();
        e.pump().unwrap();
        let run = e.state().run_points;
        let out = e.bank().unwrap();
        assert_eq!(out.points, run);
        assert_eq!(out.streak, 1);
        assert_eq!(out.pumps, 2);
        assert_eq!(e.phase(), RoundPhase::Banked);
        assert_eq!(e.state().run_points, 0);
    }

    #[test]
    fn test_bank_with_no_points_is_invalid() {
        let mut e = engine(vec![], 0.5);
        let err = e.bank().unwrap_err();
        assert!(matches!(err, GameError::InvalidState { phase: RoundPhase::Active, .. }));
        assert_eq!(e.phase(), RoundPhase::Active);
    }

    #[test]
    fn test_terminal_round_rejects_everything() {
        let mut e = engine(vec![0.99], 0.5);
        e.pump().unwrap();
        e.bank().unwrap();
        assert!(matches!(e.bank(), Err(GameError::InvalidState { phase: RoundPhase::Banked, .. })));
        assert!(matches!(e.pump(), Err(GameError::InvalidState { phase: RoundPhase::Banked, .. })));
        e.start_round();
        assert!(e.pump().is_ok());
    }

    #[test]
    fn test_escalating_model_ignores_threshold() {
        let mut cfg = RoundConfig::default();
        cfg.pop_model = PopModel::Escalating;
        cfg.burst_lo = 0.0;
        cfg.burst_hi = 0.0;
        // pressure always exceeds a zero threshold; only the draw decides
        let mut e = RunEngine::new(cfg, ScriptedRandom::constant(0.99));
        e.start_round();
        for _ in 0..5 {
            assert!(!e.pump().unwrap().popped);
        }
    }

    #[test]
    fn test_risk_tier_bands() {
        assert_eq!(risk_tier(0.0), RiskTier::Safe);
        assert_eq!(risk_tier(0.449), RiskTier::Safe);
        assert_eq!(risk_tier(0.45), RiskTier::Warm);
        assert_eq!(risk_tier(0.70), RiskTier::Danger);
        assert_eq!(risk_tier(0.90), RiskTier::Critical);
        assert_eq!(risk_tier(50.0), RiskTier::Critical);
        assert_eq!(risk_tier(f64::NAN), RiskTier::Safe);
        assert!(RiskTier::Safe < RiskTier::Critical);
    }
}
