//! Numeric tuning for a round: pressure ramp, multiplier curve, pop probability.
//!
//! All curves are pure functions of the round counters and a draw supplied by the caller.

use serde::{Deserialize, Serialize};

/// How the engine decides a pump popped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopModel {
    /// Pop once pressure crosses the hidden burst threshold, plus a rare surprise pop.
    ThresholdSurprise,
    /// Ignore the burst threshold; pop chance escalates with the pump count.
    Escalating,
}

impl PopModel {
    pub fn from_env() -> Self {
        match std::env::var("POP_MODEL").as_deref() {
            Ok("escalating") => PopModel::Escalating,
            _ => PopModel::ThresholdSurprise,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PopModel::ThresholdSurprise => "threshold_surprise",
            PopModel::Escalating => "escalating",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundConfig {
    // === Burst threshold distribution ===
    pub burst_lo: f64,
    pub burst_hi: f64,

    // === Pressure per pump ===
    pub ramp_base: f64,
    pub ramp_per_pump: f64,
    /// Extra pressure per streak step; streak makes rounds faster, not safer.
    pub streak_speed_per_bank: f64,
    pub streak_speed_cap: f64,
    /// Total width of the symmetric noise band.
    pub noise_width: f64,
    pub min_pressure_add: f64,

    // === Multiplier ===
    pub mult_per_pump: f64,
    pub streak_mult_per_bank: f64,
    pub streak_mult_cap: f64,
    pub streak_mult_weight: f64,
    pub mult_cap: f64,
    pub base_reward: f64,

    // === Pop decision ===
    pub pop_model: PopModel,
    pub surprise_base: f64,
    pub surprise_slope: f64,
    /// Pressure ratio past which the surprise chance starts rising.
    pub surprise_knee: f64,
    pub escalating_floor: f64,
    pub escalating_span: f64,
    pub escalating_scale: f64,
    pub escalating_pump_cap: u32,
    pub escalating_max: f64,

    /// Pressure ratio ceiling used for display and tiering.
    pub max_display_ratio: f64,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            burst_lo: 0.85,
            burst_hi: 1.40,

            ramp_base: 0.06,
            ramp_per_pump: 0.012,
            streak_speed_per_bank: 0.004,
            streak_speed_cap: 0.03,
            noise_width: 0.018,
            min_pressure_add: 0.02,

            mult_per_pump: 0.11,
            streak_mult_per_bank: 0.03,
            streak_mult_cap: 0.35,
            streak_mult_weight: 0.02,
            mult_cap: 9.9,
            base_reward: 10.0,

            pop_model: PopModel::ThresholdSurprise,
            surprise_base: 0.002,  // ~0.2% on any pump
            surprise_slope: 0.006, // up to ~0.6% near the threshold
            surprise_knee: 0.6,
            escalating_floor: 0.02,
            escalating_span: 0.78,
            escalating_scale: 18.0,
            escalating_pump_cap: 40,
            escalating_max: 0.86,

            max_display_ratio: 1.25,
        }
    }
}

impl RoundConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        let mut cfg = Self {
            burst_lo: std::env::var("BURST_LO").ok().and_then(|v| v.parse().ok()).unwrap_or(d.burst_lo),
            burst_hi: std::env::var("BURST_HI").ok().and_then(|v| v.parse().ok()).unwrap_or(d.burst_hi),
            mult_cap: std::env::var("MULT_CAP").ok().and_then(|v| v.parse().ok()).unwrap_or(d.mult_cap),
            base_reward: std::env::var("BASE_REWARD").ok().and_then(|v| v.parse().ok()).unwrap_or(d.base_reward),
            pop_model: PopModel::from_env(),
            ..d
        };
        if cfg.burst_hi < cfg.burst_lo {
            std::mem::swap(&mut cfg.burst_lo, &mut cfg.burst_hi);
        }
        cfg.mult_cap = cfg.mult_cap.max(1.0);
        cfg
    }

    /// Skewed draw over `[burst_lo, burst_hi)`: more mid-range rounds, fewer extremes.
    pub fn burst_threshold(&self, r: f64) -> f64 {
        let r = r.clamp(0.0, 1.0);
        self.burst_lo + (self.burst_hi - self.burst_lo) * (1.0 - (1.0 - r).powi(2))
    }

    /// Pressure added by the `pumps`-th pump (already counted) at the given streak.
    pub fn pressure_add(&self, pumps: u32, streak: u32, r: f64) -> f64 {
        let ramp = self.ramp_base + pumps as f64 * self.ramp_per_pump;
        let streak_speed = (streak as f64 * self.streak_speed_per_bank).min(self.streak_speed_cap);
        let noise = (r - 0.5) * self.noise_width;
        (ramp + streak_speed + noise).max(self.min_pressure_add)
    }

    pub fn multiplier(&self, pumps: u32, streak: u32) -> f64 {
        let streak_boost = (streak as f64 * self.streak_mult_per_bank).min(self.streak_mult_cap);
        let per_pump = self.mult_per_pump + streak_boost * self.streak_mult_weight;
        (1.0 + pumps as f64 * per_pump).min(self.mult_cap).max(1.0)
    }

    pub fn reward(&self, multiplier: f64) -> u64 {
        (self.base_reward * multiplier).floor().max(0.0) as u64
    }

    /// Chance that a pump below the burst threshold pops anyway.
    pub fn surprise_chance(&self, ratio: f64) -> f64 {
        self.surprise_base + self.surprise_slope * (ratio - self.surprise_knee).max(0.0)
    }

    /// Per-pump pop chance for [`PopModel::Escalating`].
    pub fn escalating_chance(&self, pumps: u32) -> f64 {
        let x = pumps.min(self.escalating_pump_cap) as f64;
        let curve = 1.0 - (-x / self.escalating_scale).exp();
        (self.escalating_floor + curve * self.escalating_span).min(self.escalating_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_threshold_range() {
        let cfg = RoundConfig::default();
        assert!((cfg.burst_threshold(0.0) - 0.85).abs() < 1e-12);
        assert!(cfg.burst_threshold(0.999_999) < 1.40);
        // Skew: the median draw lands above the midpoint.
        let mid = (cfg.burst_lo + cfg.burst_hi) / 2.0;
        assert!(cfg.burst_threshold(0.5) > mid);
    }

    #[test]
    fn test_pressure_add_floor() {
        let mut cfg = RoundConfig::default();
        cfg.ramp_base = -1.0;
        assert_eq!(cfg.pressure_add(1, 0, 0.0), cfg.min_pressure_add);
    }

    #[test]
    fn test_streak_speed_capped() {
        let cfg = RoundConfig::default();
        let a = cfg.pressure_add(3, 100, 0.5);
        let b = cfg.pressure_add(3, 1_000, 0.5);
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn test_multiplier_monotonic_and_capped() {
        let cfg = RoundConfig::default();
        let mut prev = cfg.multiplier(0, 5);
        assert_eq!(prev, 1.0);
        for pumps in 1..500 {
            let m = cfg.multiplier(pumps, 5);
            assert!(m >= prev);
            assert!(m <= 9.9);
            prev = m;
        }
        assert_eq!(prev, 9.9);
    }

    #[test]
    fn test_reward_floors() {
        let cfg = RoundConfig::default();
        assert_eq!(cfg.reward(1.11), 11);
        assert_eq!(cfg.reward(9.9), 99);
    }

    #[test]
    fn test_surprise_rises_past_knee() {
        let cfg = RoundConfig::default();
        assert_eq!(cfg.surprise_chance(0.2), cfg.surprise_chance(0.6));
        assert!(cfg.surprise_chance(1.0) > cfg.surprise_chance(0.6));
        assert!(cfg.surprise_chance(1.25) < 0.01);
    }

    #[test]
    fn test_escalating_chance_curve() {
        let cfg = RoundConfig::default();
        assert!((cfg.escalating_chance(0) - 0.02).abs() < 1e-12);
        assert!(cfg.escalating_chance(10) > cfg.escalating_chance(1));
        assert!(cfg.escalating_chance(1_000) <= 0.86);
        assert_eq!(cfg.escalating_chance(40), cfg.escalating_chance(400));
    }
}
