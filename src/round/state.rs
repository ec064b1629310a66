use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    /// No round started yet.
    Idle,
    Active,
    /// Points moved out by a bank. Terminal.
    Banked,
    /// Pushed too far. Terminal.
    Popped,
}

impl RoundPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundPhase::Idle => "idle",
            RoundPhase::Active => "active",
            RoundPhase::Banked => "banked",
            RoundPhase::Popped => "popped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RoundPhase::Banked | RoundPhase::Popped)
    }
}

/// Risk band shown to the player, ordered from calm to about-to-pop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    Safe,
    Warm,
    Danger,
    Critical,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Safe => "SAFE",
            RiskTier::Warm => "WARM",
            RiskTier::Danger => "DANGER",
            RiskTier::Critical => "CRITICAL",
        }
    }
}

/// State of one round. `streak` is the only field that survives into the next round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundState {
    pub phase: RoundPhase,
    pub pumps: u32,
    pub pressure: f64,
    pub burst_threshold: f64,
    pub multiplier: f64,
    pub run_points: u64,
    pub popped: bool,
    pub streak: u32,
    /// Rounds started on this state, used to correlate log records.
    pub round_seq: u64,
}

impl RoundState {
    pub fn new() -> Self {
        Self {
            phase: RoundPhase::Idle,
            pumps: 0,
            pressure: 0.0,
            burst_threshold: 1.0,
            multiplier: 1.0,
            run_points: 0,
            popped: false,
            streak: 0,
            round_seq: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.phase == RoundPhase::Active
    }

    /// `pressure / burst_threshold`, clamped to `[0, max_ratio]`.
    pub fn pressure_ratio(&self, max_ratio: f64) -> f64 {
        if self.burst_threshold <= 0.0 {
            return 0.0;
        }
        (self.pressure / self.burst_threshold).clamp(0.0, max_ratio)
    }
}

impl Default for RoundState {
    fn default() -> Self {
        Self::new()
    }
}

/// What a single pump did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PumpOutcome {
    /// Pump count of the round including this pump.
    pub pumps: u32,
    pub pressure: f64,
    pub pressure_ratio: f64,
    pub tier: RiskTier,
    pub multiplier: f64,
    /// Points awarded by this pump (lost again if it popped).
    pub gained: u64,
    pub run_points: u64,
    pub popped: bool,
    /// Unbanked points lost to the pop; zero otherwise.
    pub forfeited: u64,
    /// Set when the pop came from the surprise roll rather than crossing the threshold.
    pub surprise: bool,
}

/// Points moved out of a round by a bank.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BankOutcome {
    pub points: u64,
    pub pumps: u32,
    pub multiplier: f64,
    pub streak: u32,
}
