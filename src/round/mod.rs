//! Risk/reward simulation for a single round. No persistence, no I/O.

pub mod engine;
pub mod state;
pub mod tuning;

pub use engine::{bank, pump, risk_tier, start_round, RunEngine, MAX_DISPLAY_RATIO};
pub use state::{BankOutcome, PumpOutcome, RiskTier, RoundPhase, RoundState};
pub use tuning::{PopModel, RoundConfig};
