//! One player's session: rounds, running total, save offers.
//!
//! The session restarts a round as soon as the previous one banks or pops, the way
//! the arcade loop plays. Store writes are optional: the plain methods hand back the
//! event to record, the `*_into` methods record it in a synchronous store directly.

use std::sync::Arc;

use chrono::TimeZone;
use serde::Serialize;

use crate::error::GameError;
use crate::logging::{log_bank, log_pop, log_pump, log_rejected, log_round_start, log_save_offer, log_session_summary};
use crate::rank::{BoardWindow, RankEngine, RankPreview};
use crate::round::{BankOutcome, PumpOutcome, RiskTier, RoundConfig, RoundState, RunEngine};
use crate::source::{Clock, RandomSource};
use crate::store::{BankDetail, KvSlot, Participant, PersistStatus, ScoreEvent, ScoreLog, ScoreStore};

pub const HIGH_MULTIPLIER: f64 = 3.0;
pub const STREAK_MILESTONES: [u32; 3] = [3, 7, 30];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveReason {
    NewPersonalBest,
    NewSavedBest,
    HighMultiplier,
    StreakMilestone(u32),
}

impl SaveReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaveReason::NewPersonalBest => "new_personal_best",
            SaveReason::NewSavedBest => "new_saved_best",
            SaveReason::HighMultiplier => "high_multiplier",
            SaveReason::StreakMilestone(_) => "streak_milestone",
        }
    }
}

/// Prompt to commit the running total, with the rank it would take.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveOffer {
    pub total: u64,
    pub reasons: Vec<SaveReason>,
    pub window: BoardWindow,
    pub preview: RankPreview,
}

impl SaveOffer {
    /// Headline for the offer: a new saved best outranks everything else.
    pub fn is_record(&self) -> bool {
        self.reasons.contains(&SaveReason::NewSavedBest)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BankReceipt {
    pub points: u64,
    pub total: u64,
    pub streak: u32,
    pub pumps: u32,
    pub multiplier: f64,
    /// BANKED event describing this bank; already appended by the `*_into` variant.
    pub event: ScoreEvent,
    pub persist: Option<PersistStatus>,
    pub offer: Option<SaveOffer>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub rounds: u64,
    pub pumps: u64,
    pub pops: u64,
    pub banks: u64,
    pub best_run: u64,
}

pub struct PlayerSession<R: RandomSource> {
    participant: Participant,
    engine: RunEngine<R>,
    clock: Arc<dyn Clock>,
    total: u64,
    stats: SessionStats,
}

impl<R: RandomSource> PlayerSession<R> {
    pub fn new(participant: Participant, cfg: RoundConfig, rng: R, clock: Arc<dyn Clock>) -> Self {
        let mut session = Self {
            participant,
            engine: RunEngine::new(cfg, rng),
            clock,
            total: 0,
            stats: SessionStats::default(),
        };
        session.next_round();
        session
    }

    fn next_round(&mut self) {
        self.engine.start_round();
        self.stats.rounds += 1;
        let state = self.engine.state();
        log_round_start(&self.participant.id, state.round_seq, state.streak);
    }

    pub fn pump(&mut self) -> Result<PumpOutcome, GameError> {
        let out = match self.engine.pump() {
            Ok(out) => out,
            Err(err) => {
                log_rejected(&self.participant.id, "pump", &err.to_string());
                return Err(err);
            }
        };
        let round = self.engine.state().round_seq;
        self.stats.pumps += 1;
        log_pump(&self.participant.id, round, out.pumps, out.pressure_ratio, out.tier.as_str(), out.gained);
        if out.popped {
            self.stats.pops += 1;
            log_pop(&self.participant.id, round, out.forfeited, out.surprise);
            self.next_round();
        }
        Ok(out)
    }

    /// Pick up the running total from the participant's latest BANKED event, so a
    /// restarted session keeps counting where the last one stopped.
    pub fn resume(&mut self, log: &ScoreLog) {
        if let Some(last) = log.last_banked(&self.participant.id) {
            self.total = last.score;
        }
    }

    /// Bank the current round into the running total and start the next round.
    /// Without a participant id nothing is banked and the round stays live.
    pub fn bank(&mut self) -> Result<BankReceipt, GameError> {
        if self.participant.id.trim().is_empty() {
            let err = GameError::validation("missing participant id");
            log_rejected(&self.participant.id, "bank", &err.to_string());
            return Err(err);
        }
        let round = self.engine.state().round_seq;
        let BankOutcome { points, pumps, multiplier, streak } = match self.engine.bank() {
            Ok(out) => out,
            Err(err) => {
                log_rejected(&self.participant.id, "bank", &err.to_string());
                return Err(err);
            }
        };
        self.total = self.total.saturating_add(points);
        self.stats.banks += 1;
        self.stats.best_run = self.stats.best_run.max(points);
        log_bank(&self.participant.id, round, points, self.total, streak);

        let event = ScoreEvent::banked(
            self.clock.now_ms(),
            &self.participant,
            self.total,
            BankDetail { run_points: points, pumps, multiplier },
        );
        self.next_round();
        Ok(BankReceipt {
            points,
            total: self.total,
            streak,
            pumps,
            multiplier,
            event,
            persist: None,
            offer: None,
        })
    }

    /// Bank, record the BANKED event and work out whether to offer a save.
    pub fn bank_into<S: KvSlot, Tz: TimeZone>(
        &mut self,
        store: &mut ScoreStore<S>,
        ranks: &RankEngine<Tz>,
        window: BoardWindow,
    ) -> Result<BankReceipt, GameError> {
        let mut receipt = self.bank()?;
        receipt.persist = Some(store.append_banked(receipt.event.clone())?);
        receipt.offer = self.save_offer(store.log(), ranks, window, &receipt);
        Ok(receipt)
    }

    /// Celebration check after a bank. `log` should already contain the bank.
    pub fn save_offer<Tz: TimeZone>(
        &self,
        log: &ScoreLog,
        ranks: &RankEngine<Tz>,
        window: BoardWindow,
        receipt: &BankReceipt,
    ) -> Option<SaveOffer> {
        let total = receipt.total;
        let mut reasons = Vec::new();
        if total > 0 && total >= log.best_banked(&self.participant.id) {
            reasons.push(SaveReason::NewPersonalBest);
        }
        if total > log.best_saved(&self.participant.id) {
            reasons.push(SaveReason::NewSavedBest);
        }
        if receipt.multiplier >= HIGH_MULTIPLIER {
            reasons.push(SaveReason::HighMultiplier);
        }
        if STREAK_MILESTONES.contains(&receipt.streak) {
            reasons.push(SaveReason::StreakMilestone(receipt.streak));
        }
        if reasons.is_empty() || total == 0 {
            return None;
        }

        let candidate = ScoreEvent::saved(ranks.now_ms(), &self.participant, total);
        let preview = ranks.preview_rank(&log.saved, window, &candidate);
        let names: Vec<&str> = reasons.iter().map(|r| r.as_str()).collect();
        log_save_offer(&self.participant.id, total, &names, preview.rank, preview.total);
        Some(SaveOffer { total, reasons, window, preview })
    }

    /// SAVED event for the running total, to hand to the commit hook.
    pub fn save_event(&self) -> Result<ScoreEvent, GameError> {
        if self.total == 0 {
            return Err(GameError::validation("no score to save yet"));
        }
        Ok(ScoreEvent::saved(self.clock.now_ms(), &self.participant, self.total))
    }

    pub fn commit_save_into<S: KvSlot>(&self, store: &mut ScoreStore<S>) -> Result<PersistStatus, GameError> {
        let event = self.save_event()?;
        store.append_saved(event)
    }

    /// Forget the running total and streak and start a fresh round.
    pub fn reset(&mut self) {
        self.total = 0;
        self.engine.clear_streak();
        self.next_round();
    }

    /// [`PlayerSession::reset`] plus clearing the store. Irreversible.
    pub fn reset_into<S: KvSlot>(&mut self, store: &mut ScoreStore<S>) -> PersistStatus {
        self.reset();
        store.reset()
    }

    pub fn log_summary(&self) {
        log_session_summary(
            &self.participant.id,
            self.stats.rounds,
            self.stats.pops,
            self.stats.banks,
            self.total,
            self.stats.best_run,
        );
    }

    pub fn participant(&self) -> &Participant {
        &self.participant
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn streak(&self) -> u32 {
        self.engine.streak()
    }

    pub fn round(&self) -> &RoundState {
        self.engine.state()
    }

    pub fn risk_tier(&self) -> RiskTier {
        self.engine.risk_tier()
    }

    pub fn pressure_ratio(&self) -> f64 {
        self.engine.pressure_ratio()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ManualClock, ScriptedRandom};
    use crate::store::{MemorySlot, StoreConfig};
    use chrono::Utc;

    const NOW: i64 = 1_704_900_600_000;

    fn setup(draws: Vec<f64>) -> (PlayerSession<ScriptedRandom>, ScoreStore<MemorySlot>, RankEngine<Utc>) {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(NOW));
        let session = PlayerSession::new(
            Participant::with_name("0xA", "alice"),
            RoundConfig::default(),
            ScriptedRandom::new(draws, 0.5),
            clock.clone(),
        );
        let (store, _) = ScoreStore::load(MemorySlot::new(), StoreConfig::default(), clock.clone());
        (session, store, RankEngine::new(Utc, clock))
    }

    #[test]
    fn test_bank_records_running_total() {
        // high threshold draw, then neutral noise and surprise draws
        let (mut s, mut store, ranks) = setup(vec![0.99]);
        s.pump().unwrap();
        s.pump().unwrap();
        let receipt = s.bank_into(&mut store, &ranks, BoardWindow::Daily).unwrap();
        assert_eq!(receipt.points, 11 + 12);
        assert_eq!(receipt.total, 23);
        assert_eq!(receipt.persist, Some(PersistStatus::Persisted));
        assert_eq!(store.banked().len(), 1);
        assert_eq!(store.banked()[0].score, 23);
        assert_eq!(store.banked()[0].detail.as_ref().unwrap().pumps, 2);
        // a fresh round is already running
        assert!(s.round().is_active());
        assert_eq!(s.round().run_points, 0);
        assert_eq!(s.streak(), 1);
    }

    #[test]
    fn test_first_bank_offers_save_with_preview() {
        let (mut s, mut store, ranks) = setup(vec![0.99]);
        store.append_saved(ScoreEvent::saved(NOW, &Participant::new("0xB"), 500)).unwrap();
        s.pump().unwrap();
        let receipt = s.bank_into(&mut store, &ranks, BoardWindow::Daily).unwrap();
        let offer = receipt.offer.expect("first bank is a personal best");
        assert!(offer.reasons.contains(&SaveReason::NewPersonalBest));
        assert!(offer.is_record());
        assert_eq!(offer.preview, RankPreview { rank: 2, total: 2 });
    }

    #[test]
    fn test_save_requires_points() {
        let (s, mut store, _) = setup(vec![]);
        assert!(matches!(s.commit_save_into(&mut store), Err(GameError::Validation { .. })));
        assert!(store.saved().is_empty());
    }

    #[test]
    fn test_commit_save_appends_saved_total() {
        let (mut s, mut store, ranks) = setup(vec![0.99]);
        s.pump().unwrap();
        s.bank_into(&mut store, &ranks, BoardWindow::Daily).unwrap();
        s.commit_save_into(&mut store).unwrap();
        assert_eq!(store.saved().len(), 1);
        assert_eq!(store.saved()[0].score, 11);
        assert_eq!(store.saved()[0].display_name.as_deref(), Some("alice"));
    }

    #[test]
    fn test_pop_restarts_round_and_counts() {
        // threshold 0.85, noise 0.5, surprise draw 0.0 pops immediately
        let (mut s, _, _) = setup(vec![0.0, 0.5, 0.0]);
        let out = s.pump().unwrap();
        assert!(out.popped);
        assert!(s.round().is_active());
        assert_eq!(s.stats().pops, 1);
        assert_eq!(s.stats().rounds, 2);
        assert_eq!(s.total(), 0);
    }

    #[test]
    fn test_empty_bank_rejected() {
        let (mut s, _, _) = setup(vec![]);
        assert!(matches!(s.bank(), Err(GameError::InvalidState { .. })));
    }

    #[test]
    fn test_bank_without_identity_keeps_round_live() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(NOW));
        let mut s = PlayerSession::new(
            Participant::new(""),
            RoundConfig::default(),
            ScriptedRandom::new(vec![0.99], 0.5),
            clock.clone(),
        );
        let (mut store, _) = ScoreStore::load(MemorySlot::new(), StoreConfig::default(), clock.clone());
        let ranks = RankEngine::new(Utc, clock);
        s.pump().unwrap();

        let err = s.bank_into(&mut store, &ranks, BoardWindow::Daily).unwrap_err();
        assert!(matches!(err, GameError::Validation { .. }));
        assert_eq!(s.total(), 0);
        assert_eq!(s.streak(), 0);
        assert_eq!(s.round().run_points, 11);
        assert!(s.round().is_active());
        assert!(store.banked().is_empty());
    }

    #[test]
    fn test_resume_carries_total_across_restart() {
        let (mut s, mut store, ranks) = setup(vec![0.99]);
        s.pump().unwrap();
        s.pump().unwrap();
        s.bank_into(&mut store, &ranks, BoardWindow::Daily).unwrap();
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(NOW));
        let (mut store, _) = ScoreStore::load(store.into_slot(), StoreConfig::default(), clock.clone());

        let mut restarted = PlayerSession::new(
            Participant::with_name("0xA", "alice"),
            RoundConfig::default(),
            ScriptedRandom::new(vec![0.99], 0.5),
            clock,
        );
        restarted.resume(store.log());
        assert_eq!(restarted.total(), 23);

        restarted.pump().unwrap();
        let receipt = restarted.bank_into(&mut store, &ranks, BoardWindow::Daily).unwrap();
        assert_eq!(receipt.total, 34);
        let totals: Vec<u64> = store.banked().iter().map(|e| e.score).collect();
        assert_eq!(totals, vec![23, 34]);
    }

    #[test]
    fn test_resume_ignores_other_participants() {
        let (mut s, mut store, _) = setup(vec![]);
        let detail = BankDetail { run_points: 90, pumps: 6, multiplier: 1.66 };
        store.append_banked(ScoreEvent::banked(NOW, &Participant::new("0xB"), 90, detail)).unwrap();
        s.resume(store.log());
        assert_eq!(s.total(), 0);
    }

    #[test]
    fn test_reset_into_clears_everything() {
        let (mut s, mut store, ranks) = setup(vec![0.99]);
        s.pump().unwrap();
        s.bank_into(&mut store, &ranks, BoardWindow::Daily).unwrap();
        assert_eq!(s.reset_into(&mut store), PersistStatus::Persisted);
        assert_eq!(s.total(), 0);
        assert_eq!(s.streak(), 0);
        assert!(store.log().is_empty());
    }
}
