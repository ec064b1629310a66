//! Save/mint hook: turns a banked total into a leaderboard entry.
//!
//! Submitting to a chain or any other remote ledger belongs to the host. The core
//! only needs to know that a submission succeeded before it appends the SAVED event.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;

use crate::logging::log_commit;
use crate::store::queue::StoreHandle;
use crate::store::{codec, PersistStatus, ScoreEvent};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitReceipt {
    /// Opaque reference from the ledger (tx hash, call id, ...).
    pub reference: String,
    pub score: u64,
}

#[async_trait]
pub trait CommitHook: Send + Sync {
    async fn submit(&self, event: &ScoreEvent) -> Result<CommitReceipt>;
}

/// In-process ledger: accepts every positive score and references it by content digest.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalCommit;

#[async_trait]
impl CommitHook for LocalCommit {
    async fn submit(&self, event: &ScoreEvent) -> Result<CommitReceipt> {
        if event.score == 0 {
            bail!("nothing to commit for {}", event.participant_id);
        }
        let bytes = serde_json::to_vec(event)?;
        Ok(CommitReceipt {
            reference: codec::digest(&bytes),
            score: event.score,
        })
    }
}

/// Submit through the hook, then record the SAVED event. Nothing is recorded when
/// the hook refuses.
pub async fn commit_and_record(
    hook: &dyn CommitHook,
    store: &StoreHandle,
    event: ScoreEvent,
) -> Result<(CommitReceipt, PersistStatus)> {
    let receipt = hook.submit(&event).await?;
    let participant_id = event.participant_id.clone();
    let status = store.append_saved(event).await?;
    log_commit(&participant_id, receipt.score, &receipt.reference);
    Ok((receipt, status))
}
