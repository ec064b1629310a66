//! Single-task mutation queue in front of a [`ScoreStore`].
//!
//! Hosts that can fire store commands concurrently (two quick banks from different
//! tasks) send them through a [`StoreHandle`]. One tokio task owns the store and
//! applies commands in arrival order; each reply is sent only after that command's
//! persist, so a later command always sees the earlier one's result.

use anyhow::{anyhow, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::{KvSlot, PersistStatus, ScoreEvent, ScoreLog, ScoreStore};
use crate::error::GameError;

const QUEUE_DEPTH: usize = 64;

enum StoreCommand {
    AppendBanked(ScoreEvent, oneshot::Sender<Result<PersistStatus, GameError>>),
    AppendSaved(ScoreEvent, oneshot::Sender<Result<PersistStatus, GameError>>),
    Reset(oneshot::Sender<PersistStatus>),
    Snapshot(oneshot::Sender<ScoreLog>),
}

#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<StoreCommand>,
}

impl StoreHandle {
    /// Move the store onto its own task. The task ends, returning the store, once
    /// every handle is dropped.
    pub fn spawn<S>(store: ScoreStore<S>) -> (Self, JoinHandle<ScoreStore<S>>)
    where
        S: KvSlot + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let worker = tokio::spawn(run(store, rx));
        (Self { tx }, worker)
    }

    /// Validation failures come back as a [`GameError`] inside the `anyhow` error.
    pub async fn append_banked(&self, event: ScoreEvent) -> Result<PersistStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(StoreCommand::AppendBanked(event, reply)).await?;
        Ok(rx.await.map_err(|_| closed())??)
    }

    pub async fn append_saved(&self, event: ScoreEvent) -> Result<PersistStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(StoreCommand::AppendSaved(event, reply)).await?;
        Ok(rx.await.map_err(|_| closed())??)
    }

    pub async fn reset(&self) -> Result<PersistStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(StoreCommand::Reset(reply)).await?;
        rx.await.map_err(|_| closed())
    }

    pub async fn snapshot(&self) -> Result<ScoreLog> {
        let (reply, rx) = oneshot::channel();
        self.send(StoreCommand::Snapshot(reply)).await?;
        rx.await.map_err(|_| closed())
    }

    async fn send(&self, cmd: StoreCommand) -> Result<()> {
        self.tx.send(cmd).await.map_err(|_| closed())
    }
}

fn closed() -> anyhow::Error {
    anyhow!("score store task has stopped")
}

async fn run<S: KvSlot>(mut store: ScoreStore<S>, mut rx: mpsc::Receiver<StoreCommand>) -> ScoreStore<S> {
    while let Some(cmd) = rx.recv().await {
        // A dropped reply receiver only means the caller stopped waiting.
        match cmd {
            StoreCommand::AppendBanked(event, reply) => {
                let _ = reply.send(store.append_banked(event));
            }
            StoreCommand::AppendSaved(event, reply) => {
                let _ = reply.send(store.append_saved(event));
            }
            StoreCommand::Reset(reply) => {
                let _ = reply.send(store.reset());
            }
            StoreCommand::Snapshot(reply) => {
                let _ = reply.send(store.snapshot());
            }
        }
    }
    store
}
