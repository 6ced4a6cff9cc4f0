//! Single-owner command queue for the roster.
//!
//! One worker task owns the [`Roster`]. User commands, scheduler checkpoints and invitation
//! timers all submit jobs through the same channel, so mutations never interleave and every
//! job observes the effects of the previous one.

use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use tracing::debug;

use crate::state::{
    clock::Clock,
    roster::{Roster, RosterSnapshot},
};

const QUEUE_CAPACITY: usize = 64;

/// The worker is gone; no further command can run.
#[derive(Debug, Clone, Copy, Error)]
#[error("roster worker stopped")]
pub struct WorkerStopped;

/// Latest roster state published after each mutating job.
#[derive(Debug, Clone, Default)]
pub struct SnapshotFrame {
    /// Roster revision the snapshot was taken at.
    pub revision: u64,
    /// The state itself.
    pub snapshot: Arc<RosterSnapshot>,
}

type Job = Box<dyn FnOnce(&mut Roster, OffsetDateTime) + Send>;

struct Envelope {
    label: &'static str,
    job: Job,
}

/// Cloneable handle used to submit work to the roster worker.
#[derive(Clone)]
pub struct CommandQueue {
    sender: mpsc::Sender<Envelope>,
}

impl CommandQueue {
    /// Run `work` against the roster and wait for its result.
    pub async fn run<T, F>(&self, label: &'static str, work: F) -> Result<T, WorkerStopped>
    where
        F: FnOnce(&mut Roster, OffsetDateTime) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |roster, now| {
            let _ = reply_tx.send(work(roster, now));
        });

        self.sender
            .send(Envelope { label, job })
            .await
            .map_err(|_| WorkerStopped)?;

        reply_rx.await.map_err(|_| WorkerStopped)
    }
}

/// Spawn the worker owning `roster`.
///
/// Returns the submission handle, a receiver for published snapshots and the worker task.
pub fn spawn_worker(
    roster: Roster,
    clock: Arc<dyn Clock>,
) -> (CommandQueue, watch::Receiver<SnapshotFrame>, JoinHandle<()>) {
    let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
    let initial = SnapshotFrame {
        revision: roster.revision(),
        snapshot: Arc::new(roster.snapshot()),
    };
    let (snapshots, snapshot_rx) = watch::channel(initial);

    let worker = RosterWorker {
        roster,
        receiver,
        clock,
        snapshots,
    };
    let handle = tokio::spawn(worker.run());

    (CommandQueue { sender }, snapshot_rx, handle)
}

struct RosterWorker {
    roster: Roster,
    receiver: mpsc::Receiver<Envelope>,
    clock: Arc<dyn Clock>,
    snapshots: watch::Sender<SnapshotFrame>,
}

impl RosterWorker {
    async fn run(mut self) {
        while let Some(Envelope { label, job }) = self.receiver.recv().await {
            let before = self.roster.revision();
            let now = self.clock.now();
            debug!(command = label, revision = before, "running roster command");

            job(&mut self.roster, now);

            let revision = self.roster.revision();
            if revision != before {
                self.snapshots.send_replace(SnapshotFrame {
                    revision,
                    snapshot: Arc::new(self.roster.snapshot()),
                });
            }
        }

        debug!("roster command queue closed; worker exiting");
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::state::{clock::FixedClock, player::Identity};

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock::new(datetime!(2026-10-19 12:00 UTC)))
    }

    #[tokio::test]
    async fn jobs_see_each_other_in_submission_order() {
        let (queue, _snapshots, _worker) = spawn_worker(Roster::default(), clock());

        let identity = Identity::new(1, "Avi", None, None).unwrap();
        queue
            .run("create", move |roster, _| roster.create(identity))
            .await
            .unwrap()
            .unwrap();

        let len = queue.run("len", |roster, _| roster.len()).await.unwrap();
        assert_eq!(len, 1);
    }

    #[tokio::test]
    async fn mutations_publish_snapshots() {
        let (queue, mut snapshots, _worker) = spawn_worker(Roster::default(), clock());
        assert_eq!(snapshots.borrow().revision, 0);

        let identity = Identity::new(1, "Avi", None, None).unwrap();
        queue
            .run("create", move |roster, _| roster.create(identity))
            .await
            .unwrap()
            .unwrap();

        snapshots.changed().await.unwrap();
        let frame = snapshots.borrow().clone();
        assert_eq!(frame.revision, 1);
        assert_eq!(frame.snapshot.players.len(), 1);
    }

    #[tokio::test]
    async fn worker_receives_the_clock_time() {
        let (queue, _snapshots, _worker) = spawn_worker(Roster::default(), clock());
        let now = queue.run("now", |_, now| now).await.unwrap();
        assert_eq!(now, datetime!(2026-10-19 12:00 UTC));
    }
}
