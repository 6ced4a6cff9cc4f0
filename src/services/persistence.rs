//! Snapshot writer: the only task that writes the roster to storage.
//!
//! It follows the snapshots published by the roster worker and saves each new one. Failures are
//! logged and left to the periodic checkpoint, which asks for a flush regardless of changes.

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::{
    dao::models::RosterEntity,
    error::ServiceError,
    state::{SharedState, commands::SnapshotFrame},
};

/// Save `frame` to the installed store.
pub async fn save_frame(state: &SharedState, frame: &SnapshotFrame) -> Result<(), ServiceError> {
    let store = state.require_roster_store().await?;
    store
        .save_snapshot(RosterEntity::from(frame.snapshot.as_ref()))
        .await?;
    Ok(())
}

/// Run until the roster worker goes away.
pub async fn run_snapshot_writer(state: SharedState) {
    let mut snapshots: watch::Receiver<SnapshotFrame> = state.snapshots();
    let mut saved: Option<u64> = None;

    loop {
        let forced = tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    debug!("snapshot channel closed; writer exiting");
                    break;
                }
                false
            }
            _ = state.flush_requested() => true,
        };

        // Nothing is written before the stored roster had a chance to load.
        if !state.is_restored() {
            continue;
        }

        let frame = snapshots.borrow_and_update().clone();
        if !forced && saved == Some(frame.revision) {
            continue;
        }

        match save_frame(&state, &frame).await {
            Ok(()) => {
                debug!(revision = frame.revision, forced, "roster snapshot saved");
                saved = Some(frame.revision);
            }
            Err(ServiceError::Degraded) => {
                debug!(revision = frame.revision, "no storage; snapshot kept in memory");
            }
            Err(err) => {
                warn!(revision = frame.revision, error = %err, "failed to save roster snapshot");
            }
        }
    }
}
