//! Jobs triggered by time rather than by a user: checkpoints, invitation expiry and the
//! startup restore. They share the roster queue with user commands.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{roster_store::RosterStore, storage::StorageError},
    error::ServiceError,
    services::{invitation_timers, notification_events},
    state::{
        SharedState,
        player::PlayerKey,
        roster::{RosterError, RosterSnapshot},
    },
};

/// Drop unconfirmed players from the playing slots. Returns how many left.
pub async fn prune_unapproved(state: &SharedState) -> Result<usize, ServiceError> {
    let outcomes = state
        .query("prune_unapproved", |roster, now| roster.prune_unapproved(now))
        .await?;

    for outcome in &outcomes {
        if let PlayerKey::Reserved { username } = &outcome.removed.key {
            invitation_timers::disarm(state, username);
        }
    }
    if !outcomes.is_empty() {
        info!(pruned = outcomes.len(), "unconfirmed players removed");
    }
    notification_events::pruned(state, &outcomes);
    Ok(outcomes.len())
}

/// Remind every playing member who has not confirmed yet. Returns how many were reminded.
pub async fn send_reminders(state: &SharedState, last_call: bool) -> Result<usize, ServiceError> {
    let pending = state
        .query("pending_confirmations", |roster, _| {
            roster.pending_confirmations()
        })
        .await?;

    debug!(pending = pending.len(), last_call, "sending confirmation reminders");
    notification_events::reminders(state, &pending, last_call);
    Ok(pending.len())
}

/// End-of-day wipe of the list.
pub async fn daily_cleanup(state: &SharedState) -> Result<(), ServiceError> {
    let withdrawn = state
        .query("daily_cleanup", |roster, now| {
            roster.purge_expired_bans(now);
            roster.daily_cleanup()
        })
        .await?;

    invitation_timers::disarm_all(state, &withdrawn);
    info!(withdrawn = withdrawn.len(), "daily cleanup done");
    notification_events::list_cleared(state, true);
    Ok(())
}

/// Release the slot of an invitation whose window ran out.
///
/// A no-op when the invitation was accepted, withdrawn or re-issued in the meantime.
pub async fn expire_invitation(state: &SharedState, username: &str, token: Uuid) {
    let key = username.to_owned();
    let result = state
        .query("expire_invitation", move |roster, now| {
            let pending = roster.invitations().any(|inv| inv.username == key && inv.token == token);
            pending.then(|| roster.expire_invitation(&key, token, now))
        })
        .await;

    match result {
        Ok(Some(outcome)) => {
            info!(username = %username, "invitation expired");
            notification_events::invitation_expired(state, username, outcome.as_ref());
        }
        Ok(None) => debug!(username = %username, "stale invitation timer ignored"),
        Err(err) => warn!(username = %username, error = %err, "failed to expire invitation"),
    }
}

/// Load the stored roster into the queue, unless a command already changed the roster.
///
/// Pending invitations get their timers back for whatever is left of their window.
pub async fn restore_from_store(
    state: &SharedState,
    store: Arc<dyn RosterStore>,
) -> Result<bool, ServiceError> {
    let Some(entity) = store.load_snapshot().await? else {
        info!("no stored roster; starting empty");
        return Ok(false);
    };
    let snapshot = RosterSnapshot::try_from(entity)
        .map_err(|err| ServiceError::Unavailable(StorageError::Corrupt(err.to_string())))?;

    let restored = state
        .execute("restore", move |roster, _| {
            if roster.revision() != 0 {
                return Ok(None);
            }
            roster.restore(snapshot)?;
            Ok::<_, RosterError>(Some(roster.snapshot()))
        })
        .await?;

    let Some(snapshot) = restored else {
        warn!("roster changed before storage came up; keeping the in-memory state");
        return Ok(false);
    };

    for invitation in &snapshot.invitations {
        invitation_timers::arm(state, invitation);
    }
    info!(
        players = snapshot.players.len(),
        invitations = snapshot.invitations.len(),
        asked = snapshot.asked.len(),
        "roster restored from storage"
    );
    Ok(true)
}
