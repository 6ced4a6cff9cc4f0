//! Expiry timers of pending invitations.
//!
//! Each timer submits the expiry through the roster queue. A timer that fires after its
//! invitation was accepted or replaced finds a different token, or none, and does nothing.

use time::OffsetDateTime;
use tokio::{sync::oneshot, time::sleep};
use tracing::debug;

use crate::{
    services::maintenance_service,
    state::{SharedState, invitation::Invitation},
};

/// Start the expiry timer of `invitation`, replacing any timer armed for the same username.
pub fn arm(state: &SharedState, invitation: &Invitation) {
    let delay = remaining(invitation.expires_at, state.now());
    let username = invitation.username.clone();
    let token = invitation.token;

    // The task waits until its handle is registered so it never removes an entry before the
    // insert below lands.
    let (ready_tx, ready_rx) = oneshot::channel::<()>();
    let task_state = state.clone();
    let task_username = username.clone();
    let handle = tokio::spawn(async move {
        if ready_rx.await.is_err() {
            return;
        }
        sleep(delay).await;
        task_state
            .invitation_timers()
            .remove_if(&task_username, |_, (armed, _)| *armed == token);
        maintenance_service::expire_invitation(&task_state, &task_username, token).await;
    });

    debug!(username = %username, delay_secs = delay.as_secs(), "invitation timer armed");
    if let Some((_, previous)) = state
        .invitation_timers()
        .insert(username, (token, handle.abort_handle()))
    {
        previous.abort();
    }
    let _ = ready_tx.send(());
}

/// Cancel the timer of `username`, if any.
pub fn disarm(state: &SharedState, username: &str) {
    if let Some((_, (_, handle))) = state.invitation_timers().remove(username) {
        handle.abort();
        debug!(username = %username, "invitation timer cancelled");
    }
}

/// Cancel the timers of every invitation in `withdrawn`.
pub fn disarm_all<'a>(state: &SharedState, withdrawn: impl IntoIterator<Item = &'a Invitation>) {
    for invitation in withdrawn {
        disarm(state, &invitation.username);
    }
}

fn remaining(expires_at: OffsetDateTime, now: OffsetDateTime) -> std::time::Duration {
    std::time::Duration::try_from(expires_at - now).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use time::{Duration, macros::datetime};

    use super::*;

    #[test]
    fn past_deadlines_fire_immediately() {
        let now = datetime!(2026-10-19 12:00 UTC);
        assert_eq!(remaining(now - Duration::hours(1), now), std::time::Duration::ZERO);
        assert_eq!(
            remaining(now + Duration::minutes(90), now),
            std::time::Duration::from_secs(90 * 60)
        );
    }
}
