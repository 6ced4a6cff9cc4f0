//! Notification descriptors emitted after roster changes.
//!
//! Delivery is best effort: these helpers only push onto the hub and never wait on the notifier.

use serde::Serialize;
use serde_json::json;
use tracing::warn;

use crate::{
    dto::roster::{BanView, InvitationView, PlayerView},
    state::{
        Notification, NotificationKind, NotificationTarget, SharedState,
        ban::Ban,
        invitation::Invitation,
        liability::LiabilityChange,
        player::Player,
        roster::{Admission, RemovalOutcome},
    },
};

fn send<T: Serialize>(
    state: &SharedState,
    target: NotificationTarget,
    kind: NotificationKind,
    payload: &T,
) {
    match serde_json::to_value(payload) {
        Ok(payload) => state.notifications().send(Notification {
            target,
            kind,
            payload,
        }),
        Err(err) => warn!(kind = kind.as_str(), error = %err, "failed to serialise notification"),
    }
}

fn broadcast<T: Serialize>(state: &SharedState, kind: NotificationKind, payload: &T) {
    send(state, NotificationTarget::Broadcast, kind, payload);
}

/// Direct message to a member; reserved slots have nobody to talk to.
fn direct<T: Serialize>(state: &SharedState, player: &Player, kind: NotificationKind, payload: &T) {
    if let Some(id) = player.user_id() {
        send(state, NotificationTarget::User(id), kind, payload);
    }
}

/// Announce a new list and who opened it.
pub fn list_created(state: &SharedState, creator: &Player) {
    broadcast(
        state,
        NotificationKind::ListCreated,
        &json!({ "creator": PlayerView::from(creator) }),
    );
}

/// Announce a join, or an accepted invitation when the slot was reserved.
pub fn player_added(state: &SharedState, admission: &Admission) {
    let kind = if admission.accepted_invitation {
        NotificationKind::InvitationAccepted
    } else {
        NotificationKind::PlayerAdded
    };
    broadcast(
        state,
        kind,
        &json!({
            "player": PlayerView::from(&admission.player),
            "position": admission.index,
            "slot": admission.slot,
        }),
    );
}

/// Announce a departure and, when it happened, the promotion that followed it.
pub fn player_removed(state: &SharedState, outcome: &RemovalOutcome) {
    broadcast(
        state,
        NotificationKind::PlayerRemoved,
        &json!({ "player": PlayerView::from(&outcome.removed), "slot": outcome.slot }),
    );
    promoted(state, outcome);
}

/// Tell each pruned player privately, then the group once with everyone dropped.
pub fn pruned(state: &SharedState, outcomes: &[RemovalOutcome]) {
    for outcome in outcomes {
        direct(
            state,
            &outcome.removed,
            NotificationKind::Pruned,
            &json!({ "player": PlayerView::from(&outcome.removed) }),
        );
        promoted(state, outcome);
    }
    if !outcomes.is_empty() {
        let removed: Vec<PlayerView> = outcomes
            .iter()
            .map(|outcome| PlayerView::from(&outcome.removed))
            .collect();
        broadcast(state, NotificationKind::Pruned, &json!({ "removed": removed }));
    }
}

fn promoted(state: &SharedState, outcome: &RemovalOutcome) {
    let Some(player) = &outcome.promoted else {
        return;
    };
    let payload = json!({
        "player": PlayerView::from(player),
        "replacing": PlayerView::from(&outcome.removed),
    });
    direct(state, player, NotificationKind::Promoted, &payload);
    broadcast(state, NotificationKind::Promoted, &payload);
}

/// Nudge players who have not confirmed yet.
pub fn reminders(state: &SharedState, pending: &[Player], last_call: bool) {
    let kind = if last_call {
        NotificationKind::FinalReminder
    } else {
        NotificationKind::Reminder
    };
    for player in pending {
        direct(state, player, kind, &json!({ "player": PlayerView::from(player) }));
    }
}

/// Ask `candidate` privately to take over the liability.
pub fn liability_requested(state: &SharedState, holder: &Player, candidate: &Player) {
    direct(
        state,
        candidate,
        NotificationKind::LiabilityRequested,
        &json!({ "from": PlayerView::from(holder) }),
    );
}

/// Announce the new liable player.
pub fn liability_transferred(state: &SharedState, change: &LiabilityChange) {
    broadcast(
        state,
        NotificationKind::LiabilityTransferred,
        &json!({
            "from": change.from.as_ref().map(PlayerView::from),
            "to": PlayerView::from(&change.to),
        }),
    );
}

/// Announce a reserved slot.
pub fn invited(state: &SharedState, invitation: &Invitation) {
    broadcast(
        state,
        NotificationKind::Invited,
        &InvitationView::from(invitation),
    );
}

/// Announce that an invitation ran out, plus the promotion it caused.
pub fn invitation_expired(state: &SharedState, username: &str, outcome: Option<&RemovalOutcome>) {
    broadcast(
        state,
        NotificationKind::InvitationExpired,
        &json!({ "username": username }),
    );
    if let Some(outcome) = outcome {
        promoted(state, outcome);
    }
}

/// Announce a cleared list. `scheduled` tells the nightly cleanup from an admin clear.
pub fn list_cleared(state: &SharedState, scheduled: bool) {
    broadcast(
        state,
        NotificationKind::ListCleared,
        &json!({ "scheduled": scheduled }),
    );
}

/// Tell the banned member how long the ban lasts.
pub fn banned(state: &SharedState, ban: &Ban) {
    send(
        state,
        NotificationTarget::User(ban.user_id),
        NotificationKind::Banned,
        &BanView::from(ban),
    );
}

/// Tell a member their ban was lifted.
pub fn unbanned(state: &SharedState, ban: &Ban) {
    send(
        state,
        NotificationTarget::User(ban.user_id),
        NotificationKind::Unbanned,
        &BanView::from(ban),
    );
}
