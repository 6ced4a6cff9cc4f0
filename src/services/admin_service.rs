//! Admin commands: direct placement, overrides of the liability protocol, invitations and
//! clearing the list. Every command requires the admin capability.

use tracing::{info, warn};

use crate::{
    dto::roster::{
        AdmissionResponse, BanResponse, BanView, ClearedResponse, FlagResponse, InvitationResponse, InvitationView,
        LiabilityResponse, PlayerView, RemovalResponse, SeedResponse,
    },
    error::ServiceError,
    services::{
        invitation_timers, notification_events,
        roster_service::ensure_admin,
    },
    state::{
        SharedState,
        liability::LiabilityChange,
        player::{Identity, PlayerKey, PlayerRef, UserId},
        roster::{Admission, RosterError, normalize_flag},
    },
};

fn after_admission(state: &SharedState, admission: &Admission) {
    if admission.accepted_invitation {
        if let Some(username) = admission.player.key.username() {
            invitation_timers::disarm(state, username);
        }
    }
    notification_events::player_added(state, admission);
}

/// Put `player` on the list at `index` (clamped to the tail), even when no list is active.
pub async fn add_player(
    state: &SharedState,
    caller: Identity,
    player: Identity,
    index: Option<usize>,
) -> Result<AdmissionResponse, ServiceError> {
    ensure_admin(state, &caller).await?;
    let admission = state
        .execute("admin_add", move |roster, _| roster.add_admin(player, index))
        .await?;

    info!(
        admin = %caller.full_name(),
        player = %admission.player.display_name(),
        position = admission.index,
        "player added by admin"
    );
    after_admission(state, &admission);
    Ok(AdmissionResponse::from(&admission))
}

/// Append `players` in order, stopping at the first one that cannot be added.
pub async fn seed(
    state: &SharedState,
    caller: Identity,
    players: Vec<Identity>,
) -> Result<SeedResponse, ServiceError> {
    ensure_admin(state, &caller).await?;
    let (admissions, failure) = state
        .query("seed", move |roster, _| {
            let base = roster.len();
            let mut admissions = Vec::with_capacity(players.len());
            for (offset, identity) in players.into_iter().enumerate() {
                match roster.add_admin(identity, Some(base + offset)) {
                    Ok(admission) => admissions.push(admission),
                    Err(err) => return (admissions, Some(err)),
                }
            }
            (admissions, None)
        })
        .await?;

    for admission in &admissions {
        after_admission(state, admission);
    }
    if let Some(err) = &failure {
        warn!(added = admissions.len(), error = %err, "seed stopped early");
    } else {
        info!(added = admissions.len(), "list seeded");
    }

    Ok(SeedResponse {
        added: admissions.len(),
        error: failure.map(|err| err.to_string()),
    })
}

/// Take any entry off the list, including reserved slots.
pub async fn remove_player(
    state: &SharedState,
    caller: Identity,
    target: PlayerRef,
) -> Result<RemovalResponse, ServiceError> {
    ensure_admin(state, &caller).await?;
    let outcome = state
        .execute("admin_remove", move |roster, now| roster.remove(&target, now))
        .await?;

    if let PlayerKey::Reserved { username } = &outcome.removed.key {
        invitation_timers::disarm(state, username);
    }
    info!(
        admin = %caller.full_name(),
        player = %outcome.removed.display_name(),
        "player removed by admin"
    );
    notification_events::player_removed(state, &outcome);
    Ok(RemovalResponse::from(&outcome))
}

/// Set or clear the attendance confirmation of an entry.
pub async fn set_approval(
    state: &SharedState,
    caller: Identity,
    target: PlayerRef,
    approved: bool,
) -> Result<PlayerView, ServiceError> {
    ensure_admin(state, &caller).await?;
    let player = state
        .execute("admin_approval", move |roster, _| {
            roster.set_approval(&target, approved)
        })
        .await?;
    Ok(PlayerView::from(&player))
}

/// Flip a flag on any entry.
pub async fn toggle_flag(
    state: &SharedState,
    caller: Identity,
    target: PlayerRef,
    flag: String,
) -> Result<FlagResponse, ServiceError> {
    ensure_admin(state, &caller).await?;
    let flag = normalize_flag(&flag)?;
    let name = flag.clone();
    let (player, enabled) = state
        .execute("admin_toggle_flag", move |roster, _| {
            roster.toggle_flag(&target, &name)
        })
        .await?;

    Ok(FlagResponse {
        player: PlayerView::from(&player),
        flag,
        enabled,
    })
}

/// Move the liability from `from` to `to` without asking.
pub async fn transfer(
    state: &SharedState,
    caller: Identity,
    from: UserId,
    to: UserId,
) -> Result<LiabilityResponse, ServiceError> {
    ensure_admin(state, &caller).await?;
    let (previous, holder) = state
        .execute("admin_transfer", move |roster, _| {
            roster.transfer_liability(from, to)
        })
        .await?;

    let change = LiabilityChange {
        from: (from != to).then_some(previous),
        to: holder,
    };
    if change.from.is_some() {
        info!(to = %change.to.display_name(), "liability transferred by admin");
        notification_events::liability_transferred(state, &change);
    }
    Ok(LiabilityResponse::from(&change))
}

/// Give the liability to `to` when nobody holds it.
pub async fn grant(
    state: &SharedState,
    caller: Identity,
    to: UserId,
) -> Result<LiabilityResponse, ServiceError> {
    ensure_admin(state, &caller).await?;
    let holder = state
        .execute("admin_grant", move |roster, _| roster.grant_liability(to))
        .await?;

    let change = LiabilityChange {
        from: None,
        to: holder,
    };
    info!(to = %change.to.display_name(), "liability granted by admin");
    notification_events::liability_transferred(state, &change);
    Ok(LiabilityResponse::from(&change))
}

/// Reserve a slot for `username` and start its acceptance window.
pub async fn invite(
    state: &SharedState,
    caller: Identity,
    username: String,
    index: Option<usize>,
) -> Result<InvitationResponse, ServiceError> {
    ensure_admin(state, &caller).await?;
    let (invitation, position) = state
        .execute("invite", move |roster, now| {
            let invitation = roster.invite(&username, index, now)?;
            let target = PlayerRef::Reserved(invitation.username.clone());
            let position = roster
                .position(&target)
                .ok_or(RosterError::PlayerNotFound(target))?;
            Ok((invitation, position))
        })
        .await?;

    invitation_timers::arm(state, &invitation);
    info!(
        username = %invitation.username,
        position,
        expires_at = %invitation.expires_at,
        "invitation created"
    );
    notification_events::invited(state, &invitation);
    Ok(InvitationResponse {
        invitation: InvitationView::from(&invitation),
        position,
    })
}

/// Empty the list, its invitations and nominations.
pub async fn clear_all(
    state: &SharedState,
    caller: Identity,
) -> Result<ClearedResponse, ServiceError> {
    ensure_admin(state, &caller).await?;
    let withdrawn = state
        .query("admin_clear", |roster, _| roster.clear_all())
        .await?;

    invitation_timers::disarm_all(state, &withdrawn);
    info!(admin = %caller.full_name(), withdrawn = withdrawn.len(), "list cleared by admin");
    notification_events::list_cleared(state, false);
    Ok(ClearedResponse {
        withdrawn_invitations: withdrawn.len(),
    })
}

/// Bar `user` from joining for `days` days. Entries already on the list stay.
pub async fn ban(
    state: &SharedState,
    caller: Identity,
    user: UserId,
    days: u32,
) -> Result<BanResponse, ServiceError> {
    ensure_admin(state, &caller).await?;
    let duration = time::Duration::days(i64::from(days));
    let ban = state
        .execute("admin_ban", move |roster, now| roster.ban(user, duration, now))
        .await?;

    info!(admin = %caller.full_name(), user = %user, until = %ban.until, "member banned");
    notification_events::banned(state, &ban);
    Ok(BanResponse {
        ban: BanView::from(&ban),
    })
}

/// Lift the ban of `user`.
pub async fn unban(
    state: &SharedState,
    caller: Identity,
    user: UserId,
) -> Result<BanResponse, ServiceError> {
    ensure_admin(state, &caller).await?;
    let ban = state
        .execute("admin_unban", move |roster, _| roster.unban(user))
        .await?;

    info!(admin = %caller.full_name(), user = %user, "ban lifted");
    notification_events::unbanned(state, &ban);
    Ok(BanResponse {
        ban: BanView::from(&ban),
    })
}
