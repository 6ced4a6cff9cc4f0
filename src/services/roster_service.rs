//! Member commands. Each one checks the caller's capability, runs a single job on the roster
//! queue and emits notifications once the job has returned.

use rand::{rng, seq::SliceRandom};
use tracing::{debug, info};

use crate::{
    dto::roster::{
        AdmissionResponse, FlagResponse, LiabilityResponse, PlayerView, RemovalResponse,
        RosterView, TeamsResponse,
    },
    error::ServiceError,
    services::{invitation_timers, notification_events},
    state::{
        SharedState,
        player::{Identity, PlayerRef, UserId},
        roster::{RosterError, normalize_flag},
    },
};

/// Refuse the command unless `caller` is a group member.
pub async fn ensure_member(state: &SharedState, caller: &Identity) -> Result<(), ServiceError> {
    match state.capabilities().is_member(caller.id).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(ServiceError::PermissionDenied(format!(
            "{} is not a member of the group",
            caller.full_name()
        ))),
        Err(err) => {
            debug!(user = %caller.id, error = %err, "member lookup failed");
            Err(ServiceError::PermissionDenied(err.to_string()))
        }
    }
}

/// Refuse the command unless `caller` is an admin.
pub async fn ensure_admin(state: &SharedState, caller: &Identity) -> Result<(), ServiceError> {
    match state.capabilities().is_admin(caller.id).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(ServiceError::PermissionDenied(format!(
            "{} is not an admin",
            caller.full_name()
        ))),
        Err(err) => {
            debug!(user = %caller.id, error = %err, "admin lookup failed");
            Err(ServiceError::PermissionDenied(err.to_string()))
        }
    }
}

/// Open a new list with the caller as its liable entry.
pub async fn create(state: &SharedState, caller: Identity) -> Result<PlayerView, ServiceError> {
    ensure_member(state, &caller).await?;
    let player = state
        .execute("create", move |roster, now| {
            roster.ensure_not_banned(&caller, now)?;
            roster.create(caller)
        })
        .await?;

    info!(player = %player.display_name(), "playing list created");
    notification_events::list_created(state, &player);
    Ok(PlayerView::from(&player))
}

/// Join the active list. A pending invitation for the caller's username is accepted instead.
pub async fn add_self(
    state: &SharedState,
    caller: Identity,
) -> Result<AdmissionResponse, ServiceError> {
    ensure_member(state, &caller).await?;
    let admission = state
        .execute("add_self", move |roster, now| {
            roster.ensure_not_banned(&caller, now)?;
            roster.add_self(caller)
        })
        .await?;

    if admission.accepted_invitation {
        if let Some(username) = admission.player.key.username() {
            invitation_timers::disarm(state, username);
        }
    }
    info!(
        player = %admission.player.display_name(),
        slot = %admission.slot,
        "player joined"
    );
    notification_events::player_added(state, &admission);
    Ok(AdmissionResponse::from(&admission))
}

/// Accept the pending invitation of the caller's username.
pub async fn accept(
    state: &SharedState,
    caller: Identity,
) -> Result<AdmissionResponse, ServiceError> {
    ensure_member(state, &caller).await?;
    let admission = state
        .execute("accept", move |roster, now| {
            roster.ensure_not_banned(&caller, now)?;
            roster.accept(caller)
        })
        .await?;

    if let Some(username) = admission.player.key.username() {
        invitation_timers::disarm(state, username);
    }
    info!(player = %admission.player.display_name(), "invitation accepted");
    notification_events::player_added(state, &admission);
    Ok(AdmissionResponse::from(&admission))
}

/// Leave the list; the liable player must hand the liability over first.
pub async fn leave(state: &SharedState, caller: Identity) -> Result<RemovalResponse, ServiceError> {
    ensure_member(state, &caller).await?;
    let target = PlayerRef::Id(caller.id);
    let outcome = state
        .execute("leave", move |roster, now| roster.remove(&target, now))
        .await?;

    let promoted = outcome
        .promoted
        .as_ref()
        .map(|player| player.display_name())
        .unwrap_or_else(|| "-".into());
    info!(player = %outcome.removed.display_name(), promoted = %promoted, "player left");
    notification_events::player_removed(state, &outcome);
    Ok(RemovalResponse::from(&outcome))
}

/// Confirm the caller's attendance.
pub async fn approve(state: &SharedState, caller: Identity) -> Result<PlayerView, ServiceError> {
    ensure_member(state, &caller).await?;
    let target = PlayerRef::Id(caller.id);
    let player = state
        .execute("approve", move |roster, _| roster.set_approval(&target, true))
        .await?;
    Ok(PlayerView::from(&player))
}

/// Flip one of the caller's flags.
pub async fn toggle_flag(
    state: &SharedState,
    caller: Identity,
    flag: String,
) -> Result<FlagResponse, ServiceError> {
    ensure_member(state, &caller).await?;
    let flag = normalize_flag(&flag)?;
    let target = PlayerRef::Id(caller.id);
    let name = flag.clone();
    let (player, enabled) = state
        .execute("toggle_flag", move |roster, _| {
            roster.toggle_flag(&target, &name)
        })
        .await?;

    Ok(FlagResponse {
        player: PlayerView::from(&player),
        flag,
        enabled,
    })
}

/// Nominate `candidate` for the liability. Only the holder may ask.
pub async fn ask(
    state: &SharedState,
    caller: Identity,
    candidate: UserId,
) -> Result<PlayerView, ServiceError> {
    ensure_member(state, &caller).await?;
    let from = caller.id;
    let (holder, nominee) = state
        .execute("ask", move |roster, _| {
            let nominee = roster.ask(from, candidate)?;
            let holder = roster
                .find(&PlayerRef::Id(from))
                .cloned()
                .ok_or(RosterError::PlayerNotFound(PlayerRef::Id(from)))?;
            Ok((holder, nominee))
        })
        .await?;

    info!(from = %holder.display_name(), to = %nominee.display_name(), "liability requested");
    notification_events::liability_requested(state, &holder, &nominee);
    Ok(PlayerView::from(&nominee))
}

/// Take over the liability after being asked.
pub async fn assume(
    state: &SharedState,
    caller: Identity,
) -> Result<LiabilityResponse, ServiceError> {
    ensure_member(state, &caller).await?;
    let candidate = caller.id;
    let change = state
        .execute("assume", move |roster, _| roster.assume(candidate))
        .await?;

    info!(to = %change.to.display_name(), "liability assumed");
    notification_events::liability_transferred(state, &change);
    Ok(LiabilityResponse::from(&change))
}

/// Current state of the list.
pub async fn view(state: &SharedState, caller: Identity) -> Result<RosterView, ServiceError> {
    ensure_member(state, &caller).await?;
    state
        .query("view", |roster, _| RosterView::from(&*roster))
        .await
}

/// Split the playing slots into random teams of the configured size.
pub async fn shuffle(state: &SharedState, caller: Identity) -> Result<TeamsResponse, ServiceError> {
    ensure_member(state, &caller).await?;
    let mut players = state
        .query("shuffle", |roster, _| roster.playing_members())
        .await?;
    if players.is_empty() {
        return Err(RosterError::NoActiveList.into());
    }

    players.shuffle(&mut rng());
    let teams = players
        .chunks(state.config().team_size)
        .map(|team| team.iter().map(PlayerView::from).collect())
        .collect();
    Ok(TeamsResponse { teams })
}
