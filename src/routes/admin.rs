//! Admin endpoints. The caller in each body must hold the admin capability.

use axum::{Json, Router, extract::State, routing::post};
use validator::Validate;

use crate::{
    dto::roster::{
        AdminAddRequest, AdminFlagRequest, AdminTargetRequest, AdmissionResponse,
        ApprovalRequest, BanRequest, BanResponse, CallerRequest, ClearedResponse, FlagResponse, GrantRequest,
        InvitationResponse, InviteRequest, LiabilityResponse, PlayerView, RemovalResponse,
        SeedRequest, SeedResponse, TransferRequest, UnbanRequest,
    },
    error::AppError,
    services::admin_service,
    state::{
        SharedState,
        player::{Identity, PlayerRef, UserId},
    },
};

/// Put a member on the list, optionally at a given position.
pub async fn add_player(
    State(state): State<SharedState>,
    Json(payload): Json<AdminAddRequest>,
) -> Result<Json<AdmissionResponse>, AppError> {
    payload.validate()?;
    let caller = Identity::try_from(payload.caller)?;
    let player = Identity::try_from(payload.player)?;
    Ok(Json(
        admin_service::add_player(&state, caller, player, payload.index).await?,
    ))
}

/// Append an ordered list of members.
pub async fn seed(
    State(state): State<SharedState>,
    Json(payload): Json<SeedRequest>,
) -> Result<Json<SeedResponse>, AppError> {
    payload.validate()?;
    let caller = Identity::try_from(payload.caller)?;
    let players = payload
        .players
        .into_iter()
        .map(Identity::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(admin_service::seed(&state, caller, players).await?))
}

/// Remove any entry, reserved slots included.
pub async fn remove_player(
    State(state): State<SharedState>,
    Json(payload): Json<AdminTargetRequest>,
) -> Result<Json<RemovalResponse>, AppError> {
    payload.validate()?;
    let caller = Identity::try_from(payload.caller)?;
    let target = PlayerRef::try_from(payload.target)?;
    Ok(Json(
        admin_service::remove_player(&state, caller, target).await?,
    ))
}

/// Set the approval of an entry.
pub async fn set_approval(
    State(state): State<SharedState>,
    Json(payload): Json<ApprovalRequest>,
) -> Result<Json<PlayerView>, AppError> {
    payload.validate()?;
    let caller = Identity::try_from(payload.caller)?;
    let target = PlayerRef::try_from(payload.target)?;
    Ok(Json(
        admin_service::set_approval(&state, caller, target, payload.approved).await?,
    ))
}

/// Toggle a flag on an entry.
pub async fn toggle_flag(
    State(state): State<SharedState>,
    Json(payload): Json<AdminFlagRequest>,
) -> Result<Json<FlagResponse>, AppError> {
    payload.validate()?;
    let caller = Identity::try_from(payload.caller)?;
    let target = PlayerRef::try_from(payload.target)?;
    Ok(Json(
        admin_service::toggle_flag(&state, caller, target, payload.flag).await?,
    ))
}

/// Move the liability without the handshake.
pub async fn transfer(
    State(state): State<SharedState>,
    Json(payload): Json<TransferRequest>,
) -> Result<Json<LiabilityResponse>, AppError> {
    payload.validate()?;
    let caller = Identity::try_from(payload.caller)?;
    Ok(Json(
        admin_service::transfer(&state, caller, UserId(payload.from), UserId(payload.to)).await?,
    ))
}

/// Hand an unassigned liability to a member.
pub async fn grant(
    State(state): State<SharedState>,
    Json(payload): Json<GrantRequest>,
) -> Result<Json<LiabilityResponse>, AppError> {
    payload.validate()?;
    let caller = Identity::try_from(payload.caller)?;
    Ok(Json(
        admin_service::grant(&state, caller, UserId(payload.to)).await?,
    ))
}

/// Reserve a slot for a username.
pub async fn invite(
    State(state): State<SharedState>,
    Json(payload): Json<InviteRequest>,
) -> Result<Json<InvitationResponse>, AppError> {
    payload.validate()?;
    let caller = Identity::try_from(payload.caller)?;
    Ok(Json(
        admin_service::invite(&state, caller, payload.username, payload.index).await?,
    ))
}

/// Empty the list.
pub async fn clear(
    State(state): State<SharedState>,
    Json(payload): Json<CallerRequest>,
) -> Result<Json<ClearedResponse>, AppError> {
    payload.validate()?;
    let caller = Identity::try_from(payload.caller)?;
    Ok(Json(admin_service::clear_all(&state, caller).await?))
}

/// Bar a member from joining for a number of days.
pub async fn ban(
    State(state): State<SharedState>,
    Json(payload): Json<BanRequest>,
) -> Result<Json<BanResponse>, AppError> {
    payload.validate()?;
    let caller = Identity::try_from(payload.caller)?;
    Ok(Json(
        admin_service::ban(&state, caller, UserId(payload.user_id), payload.days).await?,
    ))
}

/// Lift a ban.
pub async fn unban(
    State(state): State<SharedState>,
    Json(payload): Json<UnbanRequest>,
) -> Result<Json<BanResponse>, AppError> {
    payload.validate()?;
    let caller = Identity::try_from(payload.caller)?;
    Ok(Json(
        admin_service::unban(&state, caller, UserId(payload.user_id)).await?,
    ))
}

/// Admin routes.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/admin/roster/players", post(add_player))
        .route("/admin/roster/players/remove", post(remove_player))
        .route("/admin/roster/seed", post(seed))
        .route("/admin/roster/approval", post(set_approval))
        .route("/admin/roster/flag", post(toggle_flag))
        .route("/admin/roster/liability/transfer", post(transfer))
        .route("/admin/roster/liability/grant", post(grant))
        .route("/admin/roster/invitations", post(invite))
        .route("/admin/roster/clear", post(clear))
        .route("/admin/roster/ban", post(ban))
        .route("/admin/roster/unban", post(unban))
}
