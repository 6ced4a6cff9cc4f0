//! Member endpoints. Every body carries the caller's identity.

use axum::{Json, Router, extract::State, routing::post};
use validator::Validate;

use crate::{
    dto::roster::{
        AdmissionResponse, AskRequest, CallerRequest, FlagRequest, FlagResponse,
        LiabilityResponse, PlayerView, RemovalResponse, RosterView, TeamsResponse,
    },
    error::AppError,
    services::roster_service,
    state::{
        SharedState,
        player::{Identity, UserId},
    },
};

/// Validate a caller-only body and extract the identity.
fn caller_of(payload: CallerRequest) -> Result<Identity, AppError> {
    payload.validate()?;
    Ok(Identity::try_from(payload.caller)?)
}

/// Open a new list with the caller as liable player.
pub async fn create(
    State(state): State<SharedState>,
    Json(payload): Json<CallerRequest>,
) -> Result<Json<PlayerView>, AppError> {
    let caller = caller_of(payload)?;
    Ok(Json(roster_service::create(&state, caller).await?))
}

/// Join the active list.
pub async fn join(
    State(state): State<SharedState>,
    Json(payload): Json<CallerRequest>,
) -> Result<Json<AdmissionResponse>, AppError> {
    let caller = caller_of(payload)?;
    Ok(Json(roster_service::add_self(&state, caller).await?))
}

/// Leave the list.
pub async fn leave(
    State(state): State<SharedState>,
    Json(payload): Json<CallerRequest>,
) -> Result<Json<RemovalResponse>, AppError> {
    let caller = caller_of(payload)?;
    Ok(Json(roster_service::leave(&state, caller).await?))
}

/// Confirm attendance.
pub async fn approve(
    State(state): State<SharedState>,
    Json(payload): Json<CallerRequest>,
) -> Result<Json<PlayerView>, AppError> {
    let caller = caller_of(payload)?;
    Ok(Json(roster_service::approve(&state, caller).await?))
}

/// Toggle one of the caller's flags.
pub async fn toggle_flag(
    State(state): State<SharedState>,
    Json(payload): Json<FlagRequest>,
) -> Result<Json<FlagResponse>, AppError> {
    payload.validate()?;
    let caller = Identity::try_from(payload.caller)?;
    Ok(Json(
        roster_service::toggle_flag(&state, caller, payload.flag).await?,
    ))
}

/// Nominate another playing member for the liability.
pub async fn ask(
    State(state): State<SharedState>,
    Json(payload): Json<AskRequest>,
) -> Result<Json<PlayerView>, AppError> {
    payload.validate()?;
    let caller = Identity::try_from(payload.caller)?;
    Ok(Json(
        roster_service::ask(&state, caller, UserId(payload.candidate)).await?,
    ))
}

/// Take over the liability after being asked.
pub async fn assume(
    State(state): State<SharedState>,
    Json(payload): Json<CallerRequest>,
) -> Result<Json<LiabilityResponse>, AppError> {
    let caller = caller_of(payload)?;
    Ok(Json(roster_service::assume(&state, caller).await?))
}

/// Accept a pending invitation.
pub async fn accept(
    State(state): State<SharedState>,
    Json(payload): Json<CallerRequest>,
) -> Result<Json<AdmissionResponse>, AppError> {
    let caller = caller_of(payload)?;
    Ok(Json(roster_service::accept(&state, caller).await?))
}

/// Current list.
pub async fn view(
    State(state): State<SharedState>,
    Json(payload): Json<CallerRequest>,
) -> Result<Json<RosterView>, AppError> {
    let caller = caller_of(payload)?;
    Ok(Json(roster_service::view(&state, caller).await?))
}

/// Random teams from the playing slots.
pub async fn shuffle(
    State(state): State<SharedState>,
    Json(payload): Json<CallerRequest>,
) -> Result<Json<TeamsResponse>, AppError> {
    let caller = caller_of(payload)?;
    Ok(Json(roster_service::shuffle(&state, caller).await?))
}

/// Member routes.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/roster/create", post(create))
        .route("/roster/join", post(join))
        .route("/roster/leave", post(leave))
        .route("/roster/approve", post(approve))
        .route("/roster/flag", post(toggle_flag))
        .route("/roster/liability/ask", post(ask))
        .route("/roster/liability/assume", post(assume))
        .route("/roster/invitation/accept", post(accept))
        .route("/roster/view", post(view))
        .route("/roster/shuffle", post(shuffle))
}
