//! HTTP routes.

use axum::Router;

use crate::state::SharedState;

pub mod admin;
pub mod health;
pub mod roster;
pub mod sse;

/// Compose all route trees, wiring in shared state.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(sse::router())
        .merge(roster::router())
        .merge(admin::router())
        .with_state(state)
}
