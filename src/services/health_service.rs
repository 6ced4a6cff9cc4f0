use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report degraded mode and the roster revision, logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_roster_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    let revision = state.snapshots().borrow().revision;
    if state.is_degraded().await {
        HealthResponse::degraded(revision)
    } else {
        HealthResponse::ok(revision)
    }
}
