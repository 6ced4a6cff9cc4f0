//! Health check response.

use serde::Serialize;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Revision of the in-memory roster.
    pub revision: u64,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(revision: u64) -> Self {
        Self {
            status: "ok".to_string(),
            revision,
        }
    }

    /// Create a health response indicating the system runs without storage.
    pub fn degraded(revision: u64) -> Self {
        Self {
            status: "degraded".to_string(),
            revision,
        }
    }
}
