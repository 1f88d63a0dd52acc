use serde::Serialize;
use utoipa::ToSchema;

use crate::services::session_service::SessionStatus;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Connected participants.
    pub players: usize,
    /// Current level number.
    pub level: u32,
    /// Whether the `serverstate` loop is running.
    pub broadcasting: bool,
}

impl HealthResponse {
    /// Create a health response from a live session summary.
    pub fn ok(status: SessionStatus) -> Self {
        Self {
            status: "ok".to_string(),
            players: status.participants,
            level: status.level,
            broadcasting: status.broadcasting,
        }
    }

    /// Create a health response indicating the session actor did not answer.
    pub fn degraded() -> Self {
        Self {
            status: "degraded".to_string(),
            players: 0,
            level: 0,
            broadcasting: false,
        }
    }
}
