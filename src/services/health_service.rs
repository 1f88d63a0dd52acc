use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Ask the session actor for a summary, reporting degraded when it cannot answer.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.session().status().await {
        Ok(status) => HealthResponse::ok(status),
        Err(err) => {
            warn!(error = %err, "session actor unavailable (degraded mode)");
            HealthResponse::degraded()
        }
    }
}
