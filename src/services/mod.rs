/// Self-correcting `serverstate` broadcaster.
pub mod broadcast_loop;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Warmup and finish barriers.
pub mod level_progression;
/// Session actor owning all game state.
pub mod session_service;
#[cfg(test)]
pub(crate) mod testing;
/// WebSocket connection and message handling service.
pub mod websocket_service;
