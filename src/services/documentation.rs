use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the co-op sync server.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::ws::Position,
            crate::dto::ws::GameEventPayload,
            crate::dto::ws::Welcome,
            crate::dto::ws::PlayerJoined,
            crate::dto::snapshot::Snapshot,
            crate::dto::snapshot::ParticipantView,
            crate::dto::snapshot::GameView,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "session", description = "WebSocket channel for players"),
    )
)]
pub struct ApiDoc;
