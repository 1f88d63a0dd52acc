pub mod hub;
pub mod lifecycle;
pub mod registry;
pub mod session;

use std::sync::Arc;

use crate::services::session_service::SessionHandle;

pub use self::hub::{ConnectionHub, Transport};

/// Cheaply cloneable handle to [`AppState`] passed to every handler.
pub type SharedState = Arc<AppState>;

/// State shared by every HTTP handler: the outbound connection hub and a handle
/// to the session actor that owns all game state.
pub struct AppState {
    connections: Arc<ConnectionHub>,
    session: SessionHandle,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(connections: Arc<ConnectionHub>, session: SessionHandle) -> SharedState {
        Arc::new(Self {
            connections,
            session,
        })
    }

    /// Writer channels of live sockets keyed by connection id.
    pub fn connections(&self) -> &ConnectionHub {
        &self.connections
    }

    /// Sender side of the session actor.
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }
}
