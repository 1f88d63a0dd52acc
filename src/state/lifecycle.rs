use std::fmt;

use thiserror::Error;

/// Phases a single connection moves through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Implicit state before `startup` has run.
    None,
    /// Transport handshake done, participant registered but not yet counted.
    Connecting,
    /// Participant is live and counted in the session population.
    Connected,
    /// Terminal state; the owning participant is discarded.
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

/// Events that can be applied to a connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Run once at construction.
    Startup,
    /// Transport reports the connection as established.
    Connect,
    /// Transport reports the connection as gone.
    Disconnect,
}

/// Error returned when an event is not legal from the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while {from}")]
pub struct InvalidTransition {
    /// The state the lifecycle was in when the event was received.
    pub from: ConnectionState,
    /// The rejected event.
    pub event: LifecycleEvent,
}

/// Pure transition table. Side effects are dispatched by the caller after a
/// successful transition.
pub fn transition(
    from: ConnectionState,
    event: LifecycleEvent,
) -> Result<ConnectionState, InvalidTransition> {
    let next = match (from, event) {
        (ConnectionState::None, LifecycleEvent::Startup) => ConnectionState::Connecting,
        (ConnectionState::Connecting, LifecycleEvent::Connect) => ConnectionState::Connected,
        (ConnectionState::Connected, LifecycleEvent::Disconnect) => ConnectionState::Disconnected,
        (from, event) => return Err(InvalidTransition { from, event }),
    };

    Ok(next)
}

/// Per-connection finite-state object.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: ConnectionState,
}

impl Lifecycle {
    /// Build a lifecycle and run `startup`, leaving it in [`ConnectionState::Connecting`].
    pub fn startup() -> Result<Self, InvalidTransition> {
        let mut lifecycle = Self {
            state: ConnectionState::None,
        };
        lifecycle.apply(LifecycleEvent::Startup)?;
        Ok(lifecycle)
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the lifecycle reached its terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state == ConnectionState::Disconnected
    }

    /// Move `connecting -> connected`.
    pub fn connect(&mut self) -> Result<ConnectionState, InvalidTransition> {
        self.apply(LifecycleEvent::Connect)
    }

    /// Move `connected -> disconnected`.
    pub fn disconnect(&mut self) -> Result<ConnectionState, InvalidTransition> {
        self.apply(LifecycleEvent::Disconnect)
    }

    fn apply(&mut self, event: LifecycleEvent) -> Result<ConnectionState, InvalidTransition> {
        self.state = transition(self.state, event)?;
        Ok(self.state)
    }
}
