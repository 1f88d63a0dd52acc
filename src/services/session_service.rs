//! The session actor: one task owns the participant registry, the session
//! counters and the broadcast loop, and applies commands to them one at a time.

use std::time::Duration;

use tokio::{
    sync::{mpsc, oneshot},
    time::timeout,
};
use tracing::{debug, error, info, trace, warn};

use crate::{
    dto::{
        snapshot::Snapshot,
        ws::{GameEventPayload, InboundMessage, OutboundMessage, PlayerJoined, Position, Welcome},
    },
    error::{ServiceError, SessionError, TransportError},
    services::{
        broadcast_loop::{BroadcastLoop, TickOutcome},
        level_progression::{self, GameSignal, QuorumStatus},
    },
    state::{
        hub::Transport,
        registry::{Participant, ParticipantRegistry},
        session::SessionState,
    },
};

const STATUS_TIMEOUT: Duration = Duration::from_secs(2);

/// Work items processed by the session actor.
#[derive(Debug)]
pub enum SessionCommand {
    /// Transport established a connection.
    Connect {
        /// Connection id.
        id: String,
    },
    /// Transport lost a connection.
    Disconnect {
        /// Connection id.
        id: String,
    },
    /// A parsed message from a connection.
    Inbound {
        /// Connection id.
        id: String,
        /// Decoded frame.
        message: InboundMessage,
    },
    /// Broadcast loop tick stamped with the ticker generation that produced it.
    Tick {
        /// Generation of the ticker.
        generation: u64,
    },
    /// Request a status summary.
    Status {
        /// Reply channel.
        reply: oneshot::Sender<SessionStatus>,
    },
}

/// Summary exposed on the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    /// Participants in the `connected` state.
    pub participants: usize,
    /// Current level number.
    pub level: u32,
    /// Whether the broadcast loop is scheduled.
    pub broadcasting: bool,
}

/// Explicit context object holding every piece of session state.
pub struct SessionContext<T> {
    registry: ParticipantRegistry,
    session: SessionState,
    broadcast: BroadcastLoop,
    transport: T,
}

impl<T: Transport> SessionContext<T> {
    /// Build a context whose broadcast loop posts ticks to `ticks`.
    pub fn new(transport: T, period: Duration, ticks: mpsc::UnboundedSender<SessionCommand>) -> Self {
        Self {
            registry: ParticipantRegistry::new(),
            session: SessionState::new(),
            broadcast: BroadcastLoop::new(period, ticks),
            transport,
        }
    }

    /// Participant registry.
    pub fn registry(&self) -> &ParticipantRegistry {
        &self.registry
    }

    /// Session counters and membership sets.
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// The broadcast loop.
    pub fn broadcast_loop(&self) -> &BroadcastLoop {
        &self.broadcast
    }

    /// Outbound transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Apply one command, containing any error to the connection it concerns.
    pub fn handle(&mut self, command: SessionCommand) {
        let (id, result) = match command {
            SessionCommand::Connect { id } => {
                let result = self.connect(&id);
                (id, result)
            }
            SessionCommand::Disconnect { id } => {
                let result = self.disconnect(&id);
                (id, result)
            }
            SessionCommand::Inbound { id, message } => {
                let result = self.handle_message(&id, message);
                (id, result)
            }
            SessionCommand::Tick { generation } => {
                self.tick(generation);
                return;
            }
            SessionCommand::Status { reply } => {
                let _ = reply.send(self.status());
                return;
            }
        };

        match result {
            Ok(()) => {}
            Err(err @ SessionError::InvalidTransition(_)) => {
                error!(id = %id, error = %err, "lifecycle misuse; connection handling aborted")
            }
            Err(err) => warn!(id = %id, error = %err, "rejected connection command"),
        }
    }

    /// Register a new participant, greet it, announce it, and move it to `connected`.
    pub fn connect(&mut self, id: &str) -> Result<(), SessionError> {
        if self.registry.contains(id) {
            return Err(SessionError::DuplicateParticipant(id.to_string()));
        }

        self.registry.insert(Participant::new(id)?);

        let welcome = OutboundMessage::Connected(Welcome {
            id: id.to_string(),
            players: self.registry.views(),
            num_level: self.session.level(),
        });
        report(id, &welcome, self.transport.emit(id, &welcome));

        let joined = OutboundMessage::PlayerConnected(PlayerJoined { id: id.to_string() });
        report(id, &joined, self.transport.broadcast_excluding(id, &joined));

        let participant = self
            .registry
            .get_mut(id)
            .ok_or_else(|| SessionError::UnknownParticipant(id.to_string()))?;
        if let Err(err) = participant.lifecycle_mut().connect() {
            self.registry.remove(id);
            return Err(err.into());
        }

        self.on_connected(id);
        Ok(())
    }

    /// Move a participant to `disconnected` and run the departure side effects.
    pub fn disconnect(&mut self, id: &str) -> Result<(), SessionError> {
        let participant = self
            .registry
            .get_mut(id)
            .ok_or_else(|| SessionError::UnknownParticipant(id.to_string()))?;

        if let Err(err) = participant.lifecycle_mut().disconnect() {
            // the instance is unusable either way
            self.registry.remove(id);
            return Err(err.into());
        }

        self.on_disconnected(id);
        Ok(())
    }

    /// Interpret a message from a registered participant.
    pub fn handle_message(&mut self, id: &str, message: InboundMessage) -> Result<(), SessionError> {
        if !self.registry.contains(id) {
            return Err(SessionError::UnknownParticipant(id.to_string()));
        }

        match message {
            InboundMessage::Move(position) => self.move_participant(id, position),
            InboundMessage::GameEvent(payload) => match GameSignal::classify(payload)? {
                GameSignal::Movement(position) => self.move_participant(id, position),
                GameSignal::Level(signal) => {
                    debug!(id = %id, ?signal, "level signal");
                    if let Some(event) = level_progression::apply(&mut self.session, id, signal) {
                        self.broadcast_game_event(event);
                    }
                    Ok(())
                }
                GameSignal::Relay(mut payload) => {
                    payload.player_id = Some(id.to_string());
                    self.broadcast_game_event(payload);
                    Ok(())
                }
            },
        }
    }

    /// Run a tick from the ticker stamped `generation`; stale ticks are ignored.
    pub fn tick(&mut self, generation: u64) -> Option<TickOutcome> {
        if !self.broadcast.is_live(generation) {
            trace!(generation, "ignoring tick from cancelled ticker");
            return None;
        }
        Some(self.publish_snapshot())
    }

    /// Snapshot the world and hand it to the broadcast loop.
    pub fn publish_snapshot(&mut self) -> TickOutcome {
        let snapshot = self.snapshot();
        self.broadcast.publish(snapshot, &self.transport)
    }

    /// Current broadcastable state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.registry.views(), self.session.view())
    }

    /// Status summary.
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            participants: self.session.participant_count(),
            level: self.session.level(),
            broadcasting: self.broadcast.is_scheduled(),
        }
    }

    fn on_connected(&mut self, id: &str) {
        self.session.participant_joined();
        info!(
            id = %id,
            participants = self.session.participant_count(),
            "participant connected"
        );
        self.broadcast.check(self.session.participant_count());
    }

    fn on_disconnected(&mut self, id: &str) {
        let Some(participant) = self.registry.remove(id) else {
            return;
        };

        let left = OutboundMessage::PlayerDisconnected(participant.view());
        report(id, &left, self.transport.broadcast(&left));

        let before = QuorumStatus::capture(&self.session);
        self.session.participant_left(id);
        info!(
            id = %id,
            participants = self.session.participant_count(),
            "participant disconnected and removed"
        );

        for event in level_progression::after_departure(&mut self.session, before) {
            self.broadcast_game_event(event);
        }

        self.broadcast.check(self.session.participant_count());
    }

    fn move_participant(&mut self, id: &str, position: Position) -> Result<(), SessionError> {
        let participant = self
            .registry
            .get_mut(id)
            .ok_or_else(|| SessionError::UnknownParticipant(id.to_string()))?;
        participant.position = position;
        Ok(())
    }

    fn broadcast_game_event(&self, payload: GameEventPayload) {
        let origin = payload.player_id.clone().unwrap_or_default();
        let message = OutboundMessage::GameEvent(payload);
        report(&origin, &message, self.transport.broadcast(&message));
    }
}

fn report(id: &str, message: &OutboundMessage, result: Result<(), TransportError>) {
    if let Err(err) = result {
        warn!(id = %id, event = message.name(), error = %err, "delivery failed");
    }
}

/// Drain `commands` forever, applying each to `context` to completion.
pub async fn run<T: Transport>(
    mut context: SessionContext<T>,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
) {
    info!(
        period_ms = context.broadcast_loop().period().as_millis() as u64,
        "session actor started"
    );
    while let Some(command) = commands.recv().await {
        context.handle(command);
    }
    info!("session actor stopped");
}

/// Spawn the session actor and return a handle to it.
pub fn spawn<T>(transport: T, period: Duration) -> SessionHandle
where
    T: Transport + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let context = SessionContext::new(transport, period, tx.clone());
    tokio::spawn(run(context, rx));
    SessionHandle::new(tx)
}

/// Cloneable sender side of the session actor.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    /// Wrap a command sender.
    pub fn new(tx: mpsc::UnboundedSender<SessionCommand>) -> Self {
        Self { tx }
    }

    /// Report a newly established connection.
    pub fn connect(&self, id: &str) -> Result<(), ServiceError> {
        self.send(SessionCommand::Connect { id: id.to_string() })
    }

    /// Report a lost connection.
    pub fn disconnect(&self, id: &str) -> Result<(), ServiceError> {
        self.send(SessionCommand::Disconnect { id: id.to_string() })
    }

    /// Forward a decoded frame.
    pub fn inbound(&self, id: &str, message: InboundMessage) -> Result<(), ServiceError> {
        self.send(SessionCommand::Inbound {
            id: id.to_string(),
            message,
        })
    }

    /// Ask the actor for a status summary.
    pub async fn status(&self) -> Result<SessionStatus, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Status { reply })?;
        match timeout(STATUS_TIMEOUT, rx).await {
            Ok(Ok(status)) => Ok(status),
            _ => Err(ServiceError::SessionUnavailable),
        }
    }

    fn send(&self, command: SessionCommand) -> Result<(), ServiceError> {
        self.tx
            .send(command)
            .map_err(|_| ServiceError::SessionUnavailable)
    }
}
