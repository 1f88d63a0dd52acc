//! In-memory transport used by unit tests.

use std::cell::{Cell, RefCell};

use crate::{
    dto::{snapshot::Snapshot, ws::GameEventPayload, ws::OutboundMessage},
    error::TransportError,
    state::hub::Transport,
};

/// Who a recorded message was addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    One(String),
    AllExcept(String),
    All,
}

/// How `broadcast` should fail when told to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastFailure {
    /// One of one peers unreachable.
    Undelivered,
    /// Encoding error before anything is sent.
    Serialization,
}

#[derive(Default)]
pub struct RecordingTransport {
    sent: RefCell<Vec<(Target, OutboundMessage)>>,
    fail_broadcasts: Cell<Option<BroadcastFailure>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_broadcasts(&self, fail: Option<BroadcastFailure>) {
        self.fail_broadcasts.set(fail);
    }

    pub fn sent(&self) -> Vec<(Target, OutboundMessage)> {
        self.sent.borrow().clone()
    }

    pub fn clear(&self) {
        self.sent.borrow_mut().clear();
    }

    pub fn server_states(&self) -> Vec<Snapshot> {
        self.sent
            .borrow()
            .iter()
            .filter_map(|(_, message)| match message {
                OutboundMessage::ServerState(snapshot) => Some(snapshot.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn game_events(&self) -> Vec<GameEventPayload> {
        self.sent
            .borrow()
            .iter()
            .filter_map(|(_, message)| match message {
                OutboundMessage::GameEvent(payload) => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, target: Target, message: &OutboundMessage) -> Result<(), TransportError> {
        self.sent.borrow_mut().push((target, message.clone()));
        Ok(())
    }
}

impl Transport for RecordingTransport {
    fn emit(&self, to: &str, message: &OutboundMessage) -> Result<(), TransportError> {
        self.record(Target::One(to.to_string()), message)
    }

    fn broadcast_excluding(
        &self,
        except: &str,
        message: &OutboundMessage,
    ) -> Result<(), TransportError> {
        self.record(Target::AllExcept(except.to_string()), message)
    }

    fn broadcast(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        match self.fail_broadcasts.get() {
            None => self.record(Target::All, message),
            Some(BroadcastFailure::Undelivered) => Err(TransportError::Undelivered {
                failed: 1,
                total: 1,
            }),
            Some(BroadcastFailure::Serialization) => {
                let err = serde_json::from_str::<()>("not json")
                    .expect_err("invalid json must not parse");
                Err(TransportError::Serialization(err))
            }
        }
    }
}
