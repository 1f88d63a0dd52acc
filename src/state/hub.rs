use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::{dto::ws::OutboundMessage, error::TransportError};

/// Outbound side of the connection abstraction the session core talks to.
pub trait Transport {
    /// Send to one peer.
    fn emit(&self, to: &str, message: &OutboundMessage) -> Result<(), TransportError>;

    /// Send to every peer except `except`.
    fn broadcast_excluding(
        &self,
        except: &str,
        message: &OutboundMessage,
    ) -> Result<(), TransportError>;

    /// Send to every peer.
    fn broadcast(&self, message: &OutboundMessage) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn emit(&self, to: &str, message: &OutboundMessage) -> Result<(), TransportError> {
        (**self).emit(to, message)
    }

    fn broadcast_excluding(
        &self,
        except: &str,
        message: &OutboundMessage,
    ) -> Result<(), TransportError> {
        (**self).broadcast_excluding(except, message)
    }

    fn broadcast(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        (**self).broadcast(message)
    }
}

/// Registry of live WebSocket writers keyed by connection id.
#[derive(Default)]
pub struct ConnectionHub {
    connections: DashMap<String, mpsc::UnboundedSender<Message>>,
}

impl ConnectionHub {
    /// Empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the writer channel of a freshly upgraded socket.
    pub fn register(&self, id: String, tx: mpsc::UnboundedSender<Message>) {
        self.connections.insert(id, tx);
    }

    /// Detach a connection; later sends to it are no-ops.
    pub fn unregister(&self, id: &str) {
        self.connections.remove(id);
    }

    /// Number of attached writers.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns true when no writer is attached.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    fn encode(message: &OutboundMessage) -> Result<Message, TransportError> {
        let payload = serde_json::to_string(message)?;
        Ok(Message::Text(payload.into()))
    }

    fn fan_out(
        &self,
        message: &OutboundMessage,
        except: Option<&str>,
    ) -> Result<(), TransportError> {
        let frame = Self::encode(message)?;
        let mut total = 0;
        let mut failed = 0;

        for entry in self.connections.iter() {
            if except == Some(entry.key().as_str()) {
                continue;
            }
            total += 1;
            if entry.value().send(frame.clone()).is_err() {
                failed += 1;
                warn!(id = %entry.key(), event = message.name(), "writer closed, dropping frame");
            }
        }

        trace!(event = message.name(), total, failed, "fan-out complete");
        if failed > 0 {
            return Err(TransportError::Undelivered { failed, total });
        }
        Ok(())
    }
}

impl Transport for ConnectionHub {
    fn emit(&self, to: &str, message: &OutboundMessage) -> Result<(), TransportError> {
        let frame = Self::encode(message)?;
        let tx = self
            .connections
            .get(to)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TransportError::ConnectionClosed(to.to_string()))?;

        tx.send(frame)
            .map_err(|_| TransportError::ConnectionClosed(to.to_string()))
    }

    fn broadcast_excluding(
        &self,
        except: &str,
        message: &OutboundMessage,
    ) -> Result<(), TransportError> {
        self.fan_out(message, Some(except))
    }

    fn broadcast(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        self.fan_out(message, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::ws::PlayerJoined;

    fn joined(id: &str) -> OutboundMessage {
        OutboundMessage::PlayerConnected(PlayerJoined { id: id.into() })
    }

    fn text(message: Message) -> String {
        match message {
            Message::Text(text) => text.as_str().to_owned(),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[test]
    fn emit_reaches_only_target() {
        let hub = ConnectionHub::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        hub.register("a".into(), tx_a);
        hub.register("b".into(), tx_b);

        hub.emit("a", &joined("x")).unwrap();

        assert_eq!(
            text(rx_a.try_recv().unwrap()),
            r#"{"event":"player connected","data":{"id":"x"}}"#
        );
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn emit_to_unknown_connection_fails() {
        let hub = ConnectionHub::new();
        let err = hub.emit("ghost", &joined("x")).unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed(id) if id == "ghost"));
    }

    #[test]
    fn broadcast_excluding_skips_sender() {
        let hub = ConnectionHub::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        hub.register("a".into(), tx_a);
        hub.register("b".into(), tx_b);

        hub.broadcast_excluding("a", &joined("a")).unwrap();

        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn broadcast_reports_closed_writers() {
        let hub = ConnectionHub::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        hub.register("a".into(), tx_a);
        hub.register("b".into(), tx_b);
        drop(rx_b);

        let err = hub.broadcast(&joined("z")).unwrap_err();
        assert!(matches!(
            err,
            TransportError::Undelivered {
                failed: 1,
                total: 2
            }
        ));
        // healthy peers still get the frame
        assert!(rx_a.try_recv().is_ok());
    }

    #[test]
    fn unregister_detaches_writer() {
        let hub = ConnectionHub::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        hub.register("a".into(), tx);
        hub.unregister("a");
        assert!(hub.is_empty());
        assert!(hub.broadcast(&joined("a")).is_ok());
    }
}
