use std::ops::ControlFlow;

use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::InboundMessage,
    services::session_service::SessionHandle,
    state::SharedState,
};

/// Opaque id handed to a freshly upgraded socket.
pub fn new_connection_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Handle the full lifecycle for an individual player WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (sender, receiver) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(write_frames(sender, outbound_rx));

    let id = new_connection_id();
    serve_connection(&state, &id, receiver, outbound_tx, writer_task).await;
}

async fn write_frames<S>(mut sender: S, mut outbound_rx: mpsc::UnboundedReceiver<Message>)
where
    S: Sink<Message> + Unpin,
{
    while let Some(message) = outbound_rx.recv().await {
        if sender.send(message).await.is_err() {
            break;
        }
    }
}

/// Drive one connection from registration to teardown.
///
/// The socket is attached to the hub before the session actor hears about it, so
/// the welcome message always has somewhere to go. The read loop also ends when
/// the writer task stops, so a peer that can no longer be written to is detached
/// even if its read half stays open. Exactly one disconnect is reported.
async fn serve_connection<R>(
    state: &SharedState,
    id: &str,
    mut frames: R,
    outbound_tx: mpsc::UnboundedSender<Message>,
    mut writer_task: JoinHandle<()>,
) where
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    state.connections().register(id.to_string(), outbound_tx.clone());
    info!(id = %id, "socket opened");

    if let Err(err) = state.session().connect(id) {
        warn!(id = %id, error = %err, "session unavailable; closing socket");
        state.connections().unregister(id);
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    }

    let mut writer_stopped = false;
    loop {
        tokio::select! {
            frame = frames.next() => {
                let Some(frame) = frame else { break };
                if process_frame(state.session(), id, &outbound_tx, frame).is_break() {
                    break;
                }
            }
            _ = &mut writer_task => {
                warn!(id = %id, "writer stopped; dropping connection");
                writer_stopped = true;
                break;
            }
        }
    }

    state.connections().unregister(id);
    if let Err(err) = state.session().disconnect(id) {
        warn!(id = %id, error = %err, "could not report disconnect");
    }
    info!(id = %id, "socket closed");

    if !writer_stopped {
        finalize(writer_task, outbound_tx).await;
    }
}

/// Handle one inbound frame; `Break` ends the connection.
fn process_frame(
    session: &SessionHandle,
    id: &str,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    frame: Result<Message, axum::Error>,
) -> ControlFlow<()> {
    match frame {
        Ok(Message::Text(text)) => {
            debug!(id = %id, payload = %text, "received player message");

            match InboundMessage::from_json_str(&text) {
                Ok(inbound) => {
                    if let Err(err) = session.inbound(id, inbound) {
                        warn!(id = %id, error = %err, "session unavailable; dropping connection");
                        return ControlFlow::Break(());
                    }
                }
                Err(err) => {
                    warn!(id = %id, error = %err, "failed to parse player message");
                }
            }
        }
        Ok(Message::Ping(payload)) => {
            let _ = outbound_tx.send(Message::Pong(payload));
        }
        Ok(Message::Close(frame)) => {
            info!(id = %id, "player closed socket");
            let _ = outbound_tx.send(Message::Close(frame));
            return ControlFlow::Break(());
        }
        Ok(Message::Binary(_)) => {
            warn!(id = %id, "ignoring binary frame");
        }
        Ok(Message::Pong(_)) => {}
        Err(err) => {
            warn!(id = %id, error = %err, "websocket error");
            return ControlFlow::Break(());
        }
    }
    ControlFlow::Continue(())
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
