//! WebSocket connection actor
//!
//! Each upgraded socket is split into a writer task, fed by an unbounded
//! channel that the registry holds as the client's sink, and a reader loop
//! that hands every data frame to the session handler.

use crate::protocol::OutboundMessage;
use crate::session::SessionHandler;
use crate::transport::server::ServerState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Upgrade handler mounted on the configured WebSocket path
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<ServerState>,
) -> impl IntoResponse {
    let handler = state.handler.clone();
    ws.on_upgrade(move |socket| run_connection(socket, handler))
}

/// Drive one client connection until either side closes it
pub async fn run_connection(socket: WebSocket, handler: SessionHandler) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<OutboundMessage>();

    let mut session = match handler.connect(Arc::new(tx)) {
        Ok(session) => session,
        Err(e) => {
            warn!("Rejecting connection, session setup failed: {}", e);
            return;
        }
    };

    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    loop {
        let frame = match ws_receiver.next().await {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                warn!(
                    client_id = %session.client_id(),
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
            None => {
                debug!(client_id = %session.client_id(), "WebSocket stream ended");
                break;
            }
        };

        let result = match frame {
            Message::Text(text) => handler.handle_message(&mut session, text.as_str().as_bytes()),
            Message::Binary(data) => handler.handle_message(&mut session, &data),
            Message::Ping(_) | Message::Pong(_) => Ok(()),
            Message::Close(frame) => {
                debug!(
                    client_id = %session.client_id(),
                    reason = ?frame,
                    "Client initiated close"
                );
                break;
            }
        };

        if let Err(e) = result {
            warn!(
                client_id = %session.client_id(),
                error = %e,
                "Message handling failed"
            );
        }
    }

    writer_handle.abort();

    let client_id = session.client_id().to_string();
    if let Err(e) = handler.disconnect(session) {
        warn!(client_id = %client_id, error = %e, "Disconnect cleanup failed");
    }

    info!(client_id = %client_id, "WebSocket actor stopped");
}

/// Serialize queued messages onto the socket in order
async fn writer_task(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<OutboundMessage>,
) {
    while let Some(message) = rx.recv().await {
        let json = match message.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!("Dropping unserializable '{}' message: {}", message.message_type(), e);
                continue;
            }
        };

        if sink.send(Message::Text(json.into())).await.is_err() {
            // Socket is gone; the reader loop will observe the close
            break;
        }
    }

    let _ = sink.close().await;
}
