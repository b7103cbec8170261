//! WebSocket endpoint for live-update notifications
//!
//! A connected client is registered with the [`Notifier`] and receives the
//! text `"update"` on every broadcast. Anything the client sends is read
//! and discarded. The client is unregistered as soon as either direction
//! closes.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tracing::{debug, info};

use crate::notifier::{Notifier, Subscription};
use crate::AppState;

/// GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.notifier))
}

async fn handle_socket(socket: WebSocket, notifier: Arc<Notifier>) {
    let Subscription { id, mut receiver } = notifier.subscribe().await;
    info!("WebSocket client {} connected", id);

    let (mut sink, mut stream) = socket.split();

    // Outbound: forward queued notifications until the queue closes
    let mut send_task = tokio::spawn(async move {
        while let Some(message) = receiver.recv().await {
            if let Err(e) = sink.send(Message::Text(message)).await {
                debug!("WebSocket send failed: {}", e);
                return;
            }
        }
        let _ = sink.close().await;
    });

    // Inbound: keepalive traffic is ignored
    let mut recv_task = tokio::spawn(async move {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!("WebSocket receive failed: {}", e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    notifier.unsubscribe(id).await;
    info!("WebSocket client {} disconnected", id);
}
