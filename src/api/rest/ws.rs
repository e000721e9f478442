use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

use crate::state::AppState;

pub async fn ws_locations(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let rx = state.locations.subscribe();
    ws.on_upgrade(move |socket| forward_events(socket, rx, "locations"))
}

pub async fn ws_assignments(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let rx = state.assignment_events_tx.subscribe();
    ws.on_upgrade(move |socket| forward_events(socket, rx, "assignments"))
}

async fn forward_events<T>(socket: WebSocket, rx: broadcast::Receiver<T>, topic: &'static str)
where
    T: Serialize + Clone + Send + 'static,
{
    let (mut sender, mut receiver) = socket.split();

    info!(topic, "websocket client connected");

    let send_task = tokio::spawn(async move {
        let mut events = BroadcastStream::new(rx);

        while let Some(result) = events.next().await {
            // Lagged receivers skip what they missed; live views only care about the latest.
            let Ok(event) = result else {
                continue;
            };

            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(topic, error = %err, "failed to serialize event for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!(topic, "websocket client disconnected");
}
