use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::realtime::{RealtimeHub, RealtimeMessage, Room};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationQuery {
    user_id: Uuid,
}

/// `GET /ws/campaigns/:id`
pub async fn campaign_ws(
    ws: WebSocketUpgrade,
    Path(campaign_id): Path<Uuid>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let room = Room::Campaign(campaign_id);
    let rx = state.realtime.subscribe(room).await;
    ws.on_upgrade(move |socket| handle_socket(socket, state.realtime, room, rx))
}

/// `GET /ws/notifications?userId=..`
pub async fn notifications_ws(
    ws: WebSocketUpgrade,
    Query(query): Query<NotificationQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let room = Room::User(query.user_id);
    let rx = state.realtime.subscribe(room).await;
    ws.on_upgrade(move |socket| handle_socket(socket, state.realtime, room, rx))
}

async fn handle_socket(
    socket: WebSocket,
    hub: RealtimeHub,
    room: Room,
    mut rx: broadcast::Receiver<RealtimeMessage>,
) {
    let (mut sender, mut receiver) = socket.split();
    tracing::debug!(room = %room, "WebSocket subscribed");

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat_interval = tokio::time::interval(tokio::time::Duration::from_secs(30));

        loop {
            tokio::select! {
                _ = heartbeat_interval.tick() => {
                    if sender.send(Message::Ping(vec![])).await.is_err() {
                        break;
                    }
                }
                result = rx.recv() => {
                    match result {
                        Ok(message) => {
                            let json = match serde_json::to_string(&message) {
                                Ok(j) => j,
                                Err(e) => {
                                    tracing::error!(room = %room, "Failed to serialize realtime message: {}", e);
                                    continue;
                                }
                            };
                            if sender.send(Message::Text(json)).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(room = %room, skipped = n, "Subscriber lagged behind");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => {
            send_task.abort();
            // the receiver lives in send_task; wait until it is dropped
            let _ = send_task.await;
        }
    }

    hub.release(room).await;
    tracing::debug!(room = %room, "WebSocket closed");
}
