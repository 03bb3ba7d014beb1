//! Room-scoped broadcast hub for WebSocket subscribers.
//!
//! Owned by [`crate::AppState`]; rooms are created on first use and pruned
//! once nobody is listening.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

const ROOM_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Room {
    Campaign(Uuid),
    User(Uuid),
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::Campaign(id) => write!(f, "donate-campaign-{}", id),
            Room::User(id) => write!(f, "user-{}", id),
        }
    }
}

/// Frame pushed to subscribers: `{"event": .., "data": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeMessage {
    pub event: String,
    pub data: serde_json::Value,
}

impl RealtimeMessage {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

#[derive(Clone, Default)]
pub struct RealtimeHub {
    rooms: Arc<RwLock<HashMap<Room, broadcast::Sender<RealtimeMessage>>>>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, room: Room) -> broadcast::Receiver<RealtimeMessage> {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(room)
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0)
            .subscribe()
    }

    /// Returns how many subscribers received the message. Publishing to an
    /// empty room is not an error.
    pub async fn publish(&self, room: Room, message: RealtimeMessage) -> usize {
        let sender = {
            let rooms = self.rooms.read().await;
            rooms.get(&room).cloned()
        };
        let Some(sender) = sender else {
            tracing::debug!(room = %room, event = %message.event, "No subscribers for room");
            return 0;
        };

        match sender.send(message) {
            Ok(delivered) => delivered,
            Err(_) => {
                self.prune().await;
                0
            }
        }
    }

    /// Called when a subscriber leaves; removes the room if it was the last
    /// receiver. The caller must have dropped its receiver first.
    pub async fn release(&self, room: Room) {
        let mut rooms = self.rooms.write().await;
        if rooms.get(&room).is_some_and(|sender| sender.receiver_count() == 0) {
            rooms.remove(&room);
            tracing::debug!(room = %room, "Room released");
        }
    }

    /// Drops rooms whose receivers have all gone away.
    pub async fn prune(&self) {
        let mut rooms = self.rooms.write().await;
        rooms.retain(|_, sender| sender.receiver_count() > 0);
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}
