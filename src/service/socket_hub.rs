// service/socket_hub.rs
//
// Per-user fan-out for websocket sessions. A user may hold several sockets;
// each subscribes to the user's broadcast channel.
use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use serde::Serialize;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Serialize)]
pub struct SocketEvent {
    pub event: String,
    pub data: serde_json::Value,
}

#[derive(Clone, Default)]
pub struct SocketHub {
    channels: Arc<RwLock<HashMap<i64, broadcast::Sender<SocketEvent>>>>,
}

impl SocketHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, user_id: i64) -> broadcast::Receiver<SocketEvent> {
        let mut channels = self.channels.write().unwrap_or_else(|e| e.into_inner());
        channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Returns how many live sockets received the event.
    pub fn emit(&self, user_id: i64, event: &str, data: serde_json::Value) -> usize {
        let channels = self.channels.read().unwrap_or_else(|e| e.into_inner());
        let Some(sender) = channels.get(&user_id) else {
            return 0;
        };

        sender
            .send(SocketEvent {
                event: event.to_string(),
                data,
            })
            .unwrap_or(0)
    }

    /// Drops the channel once its last socket has gone.
    pub fn release(&self, user_id: i64) {
        let mut channels = self.channels.write().unwrap_or_else(|e| e.into_inner());
        if channels
            .get(&user_id)
            .map(|sender| sender.receiver_count() == 0)
            .unwrap_or(false)
        {
            channels.remove(&user_id);
        }
    }

    pub fn online_users(&self) -> usize {
        self.channels.read().map(|c| c.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn events_reach_every_socket_of_the_user() {
        let hub = SocketHub::new();
        let mut phone = hub.subscribe(5);
        let mut tablet = hub.subscribe(5);

        assert_eq!(hub.emit(5, "shipment_accepted", json!({ "shipmentId": 7 })), 2);

        assert_eq!(phone.recv().await.unwrap().event, "shipment_accepted");
        assert_eq!(tablet.recv().await.unwrap().data["shipmentId"], 7);
    }

    #[test]
    fn offline_users_are_skipped() {
        let hub = SocketHub::new();
        assert_eq!(hub.emit(9, "anything", json!({})), 0);
    }

    #[test]
    fn release_drops_idle_channels() {
        let hub = SocketHub::new();
        let rx = hub.subscribe(3);
        hub.release(3);
        assert_eq!(hub.online_users(), 1);

        drop(rx);
        hub.release(3);
        assert_eq!(hub.online_users(), 0);
    }
}
