use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::{RoomId, StatusChange};

const CHANNEL_CAPACITY: usize = 64;

/// Broadcast hub for per-room status changes.
pub struct NotifyHub {
    channels: DashMap<RoomId, broadcast::Sender<StatusChange>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to status changes of one room. Creates the channel if needed.
    pub fn subscribe(&self, room: &str) -> broadcast::Receiver<StatusChange> {
        let sender = self
            .channels
            .entry(room.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a change. No-op if nobody is listening.
    pub fn send(&self, change: &StatusChange) {
        if let Some(sender) = self.channels.get(&change.room) {
            let _ = sender.send(change.clone());
        }
    }

    /// Drop a room's channel (e.g. when a reload no longer lists it).
    pub fn remove(&self, room: &str) {
        self.channels.remove(room);
    }

    pub fn subscribed_rooms(&self) -> usize {
        self.channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RoomStatus;

    fn change(room: &str) -> StatusChange {
        StatusChange {
            room: room.into(),
            from: Some(RoomStatus::Free),
            to: RoomStatus::Occupied,
        }
    }

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = NotifyHub::new();
        let mut rx = hub.subscribe("101");

        hub.send(&change("101"));

        let received = rx.recv().await.unwrap();
        assert_eq!(received, change("101"));
    }

    #[tokio::test]
    async fn other_rooms_are_not_delivered() {
        let hub = NotifyHub::new();
        let mut rx = hub.subscribe("101");
        hub.send(&change("102"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        // No subscriber: must not panic
        hub.send(&change("101"));
        assert_eq!(hub.subscribed_rooms(), 0);
    }

    #[tokio::test]
    async fn remove_closes_channel() {
        let hub = NotifyHub::new();
        let mut rx = hub.subscribe("101");
        hub.remove("101");
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }
}
