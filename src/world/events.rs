//! Internal event bus
//!
//! World-library callbacks are normalized into a broadcast channel so the
//! health monitor and perception never see the callback shape directly.
//! Notifications are the outbound fire-and-forget presentation stream.

use glam::IVec3;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

use crate::core::types::EntityId;

/// Events emitted by the world link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorldEvent {
    HealthChanged { previous: f32, current: f32 },
    ItemPickup { item: String, count: u32 },
    EntitySpawned { id: EntityId, name: String },
    BlockChanged { position: IVec3, name: String },
    Death,
    Disconnected,
}

/// Fire-and-forget notifications for the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    ItemCollected { item: String, count: u32 },
    BlockPlaced { name: String, position: IVec3 },
    Death,
}

/// Sender half of the notification stream
///
/// Emitting never blocks and never fails the emitter; a closed receiver
/// simply drops the notification.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Create a notifier whose output is discarded
    pub fn sink() -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self { tx }
    }

    pub fn emit(&self, notification: Notification) {
        let _ = self.tx.send(notification);
    }
}

/// Standard capacity for the world event bus
pub const EVENT_BUS_CAPACITY: usize = 256;

pub fn event_bus() -> broadcast::Sender<WorldEvent> {
    broadcast::channel(EVENT_BUS_CAPACITY).0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_notifier_survives_dropped_receiver() {
        let (notifier, rx) = Notifier::channel();
        drop(rx);
        // Must not panic or error
        notifier.emit(Notification::Death);
    }

    #[tokio::test]
    async fn test_event_bus_fanout() {
        let bus = event_bus();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        bus.send(WorldEvent::Death).unwrap();
        assert_eq!(a.recv().await.unwrap(), WorldEvent::Death);
        assert_eq!(b.recv().await.unwrap(), WorldEvent::Death);
    }
}
