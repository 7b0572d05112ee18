//! Registry of live WebSocket subscribers.
//!
//! # Why a channel per subscriber?
//!
//! The broadcaster has to reach every connection from the monitor thread, and
//! it must never hold the registry lock across network I/O.  Each connection
//! task therefore owns its socket and exposes only the sending half of an
//! unbounded channel.  Sending into that channel is synchronous and never
//! blocks, so a broadcast walks the map under the lock, queues one frame per
//! subscriber, and is done.
//!
//! When a connection task exits its receiver is dropped; the next send to that
//! subscriber fails and the broadcaster removes it.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::infrastructure::broadcaster::BroadcastError;

/// A frame queued for one subscriber's connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// A JSON text frame.
    Text(String),
    /// A WebSocket ping with the given payload.
    Ping(Vec<u8>),
}

/// One connected subscriber, as seen by the broadcaster.
pub trait Subscriber: Send {
    /// Queues `frame` for delivery.
    ///
    /// # Errors
    ///
    /// Returns [`BroadcastError::Disconnected`] once the connection is gone.
    fn send(&self, frame: OutboundFrame) -> Result<(), BroadcastError>;
}

/// A subscriber backed by the sending half of a connection task's channel.
#[derive(Debug, Clone)]
pub struct ChannelSubscriber {
    id: Uuid,
    tx: mpsc::UnboundedSender<OutboundFrame>,
}

impl ChannelSubscriber {
    pub fn new(id: Uuid, tx: mpsc::UnboundedSender<OutboundFrame>) -> Self {
        Self { id, tx }
    }
}

impl Subscriber for ChannelSubscriber {
    fn send(&self, frame: OutboundFrame) -> Result<(), BroadcastError> {
        self.tx
            .send(frame)
            .map_err(|_| BroadcastError::Disconnected(self.id))
    }
}

/// Map from connection id to subscriber, guarded by one mutual-exclusion lock.
///
/// Every operation takes the lock for the duration of the map access only.
#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: Mutex<HashMap<Uuid, Box<dyn Subscriber>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `subscriber` under `id`, replacing any previous entry.
    pub fn add(&self, id: Uuid, subscriber: Box<dyn Subscriber>) {
        self.lock().insert(id, subscriber);
    }

    /// Removes the subscriber registered under `id`.
    ///
    /// Returns `false` if it was already gone.
    pub fn remove(&self, id: &Uuid) -> bool {
        self.lock().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Calls `f` for every registered subscriber while holding the lock.
    ///
    /// `f` must not call back into the registry.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&Uuid, &dyn Subscriber),
    {
        for (id, subscriber) in self.lock().iter() {
            f(id, subscriber.as_ref());
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Box<dyn Subscriber>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn channel_subscriber() -> (Uuid, ChannelSubscriber, mpsc::UnboundedReceiver<OutboundFrame>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        (id, ChannelSubscriber::new(id, tx), rx)
    }

    #[test]
    fn test_channel_subscriber_queues_frames_in_order() {
        // Arrange
        let (_, subscriber, mut rx) = channel_subscriber();

        // Act
        subscriber.send(OutboundFrame::Text("a".into())).unwrap();
        subscriber.send(OutboundFrame::Ping(b"p".to_vec())).unwrap();

        // Assert
        assert_eq!(rx.try_recv().unwrap(), OutboundFrame::Text("a".into()));
        assert_eq!(rx.try_recv().unwrap(), OutboundFrame::Ping(b"p".to_vec()));
    }

    #[test]
    fn test_channel_subscriber_fails_after_receiver_dropped() {
        let (id, subscriber, rx) = channel_subscriber();
        drop(rx);

        let result = subscriber.send(OutboundFrame::Text("x".into()));

        assert!(matches!(result, Err(BroadcastError::Disconnected(got)) if got == id));
    }

    #[test]
    fn test_add_and_remove() {
        // Arrange
        let registry = SubscriberRegistry::new();
        let (id, subscriber, _rx) = channel_subscriber();

        // Act
        registry.add(id, Box::new(subscriber));

        // Assert
        assert_eq!(registry.len(), 1);
        assert!(registry.remove(&id));
        assert!(!registry.remove(&id), "second remove finds nothing");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_for_each_visits_every_subscriber() {
        let registry = SubscriberRegistry::new();
        let mut receivers = Vec::new();
        for _ in 0..3 {
            let (id, subscriber, rx) = channel_subscriber();
            registry.add(id, Box::new(subscriber));
            receivers.push(rx);
        }

        let mut visited = 0;
        registry.for_each(|_, subscriber| {
            subscriber.send(OutboundFrame::Text("hi".into())).unwrap();
            visited += 1;
        });

        assert_eq!(visited, 3);
        for rx in &mut receivers {
            assert_eq!(rx.try_recv().unwrap(), OutboundFrame::Text("hi".into()));
        }
    }
}
