use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::events::wire::format_event;

/// A connected observer's end of the stream: framed SSE text, one event per item.
pub struct Subscription {
    pub id: u64,
    pub receiver: mpsc::UnboundedReceiver<String>,
}

impl Subscription {
    pub fn into_stream(self) -> UnboundedReceiverStream<String> {
        UnboundedReceiverStream::new(self.receiver)
    }
}

/// Fans serialized events out to every connected observer.
///
/// Delivery is best-effort: a connection whose write fails is dropped and
/// nobody else is affected. There is no buffering beyond each connection's
/// channel and no backpressure towards producers.
#[derive(Default)]
pub struct NotificationHub {
    connections: Mutex<HashMap<u64, mpsc::UnboundedSender<String>>>,
    next_id: AtomicU64,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (sender, receiver) = mpsc::unbounded_channel();
        self.connections.lock().insert(id, sender);
        tracing::info!(connection = id, "Observer connected");
        Subscription { id, receiver }
    }

    /// Remove a connection. Returns false if it was already gone.
    pub fn disconnect(&self, id: u64) -> bool {
        let removed = self.connections.lock().remove(&id).is_some();
        if removed {
            tracing::info!(connection = id, "Observer disconnected");
        }
        removed
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Serialize `data` once and write it to every connection.
    ///
    /// Returns the number of connections that accepted the event.
    pub fn notify<T: Serialize + ?Sized>(&self, event: &str, data: &T) -> usize {
        let mut connections = self.connections.lock();
        if connections.is_empty() {
            return 0;
        }

        let payload = match serde_json::to_string(data) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(event, "Failed to serialize notification payload: {}", e);
                return 0;
            }
        };
        let frame = format_event(event, &payload);

        let mut delivered = 0;
        connections.retain(|id, sender| match sender.send(frame.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(_) => {
                tracing::debug!(connection = *id, "Dropping observer after failed write");
                false
            }
        });
        tracing::debug!(event, delivered, "Notification sent");
        delivered
    }

    /// Close every connection. Observers see their stream end.
    pub fn shutdown(&self) {
        let closed = {
            let mut connections = self.connections.lock();
            let count = connections.len();
            connections.clear();
            count
        };
        tracing::info!(closed, "Notification hub shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_notify_without_observers_is_noop() {
        let hub = NotificationHub::new();
        assert_eq!(hub.notify("job_update", &json!({"a": 1})), 0);
        assert_eq!(hub.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_fan_out_to_all_observers() {
        let hub = NotificationHub::new();
        let mut first = hub.connect();
        let mut second = hub.connect();
        assert_ne!(first.id, second.id);

        assert_eq!(hub.notify("ping", &json!({"n": 1})), 2);

        let expected = "event: ping\ndata: {\"n\":1}\n\n";
        assert_eq!(first.receiver.recv().await.unwrap(), expected);
        assert_eq!(second.receiver.recv().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_failed_write_drops_only_that_connection() {
        let hub = NotificationHub::new();
        let gone = hub.connect();
        let mut alive = hub.connect();
        drop(gone);

        assert_eq!(hub.notify("ping", &json!(null)), 1);
        assert_eq!(hub.connection_count(), 1);
        assert_eq!(
            alive.receiver.recv().await.unwrap(),
            "event: ping\ndata: null\n\n"
        );
    }

    #[tokio::test]
    async fn test_disconnect_and_shutdown() {
        let hub = NotificationHub::new();
        let first = hub.connect();
        let mut second = hub.connect();

        assert!(hub.disconnect(first.id));
        assert!(!hub.disconnect(first.id));
        assert_eq!(hub.connection_count(), 1);

        hub.shutdown();
        assert_eq!(hub.connection_count(), 0);
        assert!(second.receiver.recv().await.is_none());
    }
}
