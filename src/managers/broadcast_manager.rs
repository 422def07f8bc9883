// BroadcastChannelManager: Centralized tokio broadcast channel management
// Single Responsibility: Event channel lifecycle and subscription

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio_stream::wrappers::BroadcastStream;

use crate::types::{CalibrationEvent, GestureEvent};

/// Buffered gesture events per subscriber before it starts lagging
pub const GESTURE_CHANNEL_CAPACITY: usize = 64;

/// Buffered calibration events per subscriber before it starts lagging
pub const CALIBRATION_CHANNEL_CAPACITY: usize = 32;

/// Handle to one subscriber of an event channel
///
/// Dropping the handle (or calling [`Subscription::unsubscribe`]) removes the
/// subscriber; the channel keeps working for everyone else.
#[derive(Debug)]
pub struct Subscription<T> {
    id: u64,
    channel: &'static str,
    receiver: broadcast::Receiver<T>,
}

impl<T: Clone + Send + 'static> Subscription<T> {
    /// Unique id within the owning manager
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next buffered event without waiting
    ///
    /// Events lost to lag are skipped with a warning.
    pub fn try_recv(&mut self) -> Option<T> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    log::warn!(
                        "[Broadcast] {} subscriber {} lagged, skipped {} events",
                        self.channel,
                        self.id,
                        skipped
                    );
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Wait for the next event; `None` once the channel is closed
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!(
                        "[Broadcast] {} subscriber {} lagged, skipped {} events",
                        self.channel,
                        self.id,
                        skipped
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Drain every buffered event
    pub fn drain(&mut self) -> Vec<T> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Convert into a stream of events, skipping lag gaps
    pub fn into_stream(self) -> impl Stream<Item = T> + Send + Unpin {
        BroadcastStream::new(self.receiver)
            .filter_map(|result| async move { result.ok() })
            .boxed()
    }

    /// Stop receiving events
    pub fn unsubscribe(self) {
        log::debug!(
            "[Broadcast] {} subscriber {} unsubscribed",
            self.channel,
            self.id
        );
    }
}

/// Owns the gesture and calibration event channels
///
/// Sending with no subscribers is not an error: the event is dropped.
#[derive(Debug, Clone)]
pub struct BroadcastChannelManager {
    gesture: broadcast::Sender<GestureEvent>,
    calibration: broadcast::Sender<CalibrationEvent>,
    next_id: Arc<AtomicU64>,
}

impl BroadcastChannelManager {
    pub fn new() -> Self {
        let (gesture, _) = broadcast::channel(GESTURE_CHANNEL_CAPACITY);
        let (calibration, _) = broadcast::channel(CALIBRATION_CHANNEL_CAPACITY);
        Self {
            gesture,
            calibration,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    // ========================================================================
    // GESTURE CHANNEL
    // ========================================================================

    pub fn subscribe_gestures(&self) -> Subscription<GestureEvent> {
        Subscription {
            id: self.next_id(),
            channel: "gesture",
            receiver: self.gesture.subscribe(),
        }
    }

    /// Publish a gesture event; returns the number of subscribers reached
    pub fn publish_gesture(&self, event: GestureEvent) -> usize {
        self.gesture.send(event).unwrap_or(0)
    }

    pub fn gesture_subscribers(&self) -> usize {
        self.gesture.receiver_count()
    }

    // ========================================================================
    // CALIBRATION CHANNEL
    // ========================================================================

    pub fn subscribe_calibration(&self) -> Subscription<CalibrationEvent> {
        Subscription {
            id: self.next_id(),
            channel: "calibration",
            receiver: self.calibration.subscribe(),
        }
    }

    /// Publish a calibration-complete event; returns the number of subscribers reached
    pub fn publish_calibration(&self, event: CalibrationEvent) -> usize {
        self.calibration.send(event).unwrap_or(0)
    }

    pub fn calibration_subscribers(&self) -> usize {
        self.calibration.receiver_count()
    }
}

impl Default for BroadcastChannelManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Position, Vector3};

    #[test]
    fn test_publish_without_subscribers() {
        let manager = BroadcastChannelManager::new();
        assert_eq!(
            manager.publish_gesture(GestureEvent::new(Position::Derecha, 0)),
            0
        );
    }

    #[test]
    fn test_gesture_multiple_subscribers() {
        let manager = BroadcastChannelManager::new();
        let mut rx1 = manager.subscribe_gestures();
        let mut rx2 = manager.subscribe_gestures();
        assert_ne!(rx1.id(), rx2.id());

        let event = GestureEvent::new(Position::Arriba, 120);
        assert_eq!(manager.publish_gesture(event), 2);

        assert_eq!(rx1.try_recv(), Some(event));
        assert_eq!(rx2.try_recv(), Some(event));
        assert_eq!(rx1.try_recv(), None);
    }

    #[test]
    fn test_unsubscribe_removes_receiver() {
        let manager = BroadcastChannelManager::new();
        let rx1 = manager.subscribe_calibration();
        let mut rx2 = manager.subscribe_calibration();
        assert_eq!(manager.calibration_subscribers(), 2);

        rx1.unsubscribe();
        assert_eq!(manager.calibration_subscribers(), 1);

        let event = CalibrationEvent {
            label: Position::Ambiente,
            reference: Vector3::new(1.0, 2.0, 3.0),
            timestamp_ms: 5,
        };
        assert_eq!(manager.publish_calibration(event), 1);
        assert_eq!(rx2.try_recv(), Some(event));
    }

    #[test]
    fn test_lagged_subscriber_skips_gap() {
        let manager = BroadcastChannelManager::new();
        let mut rx = manager.subscribe_gestures();

        for i in 0..(GESTURE_CHANNEL_CAPACITY as u64 + 10) {
            manager.publish_gesture(GestureEvent::new(Position::Centro, i));
        }

        let received = rx.drain();
        assert_eq!(received.len(), GESTURE_CHANNEL_CAPACITY);
        assert_eq!(received[0].timestamp_ms, 10);
    }

    #[tokio::test]
    async fn test_async_recv_and_stream() {
        let manager = BroadcastChannelManager::new();
        let mut rx = manager.subscribe_gestures();
        let stream_rx = manager.subscribe_gestures();

        manager.publish_gesture(GestureEvent::new(Position::Izquierda, 1));
        manager.publish_gesture(GestureEvent::new(Position::Acercar, 2));

        assert_eq!(rx.recv().await.map(|e| e.label), Some(Position::Izquierda));

        let labels: Vec<Position> = stream_rx
            .into_stream()
            .take(2)
            .map(|e| e.label)
            .collect()
            .await;
        assert_eq!(labels, vec![Position::Izquierda, Position::Acercar]);
    }

    #[tokio::test]
    async fn test_recv_returns_none_when_closed() {
        let manager = BroadcastChannelManager::new();
        let mut rx = manager.subscribe_calibration();
        drop(manager);
        assert_eq!(rx.recv().await, None);
    }
}
