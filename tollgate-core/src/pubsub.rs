//! In-process publish/subscribe broker.
//!
//! A [`Broker`] fans each published [`Event`] out to every live
//! [`Subscription`]. Publishing never blocks: a subscriber whose buffer is
//! full misses the event. A subscription ends when its cancellation token
//! fires, when it is dropped, or when the broker shuts down.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures::Stream;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

/// Default per-subscriber buffer size
pub const DEFAULT_BUFFER_SIZE: usize = 64;

/// What happened to the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

/// A published event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<T> {
    pub kind: EventKind,
    pub payload: T,
}

struct Subscriber<T> {
    tx: mpsc::Sender<Event<T>>,
    token: CancellationToken,
}

impl<T> Subscriber<T> {
    fn is_gone(&self) -> bool {
        self.token.is_cancelled() || self.tx.is_closed()
    }
}

/// Fan-out broker for events of type `T`.
pub struct Broker<T> {
    subscribers: RwLock<HashMap<u64, Subscriber<T>>>,
    next_id: AtomicU64,
    buffer_size: usize,
    shut_down: AtomicBool,
}

impl<T: Clone + Send + 'static> Broker<T> {
    /// Create a broker with the default buffer size.
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    /// Create a broker whose subscribers buffer up to `buffer_size` events.
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            buffer_size: buffer_size.max(1),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Subscribe until `token` is cancelled.
    ///
    /// Subscribing after [`Broker::shutdown`] returns a subscription that
    /// yields nothing.
    pub fn subscribe(&self, token: &CancellationToken) -> Subscription<T> {
        let (tx, rx) = mpsc::channel(self.buffer_size);
        let token = token.clone();

        if !self.shut_down.load(Ordering::Acquire) {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            self.subscribers.write().insert(
                id,
                Subscriber {
                    tx,
                    token: token.clone(),
                },
            );
        }

        Subscription { rx, token }
    }

    /// Deliver an event to every live subscriber without waiting.
    pub fn publish(&self, kind: EventKind, payload: T) {
        if self.shut_down.load(Ordering::Acquire) {
            return;
        }

        let mut stale = Vec::new();
        {
            let subscribers = self.subscribers.read();
            for (id, sub) in subscribers.iter() {
                if sub.is_gone() {
                    stale.push(*id);
                    continue;
                }
                match sub.tx.try_send(Event {
                    kind,
                    payload: payload.clone(),
                }) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        log::warn!("subscriber {} is full, dropping event", id);
                    }
                    Err(TrySendError::Closed(_)) => stale.push(*id),
                }
            }
        }

        if !stale.is_empty() {
            let mut subscribers = self.subscribers.write();
            for id in stale {
                subscribers.remove(&id);
            }
        }
    }

    /// Number of subscribers that have not been pruned yet.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .values()
            .filter(|sub| !sub.is_gone())
            .count()
    }

    /// Close every subscription and ignore further publishes.
    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);
        self.subscribers.write().clear();
    }
}

impl<T: Clone + Send + 'static> Default for Broker<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end of a broker subscription.
pub struct Subscription<T> {
    rx: mpsc::Receiver<Event<T>>,
    token: CancellationToken,
}

impl<T: Send + 'static> Subscription<T> {
    /// Wait for the next event.
    ///
    /// Returns `None` once the subscription's token is cancelled or the
    /// broker has dropped it.
    pub async fn recv(&mut self) -> Option<Event<T>> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            event = self.rx.recv() => event,
        }
    }

    /// Convert into a [`Stream`] of events.
    pub fn into_stream(mut self) -> impl Stream<Item = Event<T>> + Send {
        async_stream::stream! {
            while let Some(event) = self.recv().await {
                yield event;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::time::Duration;

    #[tokio::test]
    async fn test_publish_fans_out_to_all_subscribers() {
        let broker = Broker::new();
        let token = CancellationToken::new();
        let mut a = broker.subscribe(&token);
        let mut b = broker.subscribe(&token);

        broker.publish(EventKind::Created, "hello".to_string());

        for sub in [&mut a, &mut b] {
            let event = sub.recv().await.unwrap();
            assert_eq!(event.kind, EventKind::Created);
            assert_eq!(event.payload, "hello");
        }
    }

    #[tokio::test]
    async fn test_cancelled_subscription_ends_and_is_pruned() {
        let broker: Broker<u32> = Broker::new();
        let token = CancellationToken::new();
        let mut sub = broker.subscribe(&token);
        assert_eq!(broker.subscriber_count(), 1);

        token.cancel();
        assert!(sub.recv().await.is_none());
        assert_eq!(broker.subscriber_count(), 0);

        broker.publish(EventKind::Created, 1);
        assert!(broker.subscribers.read().is_empty());
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_pruned() {
        let broker: Broker<u32> = Broker::new();
        let token = CancellationToken::new();
        let sub = broker.subscribe(&token);
        drop(sub);

        broker.publish(EventKind::Created, 1);
        assert!(broker.subscribers.read().is_empty());
    }

    #[tokio::test]
    async fn test_full_subscriber_misses_events_without_blocking() {
        let broker: Broker<u32> = Broker::with_buffer_size(2);
        let token = CancellationToken::new();
        let mut sub = broker.subscribe(&token);

        for i in 0..5 {
            broker.publish(EventKind::Created, i);
        }

        assert_eq!(sub.recv().await.unwrap().payload, 0);
        assert_eq!(sub.recv().await.unwrap().payload, 1);
        let next = tokio::time::timeout(Duration::from_millis(50), sub.recv()).await;
        assert!(next.is_err(), "events beyond the buffer should be dropped");
    }

    #[tokio::test]
    async fn test_shutdown_closes_subscriptions() {
        let broker: Broker<u32> = Broker::new();
        let token = CancellationToken::new();
        let mut sub = broker.subscribe(&token);

        broker.shutdown();
        broker.publish(EventKind::Created, 1);

        assert!(sub.recv().await.is_none());
        assert!(broker.subscribe(&token).recv().await.is_none());
    }

    #[tokio::test]
    async fn test_into_stream() {
        let broker: Broker<u32> = Broker::new();
        let token = CancellationToken::new();
        let stream = broker.subscribe(&token).into_stream();

        broker.publish(EventKind::Created, 7);
        broker.publish(EventKind::Deleted, 8);

        let events: Vec<_> = stream.take(2).collect().await;
        assert_eq!(
            events,
            vec![
                Event {
                    kind: EventKind::Created,
                    payload: 7
                },
                Event {
                    kind: EventKind::Deleted,
                    payload: 8
                },
            ]
        );
    }
}
