//! # Event Bus System
//!
//! Provides a synchronous, in-process publish/subscribe bus with typed topics.
//! This module decouples the marker registry, the sequence engine, the
//! persistence layer and the host UI from one another.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **[`BusEvent`]**: Trait implemented by a domain's event enum, mapping each
//!   event to a topic (one topic per payload shape)
//! - **[`EventBus`]**: Topic-indexed handler registry with inline delivery
//! - **[`SubscriptionId`]**: Handle returned by `subscribe`, used to unsubscribe
//!   precisely without comparing closures
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  publish   ┌──────────────┐  handler(&event)  ┌────────────┐
//! │ Player host  ├───────────>│              ├──────────────────>│ Engine     │
//! └──────────────┘            │   EventBus   │                   └────────────┘
//! ┌──────────────┐  publish   │  (topic →    │  handler(&event)  ┌────────────┐
//! │ Registry     ├───────────>│   handlers)  ├──────────────────>│ Auto-save  │
//! └──────────────┘            └──────────────┘                   └────────────┘
//! ```
//!
//! ## Delivery Semantics
//!
//! - `publish` runs every handler registered for the event's topic, in
//!   registration order, on the caller's thread, before returning.
//! - The handler list is snapshotted before delivery, so handlers may publish,
//!   subscribe or unsubscribe re-entrantly. A handler removed mid-delivery
//!   still sees the event currently being delivered.
//! - A handler that returns `Err` or panics is logged and skipped; remaining
//!   handlers still run and the publisher never sees the failure.
//! - There is no cycle detection. A handler that republishes to its own topic
//!   unconditionally recurses until the stack overflows.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{BusEvent, EventBus};
//!
//! #[derive(Debug, Clone)]
//! enum Ping {
//!     Tick(u32),
//! }
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
//! enum PingTopic {
//!     Tick,
//! }
//!
//! impl BusEvent for Ping {
//!     type Topic = PingTopic;
//!     fn topic(&self) -> PingTopic {
//!         PingTopic::Tick
//!     }
//! }
//!
//! let bus = EventBus::<Ping>::new();
//! let id = bus.subscribe(PingTopic::Tick, |event| {
//!     println!("got {:?}", event);
//!     Ok(())
//! });
//! assert_eq!(bus.publish(Ping::Tick(1)), 1);
//! assert!(bus.unsubscribe(id));
//! ```

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, warn};

/// An event type that can travel over an [`EventBus`].
pub trait BusEvent: Send + Sync + 'static {
    /// Topic enumeration; one variant per payload shape.
    type Topic: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    /// The topic this event is delivered under.
    fn topic(&self) -> Self::Topic;
}

/// Type alias for event handler closures.
type Handler<E> = Arc<dyn Fn(&E) -> anyhow::Result<()> + Send + Sync>;

/// Handle identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

struct Registration<E: BusEvent> {
    id: SubscriptionId,
    handler: Handler<E>,
}

impl<E: BusEvent> Clone for Registration<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            handler: Arc::clone(&self.handler),
        }
    }
}

/// Central event bus for publishing and subscribing to events.
///
/// Share it behind an `Arc`; all methods take `&self`.
pub struct EventBus<E: BusEvent> {
    handlers: RwLock<HashMap<E::Topic, Vec<Registration<E>>>>,
    next_id: AtomicU64,
}

impl<E: BusEvent> EventBus<E> {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers `handler` for `topic`.
    ///
    /// Handlers for the same topic run in the order they were registered.
    pub fn subscribe<F>(&self, topic: E::Topic, handler: F) -> SubscriptionId
    where
        F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .write()
            .entry(topic)
            .or_default()
            .push(Registration {
                id,
                handler: Arc::new(handler),
            });
        id
    }

    /// Removes a subscription.
    ///
    /// Returns `false` if the id was never issued by this bus or was already removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        for registrations in handlers.values_mut() {
            if let Some(pos) = registrations.iter().position(|r| r.id == id) {
                registrations.remove(pos);
                return true;
            }
        }
        false
    }

    /// Delivers `event` to every handler of its topic.
    ///
    /// Returns the number of handlers that completed successfully.
    pub fn publish(&self, event: E) -> usize {
        let topic = event.topic();
        let snapshot: Vec<Registration<E>> = match self.handlers.read().get(&topic) {
            Some(registrations) => registrations.clone(),
            None => return 0,
        };

        let mut delivered = 0;
        for registration in snapshot {
            match catch_unwind(AssertUnwindSafe(|| (registration.handler)(&event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(err)) => {
                    warn!(
                        topic = ?topic,
                        subscription = registration.id.0,
                        error = %err,
                        "Event handler failed"
                    );
                }
                Err(_) => {
                    error!(
                        topic = ?topic,
                        subscription = registration.id.0,
                        "Event handler panicked"
                    );
                }
            }
        }
        delivered
    }

    /// Number of handlers currently registered for `topic`.
    pub fn subscriber_count(&self, topic: E::Topic) -> usize {
        self.handlers.read().get(&topic).map_or(0, Vec::len)
    }

    /// Forwards every event of `topic` into an unbounded channel.
    ///
    /// Lets an async consumer (or a UI thread polling `try_recv`) receive
    /// events without running inside the publisher's thread. The subscription
    /// removes itself once the receiver is dropped.
    pub fn subscribe_channel(
        self: &Arc<Self>,
        topic: E::Topic,
    ) -> (SubscriptionId, mpsc::UnboundedReceiver<E>)
    where
        E: Clone,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let bus = Arc::downgrade(self);
        let slot: Arc<parking_lot::Mutex<Option<SubscriptionId>>> =
            Arc::new(parking_lot::Mutex::new(None));
        let own_id = Arc::clone(&slot);

        let id = self.subscribe(topic, move |event: &E| {
            if tx.send(event.clone()).is_err() {
                // Receiver gone: drop this subscription.
                if let (Some(bus), Some(id)) = (bus.upgrade(), *own_id.lock()) {
                    bus.unsubscribe(id);
                }
            }
            Ok(())
        });
        *slot.lock() = Some(id);
        (id, rx)
    }
}

impl<E: BusEvent> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: BusEvent> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.read();
        let total: usize = handlers.values().map(Vec::len).sum();
        f.debug_struct("EventBus")
            .field("topics", &handlers.len())
            .field("subscriber_count", &total)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum TestEvent {
        Number(i64),
        Text(String),
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum TestTopic {
        Number,
        Text,
    }

    impl BusEvent for TestEvent {
        type Topic = TestTopic;

        fn topic(&self) -> TestTopic {
            match self {
                TestEvent::Number(_) => TestTopic::Number,
                TestEvent::Text(_) => TestTopic::Text,
            }
        }
    }

    fn recorder() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::<TestEvent>::new();
        assert_eq!(bus.publish(TestEvent::Number(1)), 0);
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let bus = EventBus::<TestEvent>::new();
        let log = recorder();

        for name in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            bus.subscribe(TestTopic::Number, move |_| {
                log.lock().push(name.to_string());
                Ok(())
            });
        }

        assert_eq!(bus.publish(TestEvent::Number(7)), 3);
        assert_eq!(*log.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_topics_are_isolated() {
        let bus = EventBus::<TestEvent>::new();
        let log = recorder();
        let log_clone = Arc::clone(&log);
        bus.subscribe(TestTopic::Text, move |event| {
            log_clone.lock().push(format!("{:?}", event));
            Ok(())
        });

        bus.publish(TestEvent::Number(1));
        bus.publish(TestEvent::Text("hi".to_string()));

        assert_eq!(*log.lock(), vec!["Text(\"hi\")"]);
    }

    #[test]
    fn test_failing_handler_does_not_stop_delivery() {
        let bus = EventBus::<TestEvent>::new();
        let log = recorder();

        bus.subscribe(TestTopic::Number, |_| anyhow::bail!("boom"));
        let log_clone = Arc::clone(&log);
        bus.subscribe(TestTopic::Number, move |_| {
            log_clone.lock().push("after".to_string());
            Ok(())
        });

        assert_eq!(bus.publish(TestEvent::Number(1)), 1);
        assert_eq!(*log.lock(), vec!["after"]);
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        let bus = EventBus::<TestEvent>::new();
        let log = recorder();

        bus.subscribe(TestTopic::Number, |_| panic!("handler bug"));
        let log_clone = Arc::clone(&log);
        bus.subscribe(TestTopic::Number, move |_| {
            log_clone.lock().push("survivor".to_string());
            Ok(())
        });

        assert_eq!(bus.publish(TestEvent::Number(1)), 1);
        assert_eq!(*log.lock(), vec!["survivor"]);
    }

    #[test]
    fn test_unsubscribe_by_handle() {
        let bus = EventBus::<TestEvent>::new();
        let log = recorder();
        let log_clone = Arc::clone(&log);
        let id = bus.subscribe(TestTopic::Number, move |_| {
            log_clone.lock().push("called".to_string());
            Ok(())
        });

        assert_eq!(bus.subscriber_count(TestTopic::Number), 1);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.subscriber_count(TestTopic::Number), 0);

        bus.publish(TestEvent::Number(1));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_reentrant_publish_from_handler() {
        let bus = Arc::new(EventBus::<TestEvent>::new());
        let log = recorder();

        let inner_bus = Arc::clone(&bus);
        bus.subscribe(TestTopic::Number, move |event| {
            if let TestEvent::Number(n) = event {
                if *n > 0 {
                    inner_bus.publish(TestEvent::Number(n - 1));
                }
            }
            Ok(())
        });
        let log_clone = Arc::clone(&log);
        bus.subscribe(TestTopic::Number, move |event| {
            log_clone.lock().push(format!("{:?}", event));
            Ok(())
        });

        bus.publish(TestEvent::Number(2));

        // Depth-first: the nested publish completes before the outer one
        // reaches its second handler.
        assert_eq!(*log.lock(), vec!["Number(0)", "Number(1)", "Number(2)"]);
    }

    #[test]
    fn test_subscribe_during_publish_takes_effect_next_time() {
        let bus = Arc::new(EventBus::<TestEvent>::new());
        let count = Arc::new(Mutex::new(0));

        let inner_bus = Arc::clone(&bus);
        let count_clone = Arc::clone(&count);
        bus.subscribe(TestTopic::Text, move |_| {
            let count = Arc::clone(&count_clone);
            inner_bus.subscribe(TestTopic::Number, move |_| {
                *count.lock() += 1;
                Ok(())
            });
            Ok(())
        });

        bus.publish(TestEvent::Text("install".to_string()));
        bus.publish(TestEvent::Number(1));
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn test_concurrent_publishers() {
        let bus = Arc::new(EventBus::<TestEvent>::new());
        let count = Arc::new(Mutex::new(0u32));
        let count_clone = Arc::clone(&count);
        bus.subscribe(TestTopic::Number, move |_| {
            *count_clone.lock() += 1;
            Ok(())
        });

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let bus = Arc::clone(&bus);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        bus.publish(TestEvent::Number(i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(*count.lock(), 100);
    }

    #[tokio::test]
    async fn test_subscribe_channel_forwards_and_cleans_up() {
        let bus = Arc::new(EventBus::<TestEvent>::new());
        let (_id, mut rx) = bus.subscribe_channel(TestTopic::Text);

        bus.publish(TestEvent::Text("one".to_string()));
        assert_eq!(rx.recv().await, Some(TestEvent::Text("one".to_string())));

        drop(rx);
        // The failed send removes the forwarding subscription.
        bus.publish(TestEvent::Text("two".to_string()));
        assert_eq!(bus.subscriber_count(TestTopic::Text), 0);
    }
}
