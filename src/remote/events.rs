//! Synchronous topic fan-out used by the remote collections
//!
//! Listeners registered on a topic are called in subscription order, on the
//! publisher's thread, with whatever set was registered when `publish`
//! started. A panicking listener is logged and skipped.

use log::error;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Topics announced by a remote collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// A fetch cycle failed
    Error,
    /// Content differs from the previous cycle
    Change,
    /// A fetch cycle completed, successfully or not
    Settled,
}

/// Handle returned by `subscribe`, used to unsubscribe later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type Listener<P> = Arc<dyn Fn(&P) + Send + Sync>;

pub struct EventTopicBus<K, P> {
    listeners: Mutex<HashMap<K, Vec<(ListenerId, Listener<P>)>>>,
    next_id: AtomicU64,
}

impl<K, P> EventTopicBus<K, P>
where
    K: Eq + Hash + Copy + std::fmt::Debug,
{
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe<F>(&self, topic: K, listener: F) -> ListenerId
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .entry(topic)
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Returns false when the listener was not registered on `topic`
    pub fn unsubscribe(&self, topic: K, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let Some(registered) = listeners.get_mut(&topic) else {
            return false;
        };
        let before = registered.len();
        registered.retain(|(listener_id, _)| *listener_id != id);
        before != registered.len()
    }

    pub fn publish(&self, topic: K, payload: &P) {
        // Snapshot so listeners may (un)subscribe while being delivered to
        let targets: Vec<Listener<P>> = match self.listeners.lock().get(&topic) {
            Some(registered) => registered.iter().map(|(_, l)| Arc::clone(l)).collect(),
            None => return,
        };

        for listener in targets {
            if catch_unwind(AssertUnwindSafe(|| listener(payload))).is_err() {
                error!("Listener for {:?} panicked during delivery", topic);
            }
        }
    }

    pub fn listener_count(&self, topic: K) -> usize {
        self.listeners.lock().get(&topic).map_or(0, Vec::len)
    }

    /// Detach every listener on every topic
    pub fn clear(&self) {
        self.listeners.lock().clear();
    }
}

impl<K, P> Default for EventTopicBus<K, P>
where
    K: Eq + Hash + Copy + std::fmt::Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, EventTopicBus<Topic, String>) {
        (Arc::new(Mutex::new(Vec::new())), EventTopicBus::new())
    }

    #[test]
    fn test_delivery_in_subscription_order() {
        let (seen, bus) = recorder();
        for name in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            bus.subscribe(Topic::Change, move |p: &String| {
                seen.lock().push(format!("{name}:{p}"));
            });
        }

        bus.publish(Topic::Change, &"x".to_string());

        assert_eq!(*seen.lock(), vec!["first:x", "second:x", "third:x"]);
    }

    #[test]
    fn test_topics_are_isolated() {
        let (seen, bus) = recorder();
        let sink = Arc::clone(&seen);
        bus.subscribe(Topic::Error, move |p: &String| sink.lock().push(p.clone()));

        bus.publish(Topic::Change, &"change".to_string());
        bus.publish(Topic::Settled, &"settled".to_string());
        assert!(seen.lock().is_empty());

        bus.publish(Topic::Error, &"boom".to_string());
        assert_eq!(*seen.lock(), vec!["boom"]);
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let (seen, bus) = recorder();
        bus.subscribe(Topic::Change, |_: &String| panic!("listener failure"));
        let sink = Arc::clone(&seen);
        bus.subscribe(Topic::Change, move |p: &String| sink.lock().push(p.clone()));

        bus.publish(Topic::Change, &"still delivered".to_string());

        assert_eq!(*seen.lock(), vec!["still delivered"]);
    }

    #[test]
    fn test_unsubscribe() {
        let (seen, bus) = recorder();
        let sink = Arc::clone(&seen);
        let id = bus.subscribe(Topic::Change, move |p: &String| sink.lock().push(p.clone()));

        assert!(bus.unsubscribe(Topic::Change, id));
        assert!(!bus.unsubscribe(Topic::Change, id));
        assert!(!bus.unsubscribe(Topic::Error, id));

        bus.publish(Topic::Change, &"ignored".to_string());
        assert!(seen.lock().is_empty());
        assert_eq!(bus.listener_count(Topic::Change), 0);
    }

    #[test]
    fn test_clear_detaches_everything() {
        let (seen, bus) = recorder();
        for topic in [Topic::Error, Topic::Change, Topic::Settled] {
            let sink = Arc::clone(&seen);
            bus.subscribe(topic, move |p: &String| sink.lock().push(p.clone()));
        }

        bus.clear();
        bus.publish(Topic::Error, &"a".to_string());
        bus.publish(Topic::Change, &"b".to_string());

        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_listener_may_unsubscribe_itself_during_delivery() {
        let bus: Arc<EventTopicBus<Topic, String>> = Arc::new(EventTopicBus::new());
        let own_id = Arc::new(Mutex::new(None));
        let calls = Arc::new(AtomicU64::new(0));

        let weak_bus = Arc::downgrade(&bus);
        let id_slot = Arc::clone(&own_id);
        let counter = Arc::clone(&calls);
        let id = bus.subscribe(Topic::Change, move |_: &String| {
            counter.fetch_add(1, Ordering::SeqCst);
            if let (Some(bus), Some(id)) = (weak_bus.upgrade(), *id_slot.lock()) {
                bus.unsubscribe(Topic::Change, id);
            }
        });
        *own_id.lock() = Some(id);

        bus.publish(Topic::Change, &"once".to_string());
        bus.publish(Topic::Change, &"twice".to_string());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
