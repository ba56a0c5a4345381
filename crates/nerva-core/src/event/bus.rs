// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Topic-keyed synchronous routing.

use crate::opcode::CompoundOpcode;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

/// Topics are identified by compound opcodes.
pub type TopicCode = CompoundOpcode;

/// Subscriber count per topic above which a congestion warning is logged.
pub const DEFAULT_CONGESTION_THRESHOLD: usize = 50;

type Callback<P> = Arc<dyn Fn(&P) + Send + Sync>;

/// Identifier of one subscription, unique within its router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct RouterInner<P> {
    name: &'static str,
    routes: RwLock<HashMap<TopicCode, Vec<(SubscriptionId, Callback<P>)>>>,
    next_id: AtomicU64,
    congestion_threshold: usize,
}

impl<P> RouterInner<P> {
    fn read(&self) -> RwLockReadGuard<'_, HashMap<TopicCode, Vec<(SubscriptionId, Callback<P>)>>> {
        self.routes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(
        &self,
    ) -> RwLockWriteGuard<'_, HashMap<TopicCode, Vec<(SubscriptionId, Callback<P>)>>> {
        self.routes.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, topic: TopicCode, id: SubscriptionId) -> bool {
        let mut routes = self.write();
        let Some(subscribers) = routes.get_mut(&topic) else {
            return false;
        };
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        let removed = subscribers.len() != before;
        if subscribers.is_empty() {
            routes.remove(&topic);
            log::trace!("Bus[{}]: pruned empty topic {topic}", self.name);
        }
        removed
    }
}

/// Routes payloads of type `P` to the callbacks subscribed to a topic.
///
/// Delivery is synchronous and follows subscription order. A panicking
/// subscriber is caught and logged; the remaining subscribers still receive
/// the payload. Topics are dropped from the routing table as soon as their
/// last subscriber leaves.
pub struct TopicRouter<P> {
    inner: Arc<RouterInner<P>>,
}

impl<P: 'static> TopicRouter<P> {
    /// Creates a router with the default congestion threshold.
    pub fn new(name: &'static str) -> Self {
        Self::with_congestion_threshold(name, DEFAULT_CONGESTION_THRESHOLD)
    }

    /// Creates a router warning once a topic exceeds `threshold` subscribers.
    pub fn with_congestion_threshold(name: &'static str, threshold: usize) -> Self {
        Self {
            inner: Arc::new(RouterInner {
                name,
                routes: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                congestion_threshold: threshold,
            }),
        }
    }

    /// Subscribes `callback` to `topic`.
    pub fn subscribe<F>(&self, topic: TopicCode, callback: F) -> Subscription<P>
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let count = {
            let mut routes = self.inner.write();
            let subscribers = routes.entry(topic).or_default();
            subscribers.push((id, Arc::new(callback)));
            subscribers.len()
        };

        if count == self.inner.congestion_threshold + 1 {
            log::warn!(
                "Bus[{}]: topic {topic} has {count} subscribers (threshold {})",
                self.inner.name,
                self.inner.congestion_threshold
            );
        }

        Subscription {
            id,
            topic,
            router: Arc::downgrade(&self.inner),
        }
    }

    /// Delivers `payload` to every subscriber of `topic` and returns how many
    /// callbacks completed without panicking.
    pub fn publish(&self, topic: TopicCode, payload: &P) -> usize {
        let callbacks: Vec<Callback<P>> = match self.inner.read().get(&topic) {
            Some(subscribers) => subscribers.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for callback in callbacks {
            match catch_unwind(AssertUnwindSafe(|| callback(payload))) {
                Ok(()) => delivered += 1,
                Err(_) => log::error!(
                    "Bus[{}]: subscriber of topic {topic} panicked; continuing delivery",
                    self.inner.name
                ),
            }
        }
        delivered
    }

    /// Number of subscribers of `topic`.
    pub fn subscriber_count(&self, topic: TopicCode) -> usize {
        self.inner.read().get(&topic).map_or(0, Vec::len)
    }

    /// Number of topics with at least one subscriber.
    pub fn topic_count(&self) -> usize {
        self.inner.read().len()
    }
}

impl<P> Clone for TopicRouter<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P> fmt::Debug for TopicRouter<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicRouter")
            .field("name", &self.inner.name)
            .field("topics", &self.inner.read().len())
            .finish()
    }
}

/// Handle returned by [`TopicRouter::subscribe`].
///
/// Dropping the handle keeps the subscription alive; call
/// [`unsubscribe`](Self::unsubscribe) to end it.
pub struct Subscription<P> {
    id: SubscriptionId,
    topic: TopicCode,
    router: Weak<RouterInner<P>>,
}

impl<P> Subscription<P> {
    /// The subscription's identifier.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// The subscribed topic.
    pub fn topic(&self) -> TopicCode {
        self.topic
    }

    /// Removes the subscription. Returns `false` if the router is gone.
    pub fn unsubscribe(self) -> bool {
        match self.router.upgrade() {
            Some(router) => router.remove(self.topic, self.id),
            None => false,
        }
    }
}

impl<P> fmt::Debug for Subscription<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    const TOPIC: TopicCode = TopicCode::from_raw(0x0001_0001);
    const OTHER: TopicCode = TopicCode::from_raw(0x0001_0002);

    #[test]
    fn test_publish_follows_subscription_order() {
        let router = TopicRouter::<u32>::new("test");
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let seen = seen.clone();
            router.subscribe(TOPIC, move |v: &u32| seen.lock().unwrap().push((tag, *v)));
        }

        assert_eq!(router.publish(TOPIC, &7), 3);
        assert_eq!(*seen.lock().unwrap(), vec![("a", 7), ("b", 7), ("c", 7)]);
    }

    #[test]
    fn test_panicking_subscriber_does_not_stop_delivery() {
        let router = TopicRouter::<u32>::new("test");
        let hits = Arc::new(Mutex::new(0));

        router.subscribe(TOPIC, |_| panic!("subscriber failure"));
        let counter = hits.clone();
        router.subscribe(TOPIC, move |_| *counter.lock().unwrap() += 1);

        assert_eq!(router.publish(TOPIC, &1), 1);
        assert_eq!(*hits.lock().unwrap(), 1);
    }

    #[test]
    fn test_topics_are_isolated() {
        let router = TopicRouter::<u32>::new("test");
        let hits = Arc::new(Mutex::new(0));
        let counter = hits.clone();
        router.subscribe(TOPIC, move |_| *counter.lock().unwrap() += 1);

        assert_eq!(router.publish(OTHER, &1), 0);
        assert_eq!(*hits.lock().unwrap(), 0);
    }

    #[test]
    fn test_unsubscribe_prunes_empty_topics() {
        let router = TopicRouter::<u32>::new("test");
        let first = router.subscribe(TOPIC, |_| {});
        let second = router.subscribe(TOPIC, |_| {});
        assert_eq!(router.subscriber_count(TOPIC), 2);

        assert!(first.unsubscribe());
        assert_eq!(router.topic_count(), 1);
        assert!(second.unsubscribe());
        assert_eq!(router.topic_count(), 0);
        assert_eq!(router.publish(TOPIC, &1), 0);
    }

    #[test]
    fn test_unsubscribe_after_router_dropped() {
        let router = TopicRouter::<u32>::new("test");
        let sub = router.subscribe(TOPIC, |_| {});
        drop(router);
        assert!(!sub.unsubscribe());
    }

    #[test]
    fn test_congestion_is_not_blocking() {
        let router = TopicRouter::<u32>::with_congestion_threshold("test", 2);
        let subs: Vec<_> = (0..5).map(|_| router.subscribe(TOPIC, |_| {})).collect();
        assert_eq!(router.subscriber_count(TOPIC), 5);
        assert_eq!(router.publish(TOPIC, &0), 5);
        for sub in subs {
            sub.unsubscribe();
        }
        assert_eq!(router.topic_count(), 0);
    }

    #[test]
    fn test_subscriber_may_unsubscribe_during_publish() {
        let router = TopicRouter::<u32>::new("test");
        let slot: Arc<Mutex<Option<Subscription<u32>>>> = Arc::new(Mutex::new(None));
        let inner = slot.clone();
        let sub = router.subscribe(TOPIC, move |_| {
            if let Some(sub) = inner.lock().unwrap().take() {
                sub.unsubscribe();
            }
        });
        *slot.lock().unwrap() = Some(sub);

        assert_eq!(router.publish(TOPIC, &0), 1);
        assert_eq!(router.topic_count(), 0);
    }
}
