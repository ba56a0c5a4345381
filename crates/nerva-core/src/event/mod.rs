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

//! Provides the message bus routing intentions and reactions.
//!
//! The bus is made of two [`TopicRouter`]s with identical mechanics but
//! separate namespaces: the *intention* stream carries requests toward
//! handlers, the *reaction* stream carries results back to callers. Keeping
//! them apart means a handler's output can never loop back into the request
//! pipeline.
//!
//! Background threads publish through a [`RemotePublisher`], which queues
//! messages on a channel until the foreground calls [`MessageBus::pump`].

mod bridge;
mod bus;

pub use self::bridge::RemotePublisher;
pub use self::bus::{
    Subscription, SubscriptionId, TopicCode, TopicRouter, DEFAULT_CONGESTION_THRESHOLD,
};

use self::bridge::Envelope;

/// Intention and reaction streams sharing one remote queue.
pub struct MessageBus<I, R = I> {
    intentions: TopicRouter<I>,
    reactions: TopicRouter<R>,
    remote_tx: flume::Sender<Envelope<I, R>>,
    remote_rx: flume::Receiver<Envelope<I, R>>,
}

impl<I: 'static, R: 'static> MessageBus<I, R> {
    /// Creates a bus with the default congestion threshold.
    pub fn new() -> Self {
        Self::with_congestion_threshold(DEFAULT_CONGESTION_THRESHOLD)
    }

    /// Creates a bus whose routers warn above `threshold` subscribers per topic.
    pub fn with_congestion_threshold(threshold: usize) -> Self {
        let (remote_tx, remote_rx) = flume::unbounded();
        log::info!("MessageBus initialized (congestion threshold {threshold}).");
        Self {
            intentions: TopicRouter::with_congestion_threshold("intention", threshold),
            reactions: TopicRouter::with_congestion_threshold("reaction", threshold),
            remote_tx,
            remote_rx,
        }
    }

    /// The intention stream.
    pub fn intentions(&self) -> &TopicRouter<I> {
        &self.intentions
    }

    /// The reaction stream.
    pub fn reactions(&self) -> &TopicRouter<R> {
        &self.reactions
    }

    /// Publishes on the intention stream.
    pub fn publish_intention(&self, topic: TopicCode, payload: &I) -> usize {
        self.intentions.publish(topic, payload)
    }

    /// Publishes on the reaction stream.
    pub fn publish_reaction(&self, topic: TopicCode, payload: &R) -> usize {
        self.reactions.publish(topic, payload)
    }

    /// Subscribes to the intention stream.
    pub fn subscribe_intention<F>(&self, topic: TopicCode, callback: F) -> Subscription<I>
    where
        F: Fn(&I) + Send + Sync + 'static,
    {
        self.intentions.subscribe(topic, callback)
    }

    /// Subscribes to the reaction stream.
    pub fn subscribe_reaction<F>(&self, topic: TopicCode, callback: F) -> Subscription<R>
    where
        F: Fn(&R) + Send + Sync + 'static,
    {
        self.reactions.subscribe(topic, callback)
    }

    /// Returns a handle background threads can publish through.
    pub fn remote_publisher(&self) -> RemotePublisher<I, R> {
        RemotePublisher {
            sender: self.remote_tx.clone(),
        }
    }

    /// Delivers every message queued by remote publishers, in arrival order.
    /// Returns the number of messages processed.
    pub fn pump(&self) -> usize {
        let mut processed = 0;
        while let Ok(envelope) = self.remote_rx.try_recv() {
            match envelope {
                Envelope::Intention(topic, payload) => {
                    self.intentions.publish(topic, &payload);
                }
                Envelope::Reaction(topic, payload) => {
                    self.reactions.publish(topic, &payload);
                }
            }
            processed += 1;
        }
        if processed > 0 {
            log::trace!("MessageBus: pumped {processed} remote messages.");
        }
        processed
    }
}

impl<I: 'static, R: 'static> Default for MessageBus<I, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I, R> std::fmt::Debug for MessageBus<I, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus")
            .field("intentions", &self.intentions)
            .field("reactions", &self.reactions)
            .field("queued_remote", &self.remote_rx.len())
            .finish()
    }
}
