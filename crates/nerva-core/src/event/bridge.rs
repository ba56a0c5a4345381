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

//! Cross-thread publishing into a [`MessageBus`](super::MessageBus).

use super::bus::TopicCode;
use std::fmt;

/// A message in flight from a background thread to the foreground bus.
pub(crate) enum Envelope<I, R> {
    Intention(TopicCode, I),
    Reaction(TopicCode, R),
}

/// Publishing handle usable from any thread.
///
/// Messages are queued on a channel and delivered by the foreground when it
/// calls [`MessageBus::pump`](super::MessageBus::pump), so subscribers always
/// run on the thread that owns the bus.
pub struct RemotePublisher<I, R> {
    pub(crate) sender: flume::Sender<Envelope<I, R>>,
}

impl<I, R> RemotePublisher<I, R> {
    /// Queues an intention. Returns `false` if the bus is gone.
    pub fn publish_intention(&self, topic: TopicCode, payload: I) -> bool {
        self.send(Envelope::Intention(topic, payload))
    }

    /// Queues a reaction. Returns `false` if the bus is gone.
    pub fn publish_reaction(&self, topic: TopicCode, payload: R) -> bool {
        self.send(Envelope::Reaction(topic, payload))
    }

    fn send(&self, envelope: Envelope<I, R>) -> bool {
        if let Err(e) = self.sender.send(envelope) {
            log::error!("RemotePublisher: failed to queue message: {e}. Bus likely dropped.");
            return false;
        }
        true
    }
}

impl<I, R> Clone for RemotePublisher<I, R> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<I, R> fmt::Debug for RemotePublisher<I, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemotePublisher")
            .field("queued", &self.sender.len())
            .finish()
    }
}
