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

//! Adaptive delivery on top of a [`Transport`].
//!
//! Vital and operational items, and anything sent while the page is
//! terminating, go through the beacon first and fall back to a keep-alive
//! request when the beacon refuses them. Everything else uses a plain
//! request.

use nerva_core::transport::{RequestOptions, Transport, TransportError, WirePayload};
use nerva_core::PriorityTier;
use std::collections::HashMap;
use std::sync::Arc;

/// Destination name to URL mapping.
#[derive(Debug, Clone, Default)]
pub struct EndpointMap {
    routes: HashMap<String, String>,
    fallback: Option<String>,
}

impl EndpointMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `destination` to `url`.
    pub fn with_endpoint(mut self, destination: impl Into<String>, url: impl Into<String>) -> Self {
        self.routes.insert(destination.into(), url.into());
        self
    }

    /// URL used for destinations without an explicit mapping.
    pub fn with_default(mut self, url: impl Into<String>) -> Self {
        self.fallback = Some(url.into());
        self
    }

    /// Resolves a destination to its URL.
    pub fn resolve(&self, destination: &str) -> Option<&str> {
        self.routes
            .get(destination)
            .or(self.fallback.as_ref())
            .map(String::as_str)
    }
}

impl FromIterator<(String, String)> for EndpointMap {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            routes: iter.into_iter().collect(),
            fallback: None,
        }
    }
}

/// How a payload actually left the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryRoute {
    /// Fire-and-forget beacon.
    Beacon,
    /// Request flagged to outlive its caller, used when the beacon refused.
    KeepAliveRequest,
    /// Ordinary request.
    Request,
}

/// Picks a delivery variant per item and drives the underlying transport.
#[derive(Clone)]
pub struct AdaptiveTransport {
    transport: Arc<dyn Transport>,
    endpoints: EndpointMap,
    beacon_available: bool,
}

impl AdaptiveTransport {
    /// Wraps `transport` with the given endpoints.
    pub fn new(transport: Arc<dyn Transport>, endpoints: EndpointMap) -> Self {
        Self {
            transport,
            endpoints,
            beacon_available: true,
        }
    }

    /// Disables the beacon path, for platforms that lack it.
    pub fn with_beacon(mut self, available: bool) -> Self {
        self.beacon_available = available;
        self
    }

    /// The endpoint map.
    pub fn endpoints(&self) -> &EndpointMap {
        &self.endpoints
    }

    /// Delivers one payload. `Ok` means the item may be removed from its queue.
    pub async fn deliver(
        &self,
        tier: PriorityTier,
        destination: &str,
        payload: WirePayload,
        terminating: bool,
    ) -> Result<DeliveryRoute, TransportError> {
        let url = self
            .endpoints
            .resolve(destination)
            .ok_or_else(|| TransportError::UnknownDestination(destination.to_owned()))?;

        if tier > PriorityTier::OPERATIONAL && !terminating {
            self.transport
                .post(url, payload, RequestOptions { keep_alive: false })
                .await?;
            return Ok(DeliveryRoute::Request);
        }

        if self.beacon_available && self.transport.send_beacon(url, &payload) {
            return Ok(DeliveryRoute::Beacon);
        }
        log::debug!(
            "AdaptiveTransport: beacon refused {} bytes for '{destination}', using keep-alive request.",
            payload.len()
        );
        self.transport
            .post(url, payload, RequestOptions { keep_alive: true })
            .await?;
        Ok(DeliveryRoute::KeepAliveRequest)
    }
}

impl std::fmt::Debug for AdaptiveTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptiveTransport")
            .field("endpoints", &self.endpoints)
            .field("beacon_available", &self.beacon_available)
            .finish()
    }
}
