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

use crate::payload::Payload;
use nerva_core::PriorityTier;
use std::fmt;
use std::time::Instant;

/// Identifier of a queued item. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(String);

impl ItemId {
    /// Wraps a caller-supplied identifier. `None` if it is empty or blank.
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        (!id.trim().is_empty()).then_some(Self(id))
    }

    /// A fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// The identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A unit of outbound data owned by the membrane until delivered or evicted.
#[derive(Debug, Clone)]
pub struct MembraneItem {
    /// Unique identifier.
    pub id: ItemId,
    /// Priority tier, fixed at creation.
    pub tier: PriorityTier,
    /// Logical destination, resolved to a URL by the endpoint map.
    pub destination: String,
    /// Data to deliver.
    pub payload: Payload,
    /// When the producer created the item.
    pub created_at: Instant,
    /// Failed delivery attempts so far.
    pub retry_count: u32,
}

impl MembraneItem {
    /// Creates an item with a generated identifier.
    pub fn new(tier: PriorityTier, destination: impl Into<String>, payload: impl Into<Payload>) -> Self {
        Self::with_id(ItemId::generate(), tier, destination, payload)
    }

    /// Creates an item with a caller-chosen identifier.
    pub fn with_id(
        id: ItemId,
        tier: PriorityTier,
        destination: impl Into<String>,
        payload: impl Into<Payload>,
    ) -> Self {
        Self {
            id,
            tier,
            destination: destination.into(),
            payload: payload.into(),
            created_at: Instant::now(),
            retry_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_id_rejects_blank() {
        assert!(ItemId::new("").is_none());
        assert!(ItemId::new("   ").is_none());
        assert_eq!(ItemId::new("evt-1").unwrap().as_str(), "evt-1");
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(ItemId::generate(), ItemId::generate());
    }
}
