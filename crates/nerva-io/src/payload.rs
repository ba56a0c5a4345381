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

//! Payloads carried by membrane items.

use nerva_core::transport::WirePayload;
use std::ops::Range;
use std::sync::Arc;

/// A window into a buffer shared with another execution context.
///
/// Such views must never reach a transport directly; [`Payload::to_wire`]
/// copies them out first.
#[derive(Debug, Clone)]
pub struct SharedView {
    buffer: Arc<[u8]>,
    range: Range<usize>,
}

impl SharedView {
    /// Creates a view over `range`. `None` if the range is out of bounds.
    pub fn new(buffer: Arc<[u8]>, range: Range<usize>) -> Option<Self> {
        (range.start <= range.end && range.end <= buffer.len()).then_some(Self { buffer, range })
    }

    /// The viewed bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[self.range.clone()]
    }
}

/// Opaque data queued for delivery.
#[derive(Debug, Clone)]
pub enum Payload {
    /// UTF-8 text.
    Text(String),
    /// Owned bytes.
    Binary(Vec<u8>),
    /// Bytes living in a shared buffer.
    Shared(SharedView),
}

impl Payload {
    /// Borrows the payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Text(text) => text.as_bytes(),
            Payload::Binary(bytes) => bytes,
            Payload::Shared(view) => view.as_slice(),
        }
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// `true` for a zero-length payload.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Produces an owned copy suitable for a transport.
    pub fn to_wire(&self) -> WirePayload {
        match self {
            Payload::Text(text) => WirePayload::Text(text.clone()),
            Payload::Binary(bytes) => WirePayload::Binary(bytes.clone()),
            Payload::Shared(view) => WirePayload::Binary(view.as_slice().to_vec()),
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_owned())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Binary(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_view_bounds() {
        let buffer: Arc<[u8]> = Arc::from(vec![1u8, 2, 3, 4]);
        assert!(SharedView::new(buffer.clone(), 1..5).is_none());
        let view = SharedView::new(buffer, 1..3).unwrap();
        assert_eq!(view.as_slice(), &[2, 3]);
    }

    #[test]
    fn test_shared_view_is_copied_to_owned_binary() {
        let buffer: Arc<[u8]> = Arc::from(vec![9u8, 8, 7]);
        let payload = Payload::Shared(SharedView::new(buffer.clone(), 0..2).unwrap());
        let wire = payload.to_wire();
        assert_eq!(wire, WirePayload::Binary(vec![9, 8]));
        assert_eq!(Arc::strong_count(&buffer), 2);
        drop(payload);
        assert_eq!(Arc::strong_count(&buffer), 1);
    }
}
