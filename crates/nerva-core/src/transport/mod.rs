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

//! The contract between the membrane and whatever actually moves bytes.
//!
//! Two delivery variants exist. A *beacon* is a non-blocking, best-effort
//! send that survives teardown but may refuse large payloads. A *request* is
//! an awaited POST that can carry a keep-alive hint so it outlives the
//! caller's context.

use async_trait::async_trait;

/// Bytes ready to hand to a transport. Never a view into shared memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WirePayload {
    /// UTF-8 text, sent as `text/plain`.
    Text(String),
    /// Raw bytes, sent as `application/octet-stream`.
    Binary(Vec<u8>),
}

impl WirePayload {
    /// Size of the payload in bytes.
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// `true` for a zero-length payload.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrows the payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            WirePayload::Text(text) => text.as_bytes(),
            WirePayload::Binary(bytes) => bytes,
        }
    }

    /// Consumes the payload into owned bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            WirePayload::Text(text) => text.into_bytes(),
            WirePayload::Binary(bytes) => bytes,
        }
    }

    /// MIME type matching the variant.
    pub fn content_type(&self) -> &'static str {
        match self {
            WirePayload::Text(_) => "text/plain;charset=UTF-8",
            WirePayload::Binary(_) => "application/octet-stream",
        }
    }
}

/// Options for [`Transport::post`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Keep the request running even if the caller's context goes away.
    pub keep_alive: bool,
}

/// Delivery failures. All of them are retried on the next drain cycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// No URL is configured for the destination.
    #[error("no endpoint configured for destination `{0}`")]
    UnknownDestination(String),
    /// The server answered with a non-success status.
    #[error("server rejected delivery with status {0}")]
    Status(u16),
    /// The request never completed.
    #[error("network failure: {0}")]
    Network(String),
    /// The transport cannot operate in the current environment.
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// A delivery mechanism for outbound payloads.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fire-and-forget send. Returns `false` if the transport refused to
    /// queue the payload (too large, no runtime, ...). Must not block.
    fn send_beacon(&self, url: &str, payload: &WirePayload) -> bool;

    /// Standard POST, resolved once the server acknowledged the payload.
    async fn post(
        &self,
        url: &str,
        payload: WirePayload,
        options: RequestOptions,
    ) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_payload_accessors() {
        let text = WirePayload::Text("héllo".to_string());
        assert_eq!(text.len(), 6);
        assert_eq!(text.content_type(), "text/plain;charset=UTF-8");

        let binary = WirePayload::Binary(vec![1, 2, 3]);
        assert_eq!(binary.as_bytes(), &[1, 2, 3]);
        assert_eq!(binary.content_type(), "application/octet-stream");
        assert_eq!(binary.into_bytes(), vec![1, 2, 3]);
        assert!(WirePayload::Binary(Vec::new()).is_empty());
    }
}
