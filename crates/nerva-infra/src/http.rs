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

//! HTTP delivery through `reqwest`.

use async_trait::async_trait;
use nerva_core::transport::{RequestOptions, Transport, TransportError, WirePayload};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use tokio::runtime::Handle;

/// Largest payload the beacon path accepts, in bytes.
pub const BEACON_PAYLOAD_CEILING: usize = 64 * 1024;

/// Default per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A [`Transport`] issuing HTTP POSTs.
///
/// The beacon variant spawns a detached task on the current tokio runtime
/// and reports acceptance immediately; it refuses payloads above
/// [`BEACON_PAYLOAD_CEILING`] and calls made outside a runtime. The request
/// variant awaits the server's answer; with `keep_alive` set the POST runs on
/// its own task so it completes even if the caller is dropped.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Builds a transport with the default timeout.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    /// Builds a transport whose requests give up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;
        Ok(Self { client })
    }

    async fn send(client: Client, url: String, payload: WirePayload) -> Result<(), TransportError> {
        let response = client
            .post(&url)
            .header(CONTENT_TYPE, payload.content_type())
            .body(payload.into_bytes())
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(TransportError::Status(status.as_u16()))
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn send_beacon(&self, url: &str, payload: &WirePayload) -> bool {
        if payload.len() > BEACON_PAYLOAD_CEILING {
            return false;
        }
        let Ok(handle) = Handle::try_current() else {
            log::debug!("HttpTransport: beacon refused outside a tokio runtime.");
            return false;
        };
        let (client, url, payload) = (self.client.clone(), url.to_owned(), payload.clone());
        handle.spawn(async move {
            if let Err(e) = Self::send(client, url.clone(), payload).await {
                log::debug!("HttpTransport: beacon to {url} lost: {e}");
            }
        });
        true
    }

    async fn post(
        &self,
        url: &str,
        payload: WirePayload,
        options: RequestOptions,
    ) -> Result<(), TransportError> {
        let client = self.client.clone();
        let url = url.to_owned();
        if !options.keep_alive {
            return Self::send(client, url, payload).await;
        }
        tokio::spawn(Self::send(client, url, payload))
            .await
            .map_err(|e| TransportError::Network(format!("keep-alive task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers every request with `status` and counts the bodies it read.
    async fn serve(status: u16) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/ingest", listener.local_addr().unwrap());
        let received = Arc::new(AtomicUsize::new(0));
        let counter = received.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let counter = counter.clone();
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut chunk = [0u8; 4096];
                    loop {
                        let n = socket.read(&mut chunk).await.unwrap_or(0);
                        if n == 0 {
                            break;
                        }
                        request.extend_from_slice(&chunk[..n]);
                        if request_complete(&request) {
                            break;
                        }
                    }
                    counter.fetch_add(1, Ordering::SeqCst);
                    let reply = format!(
                        "HTTP/1.1 {status} Test\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                    );
                    let _ = socket.write_all(reply.as_bytes()).await;
                });
            }
        });
        (url, received)
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let length = text[..header_end]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        request.len() >= header_end + 4 + length
    }

    #[tokio::test]
    async fn test_post_success_and_status_error() {
        let transport = HttpTransport::new().unwrap();
        let (ok_url, received) = serve(204).await;
        let payload = WirePayload::Text("pulse".into());
        assert_eq!(
            transport
                .post(&ok_url, payload.clone(), RequestOptions::default())
                .await,
            Ok(())
        );
        assert_eq!(received.load(Ordering::SeqCst), 1);

        let (bad_url, _) = serve(503).await;
        assert_eq!(
            transport
                .post(&bad_url, payload, RequestOptions { keep_alive: true })
                .await,
            Err(TransportError::Status(503))
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_a_network_error() {
        let transport = HttpTransport::with_timeout(Duration::from_secs(2)).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        drop(listener);
        let result = transport
            .post(&url, WirePayload::Binary(vec![1]), RequestOptions::default())
            .await;
        assert!(matches!(result, Err(TransportError::Network(_))), "{result:?}");
    }

    #[tokio::test]
    async fn test_beacon_is_detached() {
        let transport = HttpTransport::new().unwrap();
        let (url, received) = serve(200).await;
        assert!(transport.send_beacon(&url, &WirePayload::Text("bye".into())));
        for _ in 0..100 {
            if received.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(received.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_beacon_refuses_oversized_payload() {
        let transport = HttpTransport::new().unwrap();
        let big = WirePayload::Binary(vec![0; BEACON_PAYLOAD_CEILING + 1]);
        assert!(!transport.send_beacon("http://127.0.0.1:9/", &big));
    }

    #[test]
    fn test_beacon_refused_outside_runtime() {
        let transport = HttpTransport::new().unwrap();
        assert!(!transport.send_beacon("http://127.0.0.1:9/", &WirePayload::Text("x".into())));
    }
}
