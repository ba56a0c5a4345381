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

//! Background refinement of queued batches.
//!
//! Deduplication hashes every payload, which is too much work for the
//! foreground drain loop. It runs on a dedicated worker thread instead, and
//! the foreground talks to it through a request/response channel: a
//! [`RefineJob`] goes out over crossbeam, the answer comes back on a tokio
//! oneshot. The caller bounds the wait, so a slow or dead worker only means
//! a cycle proceeds unrefined.

use crate::membrane::ItemId;
use std::collections::HashSet;
use std::io;
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;

/// One item submitted for refinement.
#[derive(Debug, Clone)]
pub struct RefineEntry {
    /// Item identifier.
    pub id: ItemId,
    /// Destination, part of the item's identity.
    pub destination: String,
    /// Copied payload bytes.
    pub bytes: Vec<u8>,
}

struct RefineJob {
    entries: Vec<RefineEntry>,
    reply: oneshot::Sender<Vec<ItemId>>,
}

/// BLAKE3 fingerprint of an item's destination and payload.
pub fn fingerprint(destination: &str, bytes: &[u8]) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(destination.as_bytes());
    hasher.update(&[0]);
    hasher.update(bytes);
    hasher.finalize()
}

/// Returns the ids of entries whose fingerprint already appeared earlier
/// in `entries`. The oldest occurrence of each payload survives.
pub fn deduplicate(entries: &[RefineEntry]) -> Vec<ItemId> {
    let mut seen = HashSet::with_capacity(entries.len());
    entries
        .iter()
        .filter(|entry| !seen.insert(fingerprint(&entry.destination, &entry.bytes)))
        .map(|entry| entry.id.clone())
        .collect()
}

/// Foreground handle on the refinement worker.
///
/// The worker thread exits once every clone of its client is dropped.
#[derive(Clone)]
pub struct RefineClient {
    jobs: crossbeam_channel::Sender<RefineJob>,
}

impl RefineClient {
    /// Starts a worker running [`deduplicate`].
    pub fn spawn() -> io::Result<Self> {
        Self::spawn_with(deduplicate)
    }

    /// Starts a worker running a custom refinement. The function returns the
    /// ids to drop.
    pub fn spawn_with<F>(refine: F) -> io::Result<Self>
    where
        F: Fn(&[RefineEntry]) -> Vec<ItemId> + Send + 'static,
    {
        let (jobs, job_rx) = crossbeam_channel::unbounded::<RefineJob>();
        thread::Builder::new()
            .name("nerva-refine".into())
            .spawn(move || {
                log::debug!("Refine worker started.");
                for job in job_rx {
                    let dropped = refine(&job.entries);
                    // The requester may have timed out already.
                    let _ = job.reply.send(dropped);
                }
                log::debug!("Refine worker stopped.");
            })?;
        Ok(Self { jobs })
    }

    /// Submits `entries` and waits at most `timeout` for the ids to drop.
    ///
    /// `None` if the worker is gone or too slow.
    pub async fn refine(&self, entries: Vec<RefineEntry>, timeout: Duration) -> Option<Vec<ItemId>> {
        let (reply, answer) = oneshot::channel();
        if self.jobs.send(RefineJob { entries, reply }).is_err() {
            log::warn!("RefineClient: worker is gone, skipping refinement.");
            return None;
        }
        match tokio::time::timeout(timeout, answer).await {
            Ok(Ok(dropped)) => Some(dropped),
            Ok(Err(_)) => {
                log::warn!("RefineClient: worker dropped the request.");
                None
            }
            Err(_) => {
                log::warn!("RefineClient: no answer within {timeout:?}, skipping refinement.");
                None
            }
        }
    }
}

impl std::fmt::Debug for RefineClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefineClient")
            .field("pending", &self.jobs.len())
            .finish()
    }
}
