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

//! The backpressure membrane.
//!
//! Outbound items are buffered in one bounded queue per priority tier and
//! drained on a fixed interval. Each cycle asks the mode oracle which tiers
//! may drain: tiers 0 and 1 always, tier 2 unless in `Emergency`, tier 3
//! only in `Peak` or `Balanced` (or when a bypass is requested). Within a
//! tier, items leave strictly in insertion order and only after the
//! transport confirmed them; the first failure stops that tier until the
//! next cycle.
//!
//! Vital items do not wait for the timer: enqueuing one starts a drain of
//! tier 0 right away when a tokio runtime is available.

mod item;
mod queue;

pub use self::item::{ItemId, MembraneItem};

use self::queue::TierQueue;
use crate::refine::{RefineClient, RefineEntry};
use crate::transport::{AdaptiveTransport, DeliveryRoute};
use nerva_core::{ModeOracle, PermitRequest, PriorityTier};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Lower bound on the drain interval.
pub const MIN_DRAIN_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration of a [`Membrane`].
#[derive(Debug, Clone)]
pub struct MembraneConfig {
    /// Period of the drain timer. Clamped to [`MIN_DRAIN_INTERVAL`].
    pub drain_interval: Duration,
    /// Maximum items per tier. Clamped to at least 1.
    pub tier_capacity: usize,
    /// How long a cycle waits for the refinement worker.
    pub refine_timeout: Duration,
}

impl Default for MembraneConfig {
    fn default() -> Self {
        Self {
            drain_interval: Duration::from_secs(5),
            tier_capacity: 500,
            refine_timeout: Duration::from_millis(250),
        }
    }
}

impl MembraneConfig {
    /// Applies the lower bounds.
    pub fn validated(mut self) -> Self {
        if self.drain_interval < MIN_DRAIN_INTERVAL {
            log::warn!(
                "Membrane: drain interval {:?} below minimum, using {:?}.",
                self.drain_interval,
                MIN_DRAIN_INTERVAL
            );
            self.drain_interval = MIN_DRAIN_INTERVAL;
        }
        self.tier_capacity = self.tier_capacity.max(1);
        self
    }
}

/// Why an item was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    /// The destination was empty.
    #[error("item has no destination")]
    EmptyDestination,
    /// No endpoint serves the destination.
    #[error("no endpoint for destination `{0}`")]
    UnknownDestination(String),
    /// An item with the same id is already queued in the tier.
    #[error("item `{0}` is already queued")]
    DuplicateId(ItemId),
}

/// Result of [`Membrane::enqueue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The item was queued.
    Accepted,
    /// The item was queued and the oldest item of its tier was dropped.
    Evicted(ItemId),
    /// The item failed validation and was discarded.
    Rejected(RejectReason),
}

impl EnqueueOutcome {
    /// `true` if the item is now queued.
    pub fn is_queued(&self) -> bool {
        !matches!(self, EnqueueOutcome::Rejected(_))
    }
}

/// Options for one drain cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainOptions {
    /// Drain tier 3 regardless of the mode.
    pub bypass: bool,
    /// The host is shutting down; prefer delivery that survives it.
    pub terminating: bool,
}

/// What happened to one tier during a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierOutcome {
    /// The mode did not permit draining this tier.
    Denied,
    /// Another drain of this tier was already in progress.
    Busy,
    /// The queue was emptied.
    Completed {
        /// Items delivered.
        delivered: usize,
    },
    /// A delivery failed; the remaining items wait for the next cycle.
    Stalled {
        /// Items delivered before the failure.
        delivered: usize,
    },
}

impl TierOutcome {
    fn delivered(self) -> usize {
        match self {
            TierOutcome::Completed { delivered } | TierOutcome::Stalled { delivered } => delivered,
            TierOutcome::Denied | TierOutcome::Busy => 0,
        }
    }
}

/// Summary of a drain cycle, indexed by tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Outcome per tier.
    pub tiers: [TierOutcome; PriorityTier::COUNT],
    /// Items dropped as duplicates before draining.
    pub deduplicated: usize,
}

impl DrainReport {
    /// Items delivered across all tiers.
    pub fn delivered(&self) -> usize {
        self.tiers.iter().map(|t| t.delivered()).sum()
    }

    /// The outcome for `tier`.
    pub fn tier(&self, tier: PriorityTier) -> TierOutcome {
        self.tiers[tier.index()]
    }
}

/// Counters since the membrane was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MembraneStats {
    /// Items accepted.
    pub enqueued: u64,
    /// Items refused by validation.
    pub rejected: u64,
    /// Items confirmed by the transport.
    pub delivered: u64,
    /// Failed delivery attempts.
    pub failed: u64,
    /// Items dropped to respect the capacity.
    pub evicted: u64,
    /// Items dropped as duplicates.
    pub deduplicated: u64,
}

#[derive(Default)]
struct StatCounters {
    enqueued: AtomicU64,
    rejected: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    evicted: AtomicU64,
    deduplicated: AtomicU64,
}

impl StatCounters {
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    fn snapshot(&self) -> MembraneStats {
        MembraneStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            deduplicated: self.deduplicated.load(Ordering::Relaxed),
        }
    }
}

/// Clears a tier's draining flag when the drain ends, however it ends.
struct DrainGuard<'a>(&'a AtomicBool);

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct MembraneInner {
    config: MembraneConfig,
    queues: [Mutex<TierQueue>; PriorityTier::COUNT],
    draining: [AtomicBool; PriorityTier::COUNT],
    oracle: Arc<dyn ModeOracle>,
    transport: AdaptiveTransport,
    refiner: Option<RefineClient>,
    stats: StatCounters,
    timer: Mutex<Option<JoinHandle<()>>>,
    terminated: AtomicBool,
}

/// Priority-tiered outbound buffer. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Membrane {
    inner: Arc<MembraneInner>,
}

impl Membrane {
    /// Creates a membrane. `refiner` is optional; without it cycles never
    /// deduplicate.
    pub fn new(
        config: MembraneConfig,
        oracle: Arc<dyn ModeOracle>,
        transport: AdaptiveTransport,
        refiner: Option<RefineClient>,
    ) -> Self {
        let config = config.validated();
        let capacity = config.tier_capacity;
        log::info!(
            "Membrane initialized (interval {:?}, capacity {capacity}/tier, refiner {}).",
            config.drain_interval,
            if refiner.is_some() { "on" } else { "off" }
        );
        Self {
            inner: Arc::new(MembraneInner {
                queues: std::array::from_fn(|_| Mutex::new(TierQueue::new(capacity))),
                draining: std::array::from_fn(|_| AtomicBool::new(false)),
                config,
                oracle,
                transport,
                refiner,
                stats: StatCounters::default(),
                timer: Mutex::new(None),
                terminated: AtomicBool::new(false),
            }),
        }
    }

    /// The effective configuration.
    pub fn config(&self) -> &MembraneConfig {
        &self.inner.config
    }

    /// Validates and queues `item`.
    ///
    /// Ids are unique within a tier: an item whose id is already queued in
    /// its tier is rejected.
    ///
    /// A vital item also triggers an immediate drain of tier 0 when called
    /// from within a tokio runtime; otherwise it waits for the next cycle.
    pub fn enqueue(&self, item: MembraneItem) -> EnqueueOutcome {
        let inner = &self.inner;
        if let Err(reason) = inner.validate(&item) {
            log::warn!("Membrane: rejected item {}: {reason}", item.id);
            StatCounters::bump(&inner.stats.rejected, 1);
            return EnqueueOutcome::Rejected(reason);
        }

        let tier = item.tier;
        let evicted = {
            let mut queue = inner.queue(tier);
            if queue.contains(&item.id) {
                drop(queue);
                log::warn!("Membrane: rejected item {}: already queued in tier {tier}.", item.id);
                StatCounters::bump(&inner.stats.rejected, 1);
                return EnqueueOutcome::Rejected(RejectReason::DuplicateId(item.id));
            }
            queue.push(item)
        };
        StatCounters::bump(&inner.stats.enqueued, 1);

        let outcome = match evicted {
            Some(old) => {
                StatCounters::bump(&inner.stats.evicted, 1);
                if tier <= PriorityTier::OPERATIONAL {
                    log::warn!("Membrane: tier {tier} full, evicted {}.", old.id);
                } else {
                    log::debug!("Membrane: tier {tier} full, evicted {}.", old.id);
                }
                EnqueueOutcome::Evicted(old.id)
            }
            None => EnqueueOutcome::Accepted,
        };

        if tier == PriorityTier::VITAL {
            match Handle::try_current() {
                Ok(handle) => {
                    let inner = Arc::clone(inner);
                    handle.spawn(async move {
                        inner
                            .drain_tier(PriorityTier::VITAL, DrainOptions::default())
                            .await;
                    });
                }
                Err(_) => log::debug!("Membrane: no runtime, vital item waits for next cycle."),
            }
        }
        outcome
    }

    /// Runs one drain cycle over every tier.
    ///
    /// Tiers drain concurrently, started in tier order, so a stalled tier
    /// never holds back the others.
    pub async fn drain_cycle(&self, options: DrainOptions) -> DrainReport {
        self.inner.drain_cycle(options).await
    }

    /// Drains with the tier-3 gate bypassed and waits for the result.
    pub async fn flush(&self) -> DrainReport {
        self.drain_cycle(DrainOptions {
            bypass: true,
            terminating: false,
        })
        .await
    }

    /// Starts the periodic drain timer. Returns `false` if it is already
    /// running, the membrane was terminated, or no tokio runtime is available.
    pub fn start(&self) -> bool {
        if self.inner.terminated.load(Ordering::SeqCst) {
            return false;
        }
        let mut timer = self.inner.lock_timer();
        if timer.is_some() {
            return false;
        }
        let Ok(handle) = Handle::try_current() else {
            log::warn!("Membrane: cannot start drain timer outside a tokio runtime.");
            return false;
        };

        let weak: Weak<MembraneInner> = Arc::downgrade(&self.inner);
        let period = self.inner.config.drain_interval;
        *timer = Some(handle.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.drain_cycle(DrainOptions::default()).await;
            }
            log::debug!("Membrane: drain timer exited.");
        }));
        log::debug!("Membrane: drain timer started ({period:?}).");
        true
    }

    /// Stops the periodic drain timer. Queued items stay queued.
    pub fn stop(&self) {
        if let Some(timer) = self.inner.lock_timer().take() {
            timer.abort();
            log::debug!("Membrane: drain timer stopped.");
        }
    }

    /// Host termination: stops the timer and launches one best-effort drain
    /// that bypasses the tier-3 gate and prefers beacons.
    ///
    /// Fires at most once. Returns `true` if the drain was launched.
    pub fn terminate(&self) -> bool {
        if self.inner.terminated.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.stop();
        let Ok(handle) = Handle::try_current() else {
            log::warn!("Membrane: terminate called outside a tokio runtime, nothing drained.");
            return false;
        };
        let inner = Arc::clone(&self.inner);
        handle.spawn(async move {
            let report = inner
                .drain_cycle(DrainOptions {
                    bypass: true,
                    terminating: true,
                })
                .await;
            log::info!("Membrane: termination drain sent {} items.", report.delivered());
        });
        true
    }

    /// Number of items queued in `tier`.
    pub fn pending(&self, tier: PriorityTier) -> usize {
        self.inner.queue(tier).len()
    }

    /// Ids queued in `tier`, oldest first.
    pub fn pending_ids(&self, tier: PriorityTier) -> Vec<ItemId> {
        self.inner
            .queue(tier)
            .iter()
            .map(|item| item.id.clone())
            .collect()
    }

    /// Counters since creation.
    pub fn stats(&self) -> MembraneStats {
        self.inner.stats.snapshot()
    }
}

impl std::fmt::Debug for Membrane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pending: Vec<usize> = PriorityTier::ALL.iter().map(|t| self.pending(*t)).collect();
        f.debug_struct("Membrane")
            .field("pending", &pending)
            .field("stats", &self.stats())
            .finish()
    }
}

impl MembraneInner {
    fn queue(&self, tier: PriorityTier) -> MutexGuard<'_, TierQueue> {
        self.queues[tier.index()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_timer(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn validate(&self, item: &MembraneItem) -> Result<(), RejectReason> {
        if item.destination.trim().is_empty() {
            return Err(RejectReason::EmptyDestination);
        }
        if self.transport.endpoints().resolve(&item.destination).is_none() {
            return Err(RejectReason::UnknownDestination(item.destination.clone()));
        }
        Ok(())
    }

    fn may_drain(&self, tier: PriorityTier, options: DrainOptions) -> bool {
        (options.bypass && tier == PriorityTier::BEHAVIORAL)
            || self.oracle.consult_permit(PermitRequest::new(tier))
    }

    async fn drain_cycle(&self, options: DrainOptions) -> DrainReport {
        let gates = PriorityTier::ALL.map(|tier| self.may_drain(tier, options));
        let deduplicated = self.refine(&gates).await;

        let (vital, operational, resilient, behavioral) = tokio::join!(
            self.gated_drain(PriorityTier::VITAL, gates[0], options),
            self.gated_drain(PriorityTier::OPERATIONAL, gates[1], options),
            self.gated_drain(PriorityTier::RESILIENT, gates[2], options),
            self.gated_drain(PriorityTier::BEHAVIORAL, gates[3], options),
        );
        let report = DrainReport {
            tiers: [vital, operational, resilient, behavioral],
            deduplicated,
        };
        log::trace!("Membrane: cycle finished: {report:?}");
        report
    }

    async fn gated_drain(&self, tier: PriorityTier, open: bool, options: DrainOptions) -> TierOutcome {
        if !open {
            return TierOutcome::Denied;
        }
        self.drain_tier(tier, options).await
    }

    /// Drops duplicate items from the open deferrable tiers.
    async fn refine(&self, gates: &[bool; PriorityTier::COUNT]) -> usize {
        let Some(refiner) = &self.refiner else {
            return 0;
        };
        let mut removed = 0;
        for tier in [PriorityTier::RESILIENT, PriorityTier::BEHAVIORAL] {
            if !gates[tier.index()] {
                continue;
            }
            let entries: Vec<RefineEntry> = {
                let queue = self.queue(tier);
                if queue.len() < 2 {
                    continue;
                }
                queue
                    .iter()
                    .map(|item| RefineEntry {
                        id: item.id.clone(),
                        destination: item.destination.clone(),
                        bytes: item.payload.as_bytes().to_vec(),
                    })
                    .collect()
            };
            let Some(dropped) = refiner.refine(entries, self.config.refine_timeout).await else {
                continue;
            };
            if dropped.is_empty() {
                continue;
            }
            let dropped: HashSet<ItemId> = dropped.into_iter().collect();
            let count = self.queue(tier).remove_ids(&dropped);
            StatCounters::bump(&self.stats.deduplicated, count as u64);
            log::debug!("Membrane: dropped {count} duplicate items from tier {tier}.");
            removed += count;
        }
        removed
    }

    async fn drain_tier(&self, tier: PriorityTier, options: DrainOptions) -> TierOutcome {
        let mut delivered = 0;
        let mut rechecked = false;
        loop {
            let Some(guard) = DrainGuard::acquire(&self.draining[tier.index()]) else {
                return if rechecked {
                    TierOutcome::Completed { delivered }
                } else {
                    TierOutcome::Busy
                };
            };
            match self.drain_held(tier, options).await {
                TierOutcome::Completed { delivered: pass } => {
                    delivered += pass;
                    if !self.release(tier, guard) {
                        return TierOutcome::Completed { delivered };
                    }
                    rechecked = true;
                }
                TierOutcome::Stalled { delivered: pass } => {
                    return TierOutcome::Stalled {
                        delivered: delivered + pass,
                    };
                }
                other => return other,
            }
        }
    }

    /// Releases the tier's drain flag. Returns `true` if items are queued,
    /// which happens when an enqueue found the tier busy just before release.
    fn release(&self, tier: PriorityTier, guard: DrainGuard<'_>) -> bool {
        drop(guard);
        self.queue(tier).len() > 0
    }

    /// Delivers the tier front to back. The caller holds the drain flag.
    async fn drain_held(&self, tier: PriorityTier, options: DrainOptions) -> TierOutcome {
        let mut delivered = 0;
        loop {
            let next = self
                .queue(tier)
                .front()
                .map(|item| (item.id.clone(), item.destination.clone(), item.payload.to_wire()));
            let Some((id, destination, wire)) = next else {
                return TierOutcome::Completed { delivered };
            };

            match self
                .transport
                .deliver(tier, &destination, wire, options.terminating)
                .await
            {
                Ok(route) => {
                    if self.queue(tier).pop_front_if(&id) {
                        delivered += 1;
                        StatCounters::bump(&self.stats.delivered, 1);
                    }
                    log_delivery(&id, tier, route);
                }
                Err(e) => {
                    self.queue(tier).mark_retry(&id);
                    StatCounters::bump(&self.stats.failed, 1);
                    log::warn!(
                        "Membrane: delivery of {id} (tier {tier}) failed: {e}. Retrying next cycle."
                    );
                    return TierOutcome::Stalled { delivered };
                }
            }
        }
    }
}

fn log_delivery(id: &ItemId, tier: PriorityTier, route: DeliveryRoute) {
    log::trace!("Membrane: delivered {id} (tier {tier}) via {route:?}.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::EndpointMap;
    use async_trait::async_trait;
    use nerva_core::transport::{RequestOptions, Transport, TransportError, WirePayload};
    use nerva_core::{ModeCell, OperatingMode};

    #[derive(Default)]
    struct CountingTransport {
        posts: Mutex<usize>,
    }

    #[async_trait]
    impl Transport for CountingTransport {
        fn send_beacon(&self, _url: &str, _payload: &WirePayload) -> bool {
            false
        }

        async fn post(
            &self,
            _url: &str,
            _payload: WirePayload,
            _options: RequestOptions,
        ) -> Result<(), TransportError> {
            *self.posts.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn membrane() -> (Membrane, Arc<CountingTransport>) {
        let transport = Arc::new(CountingTransport::default());
        let oracle: Arc<dyn ModeOracle> = Arc::new(ModeCell::new(OperatingMode::Balanced));
        let endpoints = EndpointMap::new().with_default("https://collector.example/in");
        let membrane = Membrane::new(
            MembraneConfig::default(),
            oracle,
            AdaptiveTransport::new(transport.clone(), endpoints).with_beacon(false),
            None,
        );
        (membrane, transport)
    }

    #[tokio::test]
    async fn test_vital_item_racing_drain_release_is_not_stranded() {
        let (membrane, transport) = membrane();
        let inner = &membrane.inner;

        // A drain of tier 0 that already found its queue empty but has not
        // released the flag yet.
        let guard = DrainGuard::acquire(&inner.draining[PriorityTier::VITAL.index()]).unwrap();
        membrane.enqueue(MembraneItem::new(PriorityTier::VITAL, "crash", "late"));
        tokio::task::yield_now().await;
        assert_eq!(membrane.pending(PriorityTier::VITAL), 1);
        assert_eq!(*transport.posts.lock().unwrap(), 0);

        assert!(inner.release(PriorityTier::VITAL, guard));
        assert_eq!(
            inner.drain_tier(PriorityTier::VITAL, DrainOptions::default()).await,
            TierOutcome::Completed { delivered: 1 }
        );
        assert_eq!(membrane.pending(PriorityTier::VITAL), 0);
        assert!(!inner.release(
            PriorityTier::VITAL,
            DrainGuard::acquire(&inner.draining[PriorityTier::VITAL.index()]).unwrap()
        ));
    }

    #[tokio::test]
    async fn test_busy_tier_is_skipped() {
        let (membrane, _) = membrane();
        let inner = &membrane.inner;
        let _guard = DrainGuard::acquire(&inner.draining[PriorityTier::RESILIENT.index()]).unwrap();
        assert_eq!(
            inner.drain_tier(PriorityTier::RESILIENT, DrainOptions::default()).await,
            TierOutcome::Busy
        );
    }
}
