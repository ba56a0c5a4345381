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

use super::CapabilityError;
use crate::platform::PlatformCapabilities;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Result of [`SignalSegment::wait_timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The slot did not hold the expected value, so no wait happened.
    NotEqual,
    /// The slot changed, or a notify arrived, before the deadline.
    Woken,
    /// The deadline passed with the slot unchanged.
    TimedOut,
    /// The index is past the end of the segment.
    OutOfRange,
}

struct SegmentInner {
    slots: Box<[AtomicU32]>,
    // Epoch bumped by every notify; waiters sleep on it.
    epoch: Mutex<u64>,
    wake: Condvar,
}

/// A fixed array of atomic 32-bit slots shared by clones of this handle.
///
/// Obtained through [`SignalSegment::negotiate`], which fails when the
/// platform does not allow shared memory.
#[derive(Clone)]
pub struct SignalSegment {
    inner: Arc<SegmentInner>,
}

impl SignalSegment {
    /// Allocates `slots` zeroed slots if `capabilities` allow it.
    pub fn negotiate(
        capabilities: &PlatformCapabilities,
        slots: usize,
    ) -> Result<Self, CapabilityError> {
        if !capabilities.shared_memory {
            log::warn!("SignalSegment: shared memory requested but unavailable.");
            return Err(CapabilityError::SharedMemoryUnavailable);
        }
        if slots == 0 {
            return Err(CapabilityError::EmptySegment);
        }
        let slots: Box<[AtomicU32]> = (0..slots).map(|_| AtomicU32::new(0)).collect();
        log::debug!("SignalSegment: negotiated {} slots.", slots.len());
        Ok(Self {
            inner: Arc::new(SegmentInner {
                slots,
                epoch: Mutex::new(0),
                wake: Condvar::new(),
            }),
        })
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.inner.slots.len()
    }

    /// Always `false` for a negotiated segment.
    pub fn is_empty(&self) -> bool {
        self.inner.slots.is_empty()
    }

    /// Atomically reads a slot. `None` if `index` is out of range.
    pub fn load(&self, index: usize) -> Option<u32> {
        self.inner.slots.get(index).map(|s| s.load(Ordering::Acquire))
    }

    /// Atomically writes a slot. Returns `false` if `index` is out of range.
    pub fn store(&self, index: usize, value: u32) -> bool {
        match self.inner.slots.get(index) {
            Some(slot) => {
                slot.store(value, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Wakes every thread blocked in [`wait_timeout`](Self::wait_timeout).
    pub fn notify(&self) {
        let mut epoch = self
            .inner
            .epoch
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *epoch = epoch.wrapping_add(1);
        self.inner.wake.notify_all();
    }

    /// Blocks while slot `index` still holds `expected`, up to `timeout`.
    pub fn wait_timeout(&self, index: usize, expected: u32, timeout: Duration) -> WaitOutcome {
        let Some(slot) = self.inner.slots.get(index) else {
            return WaitOutcome::OutOfRange;
        };
        let deadline = Instant::now() + timeout;
        let mut epoch = self
            .inner
            .epoch
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.load(Ordering::Acquire) != expected {
            return WaitOutcome::NotEqual;
        }
        let start_epoch = *epoch;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return WaitOutcome::TimedOut;
            }
            let (guard, _) = self
                .inner
                .wake
                .wait_timeout(epoch, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            epoch = guard;
            if *epoch != start_epoch || slot.load(Ordering::Acquire) != expected {
                return WaitOutcome::Woken;
            }
        }
    }
}

impl std::fmt::Debug for SignalSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalSegment")
            .field("slots", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_negotiate_requires_shared_memory() {
        let result = SignalSegment::negotiate(&PlatformCapabilities::restricted(), 4);
        assert_eq!(result.unwrap_err(), CapabilityError::SharedMemoryUnavailable);

        let result = SignalSegment::negotiate(&PlatformCapabilities::native(), 0);
        assert_eq!(result.unwrap_err(), CapabilityError::EmptySegment);
    }

    #[test]
    fn test_load_store_bounds() {
        let segment = SignalSegment::negotiate(&PlatformCapabilities::native(), 2).unwrap();
        assert_eq!(segment.len(), 2);
        assert!(segment.store(1, 7));
        assert_eq!(segment.load(1), Some(7));
        assert!(!segment.store(2, 1));
        assert_eq!(segment.load(2), None);
        assert_eq!(
            segment.wait_timeout(5, 0, Duration::from_millis(1)),
            WaitOutcome::OutOfRange
        );
    }

    #[test]
    fn test_wait_returns_immediately_on_mismatch() {
        let segment = SignalSegment::negotiate(&PlatformCapabilities::native(), 1).unwrap();
        segment.store(0, 3);
        assert_eq!(
            segment.wait_timeout(0, 0, Duration::from_secs(5)),
            WaitOutcome::NotEqual
        );
    }

    #[test]
    fn test_wait_times_out_without_notify() {
        let segment = SignalSegment::negotiate(&PlatformCapabilities::native(), 1).unwrap();
        assert_eq!(
            segment.wait_timeout(0, 0, Duration::from_millis(20)),
            WaitOutcome::TimedOut
        );
    }

    #[test]
    fn test_store_and_notify_wakes_waiter() {
        let segment = SignalSegment::negotiate(&PlatformCapabilities::native(), 1).unwrap();
        let writer = segment.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            writer.store(0, 1);
            writer.notify();
        });
        let outcome = segment.wait_timeout(0, 0, Duration::from_secs(5));
        handle.join().expect("writer thread failed");
        assert_eq!(outcome, WaitOutcome::Woken);
        assert_eq!(segment.load(0), Some(1));
    }
}
