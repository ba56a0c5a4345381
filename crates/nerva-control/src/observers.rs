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

//! Observer bookkeeping for mode changes.
//!
//! Each observer remembers the generation of the last mode it was given, so
//! a late delivery can never overwrite a newer one.

use nerva_core::{ModeCell, OperatingMode};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, Weak};

type ModeCallback = Arc<dyn Fn(OperatingMode) + Send + Sync>;

struct ObserverEntry {
    id: u64,
    callback: ModeCallback,
    last_generation: Mutex<Option<u64>>,
}

#[derive(Default)]
struct ObserverTable {
    next_id: u64,
    entries: Vec<Arc<ObserverEntry>>,
}

/// The set of callbacks interested in mode changes.
#[derive(Clone, Default)]
pub struct ObserverSet {
    table: Arc<Mutex<ObserverTable>>,
}

impl ObserverSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` and immediately delivers the mode held by `cell`.
    ///
    /// The cell is read only after the observer is in the table, so a change
    /// committed concurrently reaches it either here or through [`notify`](Self::notify).
    pub fn add<F>(&self, callback: F, cell: &ModeCell) -> ObserverHandle
    where
        F: Fn(OperatingMode) + Send + Sync + 'static,
    {
        let entry = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            table.next_id += 1;
            let entry = Arc::new(ObserverEntry {
                id: table.next_id,
                callback: Arc::new(callback),
                last_generation: Mutex::new(None),
            });
            table.entries.push(entry.clone());
            entry
        };
        let (generation, mode) = cell.versioned();
        deliver(&entry, generation, mode);
        ObserverHandle {
            id: entry.id,
            table: Arc::downgrade(&self.table),
        }
    }

    /// Delivers `mode` at `generation` to every observer, in registration order.
    pub fn notify(&self, generation: u64, mode: OperatingMode) -> usize {
        let entries = self
            .table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .clone();
        entries
            .iter()
            .filter(|entry| deliver(entry, generation, mode))
            .count()
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    /// `true` if nobody is observing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverSet")
            .field("observers", &self.len())
            .finish()
    }
}

fn deliver(entry: &ObserverEntry, generation: u64, mode: OperatingMode) -> bool {
    let mut last = entry
        .last_generation
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if last.is_some_and(|seen| seen >= generation) {
        return false;
    }
    *last = Some(generation);
    let callback = &entry.callback;
    if catch_unwind(AssertUnwindSafe(|| callback(mode))).is_err() {
        log::error!(
            "Governor: observer {} panicked while handling mode {}.",
            entry.id,
            mode
        );
    }
    true
}

/// Returned by [`ObserverSet::add`]. Dropping it keeps the observer registered.
#[derive(Debug)]
pub struct ObserverHandle {
    id: u64,
    table: Weak<Mutex<ObserverTable>>,
}

impl ObserverHandle {
    /// Removes the observer. Returns `false` if it was already gone.
    pub fn unsubscribe(self) -> bool {
        let Some(table) = self.table.upgrade() else {
            return false;
        };
        let mut table = table.lock().unwrap_or_else(PoisonError::into_inner);
        let before = table.entries.len();
        table.entries.retain(|entry| entry.id != self.id);
        table.entries.len() != before
    }
}
