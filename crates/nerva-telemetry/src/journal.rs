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

//! Bounded in-memory journal of mode transitions.

use nerva_core::telemetry::{ForensicSink, ModeTransition};
use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Mutex, PoisonError};

/// Keeps the most recent transitions, oldest first.
#[derive(Debug)]
pub struct ForensicJournal {
    entries: Mutex<VecDeque<ModeTransition>>,
    capacity: usize,
}

impl ForensicJournal {
    /// Creates a journal holding at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            capacity,
        }
    }

    /// Copies out the retained transitions.
    pub fn entries(&self) -> Vec<ModeTransition> {
        self.lock().iter().cloned().collect()
    }

    /// Number of retained transitions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every retained transition.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Writes one JSON object per line. Returns the number of lines written.
    pub fn write_json_lines<W: Write>(&self, mut writer: W) -> anyhow::Result<usize> {
        let entries = self.entries();
        for entry in &entries {
            serde_json::to_writer(&mut writer, entry)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(entries.len())
    }

    /// The journal as a JSON-lines string.
    pub fn to_json_lines(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        self.write_json_lines(&mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<ModeTransition>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ForensicSink for ForensicJournal {
    fn record(&self, transition: &ModeTransition) {
        let mut entries = self.lock();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(transition.clone());
        log::debug!(
            "Forensics: recorded {} -> {} ({} retained).",
            transition.from,
            transition.to,
            entries.len()
        );
    }
}
