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

//! Sensors fed by the embedding host.
//!
//! Native hosts rarely expose battery or network state through a portable
//! API, so the application reports it itself: it keeps a [`ManualSensor`]
//! and calls its setters whenever the platform tells it something changed.

use nerva_core::platform::{NetworkClass, SensorError, SensorSink, SensorSource};
use nerva_core::SensorReading;
use std::sync::{Mutex, PoisonError};

#[derive(Default)]
struct ManualState {
    sink: Option<SensorSink>,
    // Latest reading of each kind reported before the governor attached,
    // in reporting order. Replayed on attach.
    backlog: Vec<SensorReading>,
}

impl ManualState {
    fn hold(&mut self, reading: SensorReading) {
        let kind = std::mem::discriminant(&reading);
        self.backlog
            .retain(|held| std::mem::discriminant(held) != kind);
        self.backlog.push(reading);
    }
}

/// A [`SensorSource`] whose readings are pushed by the host.
pub struct ManualSensor {
    name: &'static str,
    supported: bool,
    state: Mutex<ManualState>,
}

impl ManualSensor {
    /// Creates a sensor named `name`.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            supported: true,
            state: Mutex::new(ManualState::default()),
        }
    }

    /// A sensor the host cannot provide. Attaching it reports
    /// [`SensorError::Unsupported`] and readings pushed to it are ignored.
    pub fn unsupported(name: &'static str) -> Self {
        Self {
            supported: false,
            ..Self::new(name)
        }
    }

    /// Reports a battery change.
    pub fn set_battery(&self, level: f32, charging: bool) {
        self.report(SensorReading::Battery { level, charging });
    }

    /// Reports a network change.
    pub fn set_network(&self, class: Option<NetworkClass>, save_data: bool) {
        self.report(SensorReading::Network { class, save_data });
    }

    /// Reports a visibility change.
    pub fn set_visible(&self, visible: bool) {
        self.report(SensorReading::Visibility { visible });
    }

    /// Reports device hints.
    pub fn set_device(&self, memory_gb: Option<f32>, concurrency: Option<u32>) {
        self.report(SensorReading::Device {
            memory_gb,
            concurrency,
        });
    }

    /// Forwards any reading.
    pub fn report(&self, reading: SensorReading) {
        if !self.supported {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match &state.sink {
            Some(sink) => sink.push(reading),
            None => state.hold(reading),
        }
    }

    /// `true` once a governor attached.
    pub fn is_attached(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sink
            .is_some()
    }
}

impl SensorSource for ManualSensor {
    fn name(&self) -> &'static str {
        self.name
    }

    fn attach(&self, sink: SensorSink) -> Result<(), SensorError> {
        if !self.supported {
            return Err(SensorError::Unsupported(self.name));
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        for reading in state.backlog.drain(..) {
            sink.push(reading);
        }
        if state.sink.replace(sink).is_some() {
            log::debug!("ManualSensor '{}': re-attached, previous sink replaced.", self.name);
        }
        Ok(())
    }
}

impl std::fmt::Debug for ManualSensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualSensor")
            .field("name", &self.name)
            .field("supported", &self.supported)
            .field("attached", &self.is_attached())
            .finish()
    }
}
