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

//! Sensor contracts feeding the resource governor.

use super::NetworkClass;
use std::fmt;
use std::sync::Arc;

/// A single update emitted by one sensor.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorReading {
    /// Battery charge and charging state.
    Battery {
        /// Charge in `0.0..=1.0`.
        level: f32,
        /// Whether external power is connected.
        charging: bool,
    },
    /// Network information.
    Network {
        /// Effective class, if the host exposes one.
        class: Option<NetworkClass>,
        /// Data-saver preference.
        save_data: bool,
    },
    /// Page visibility change.
    Visibility {
        /// `false` when the page went to the background.
        visible: bool,
    },
    /// Static device hints.
    Device {
        /// Device memory, in gigabytes.
        memory_gb: Option<f32>,
        /// Logical processor count.
        concurrency: Option<u32>,
    },
}

/// Errors a sensor may report while attaching.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    /// The host does not expose this sensor.
    #[error("sensor `{0}` is not supported on this platform")]
    Unsupported(&'static str),
    /// The sensor exists but could not be attached.
    #[error("sensor `{name}` failed to attach: {reason}")]
    AttachFailed {
        /// Sensor name.
        name: &'static str,
        /// Description of the failure.
        reason: String,
    },
}

/// Callback end handed to sensors. Pushing never fails and never blocks.
#[derive(Clone)]
pub struct SensorSink {
    deliver: Arc<dyn Fn(SensorReading) + Send + Sync>,
}

impl SensorSink {
    /// Wraps a delivery function.
    pub fn new<F>(deliver: F) -> Self
    where
        F: Fn(SensorReading) + Send + Sync + 'static,
    {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    /// Forwards a reading to the governor.
    pub fn push(&self, reading: SensorReading) {
        (self.deliver)(reading);
    }
}

impl fmt::Debug for SensorSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorSink").finish_non_exhaustive()
    }
}

/// A source of resource readings (battery, network, visibility, ...).
pub trait SensorSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Starts forwarding readings to `sink`.
    ///
    /// Returning [`SensorError::Unsupported`] is the normal way to signal
    /// that the host lacks this sensor; the governor carries on without it.
    fn attach(&self, sink: SensorSink) -> Result<(), SensorError>;
}
