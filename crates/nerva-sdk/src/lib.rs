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

//! The public-facing API of the nerva runtime.
//!
//! A [`Nerva`] is the one explicit context object an application builds at
//! start-up. It owns the opcode registry, the resource governor, the message
//! bus and the backpressure membrane, and hands out references to them;
//! nothing in the runtime lives in a global.
//!
//! ```no_run
//! use nerva_sdk::prelude::*;
//!
//! # async fn boot() -> anyhow::Result<()> {
//! let nerva = Nerva::builder()
//!     .config(NervaConfig::load("nerva.json")?)
//!     .dialect(Dialect::new("session", 1, 1).operation("start", 1))
//!     .build()?;
//! nerva.ignite();
//! nerva.emit(PriorityTier::BEHAVIORAL, "telemetry", "clicked");
//! # Ok(())
//! # }
//! ```

pub mod config;

pub use config::{ConfigError, NervaConfig};

use anyhow::Result;
use nerva_control::{ObserverHandle, ResourceGovernor};
use nerva_core::event::{MessageBus, TopicCode};
use nerva_core::memory::{CapabilityError, SignalSegment};
use nerva_core::platform::SensorSource;
use nerva_core::transport::Transport;
use nerva_core::{
    CompoundOpcode, Dialect, ModeOracle, OpcodeRegistry, OperatingMode, PermitRequest,
    PlatformCapabilities, PriorityTier, Severity,
};
use nerva_infra::HttpTransport;
use nerva_io::{
    AdaptiveTransport, EnqueueOutcome, Membrane, MembraneItem, Payload, RefineClient,
};
use nerva_telemetry::ForensicJournal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Commonly used types, for glob import.
pub mod prelude {
    pub use crate::{Intention, Nerva, NervaBuilder, NervaConfig, Reaction};
    pub use nerva_core::event::TopicCode;
    pub use nerva_core::{
        CompoundOpcode, Dialect, OperatingMode, PermitRequest, PriorityTier, Severity,
    };
    pub use nerva_io::{EnqueueOutcome, ItemId, MembraneItem, Payload};
}

/// A request travelling on the intention stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intention {
    /// Importance of the work the intention asks for.
    pub tier: PriorityTier,
    /// Free-form request body.
    pub body: serde_json::Value,
}

impl Intention {
    /// Creates an intention.
    pub fn new(tier: PriorityTier, body: serde_json::Value) -> Self {
        Self { tier, body }
    }
}

/// A result travelling back on the reaction stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    /// Opcode of the intention this answers.
    pub answers: TopicCode,
    /// Result body, or an error description.
    pub outcome: std::result::Result<serde_json::Value, String>,
}

/// The runtime context.
pub struct Nerva {
    config: NervaConfig,
    capabilities: PlatformCapabilities,
    registry: Arc<OpcodeRegistry>,
    governor: Arc<ResourceGovernor>,
    bus: Arc<MessageBus<Intention, Reaction>>,
    membrane: Membrane,
    journal: Option<Arc<ForensicJournal>>,
    sensors: Vec<Arc<dyn SensorSource>>,
}

impl Nerva {
    /// Starts building a context.
    pub fn builder() -> NervaBuilder {
        NervaBuilder::default()
    }

    /// Starts the governor's sensors and the membrane's drain timer.
    ///
    /// Must be called from within a tokio runtime for the timer to run.
    /// Returns the number of sensors attached.
    pub fn ignite(&self) -> usize {
        let attached = self.governor.ignite(&self.sensors);
        if !self.membrane.start() {
            log::warn!("Nerva: membrane drain timer not started.");
        }
        attached
    }

    /// The effective configuration.
    pub fn config(&self) -> &NervaConfig {
        &self.config
    }

    /// The sealed opcode registry.
    pub fn registry(&self) -> &Arc<OpcodeRegistry> {
        &self.registry
    }

    /// The resource governor.
    pub fn governor(&self) -> &Arc<ResourceGovernor> {
        &self.governor
    }

    /// The message bus.
    pub fn bus(&self) -> &Arc<MessageBus<Intention, Reaction>> {
        &self.bus
    }

    /// The backpressure membrane.
    pub fn membrane(&self) -> &Membrane {
        &self.membrane
    }

    /// The forensic journal, when forensic logging is enabled.
    pub fn journal(&self) -> Option<&Arc<ForensicJournal>> {
        self.journal.as_ref()
    }

    /// The current operating mode.
    pub fn current_mode(&self) -> OperatingMode {
        self.governor.current_mode()
    }

    /// Whether work at `tier` may run now.
    pub fn consult_permit(&self, tier: PriorityTier) -> bool {
        self.governor.consult_permit(PermitRequest::new(tier))
    }

    /// Registers a mode observer.
    pub fn observe<F>(&self, callback: F) -> ObserverHandle
    where
        F: Fn(OperatingMode) + Send + Sync + 'static,
    {
        self.governor.observe(callback)
    }

    /// Forges an opcode from registered identifiers.
    pub fn forge(&self, severity: Severity, apparatus_id: &str, operation_id: &str) -> CompoundOpcode {
        self.registry
            .forge_compound_code(severity, apparatus_id, operation_id)
    }

    /// Queues a payload for `destination`.
    pub fn emit(
        &self,
        tier: PriorityTier,
        destination: &str,
        payload: impl Into<Payload>,
    ) -> EnqueueOutcome {
        self.membrane
            .enqueue(MembraneItem::new(tier, destination, payload))
    }

    /// Negotiates a shared signal segment of `slots` slots.
    pub fn signal_segment(&self, slots: usize) -> Result<SignalSegment, CapabilityError> {
        SignalSegment::negotiate(&self.capabilities, slots)
    }

    /// Host termination: launches the final forced drain and stops the
    /// governor. Idempotent.
    pub fn shutdown(&self) {
        self.membrane.terminate();
        self.governor.stop();
    }
}

impl std::fmt::Debug for Nerva {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Nerva")
            .field("governor", &self.governor)
            .field("membrane", &self.membrane)
            .field("dialects", &self.registry.dialect_count())
            .finish()
    }
}

/// Builder for [`Nerva`].
#[derive(Default)]
pub struct NervaBuilder {
    config: NervaConfig,
    capabilities: Option<PlatformCapabilities>,
    transport: Option<Arc<dyn Transport>>,
    dialects: Vec<Dialect>,
    sensors: Vec<Arc<dyn SensorSource>>,
    refiner: Option<bool>,
}

impl NervaBuilder {
    /// Uses `config` instead of the defaults.
    pub fn config(mut self, config: NervaConfig) -> Self {
        self.config = config.validated();
        self
    }

    /// Declares the platform's capabilities. Defaults to native.
    pub fn capabilities(mut self, capabilities: PlatformCapabilities) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    /// Uses a custom transport instead of HTTP.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Registers a dialect before the registry is sealed.
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialects.push(dialect);
        self
    }

    /// Adds a sensor the governor attaches on ignite.
    pub fn sensor(mut self, sensor: Arc<dyn SensorSource>) -> Self {
        self.sensors.push(sensor);
        self
    }

    /// Enables or disables the background refinement worker. Enabled by
    /// default.
    pub fn refinement(mut self, enabled: bool) -> Self {
        self.refiner = Some(enabled);
        self
    }

    /// Builds the context. The opcode registry is sealed on return.
    pub fn build(self) -> Result<Nerva> {
        let config = self.config;
        let capabilities = self.capabilities.unwrap_or_default();

        let registry = Arc::new(OpcodeRegistry::with_static_dialects());
        for dialect in self.dialects {
            let apparatus = dialect.apparatus_id.clone();
            if !registry.register_dialect(dialect) {
                log::warn!("Nerva: dialect '{apparatus}' was not registered.");
            }
        }
        registry.seal();

        let journal = config
            .forensic_logging
            .then(|| Arc::new(ForensicJournal::new(config.journal_capacity)));
        let mut governor = ResourceGovernor::new(config.governor_config());
        if let Some(journal) = &journal {
            governor = governor.with_forensic_sink(journal.clone());
        }
        let governor = Arc::new(governor);

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new()?),
        };
        let refiner = if self.refiner.unwrap_or(true) {
            RefineClient::spawn()
                .map_err(|e| log::warn!("Nerva: refinement worker unavailable: {e}"))
                .ok()
        } else {
            None
        };
        let oracle: Arc<dyn ModeOracle> = Arc::new(governor.mode_cell());
        let membrane = Membrane::new(
            config.membrane_config(),
            oracle,
            AdaptiveTransport::new(transport, config.endpoint_map())
                .with_beacon(capabilities.beacon),
            refiner,
        );

        let bus = Arc::new(MessageBus::with_congestion_threshold(
            config.congestion_threshold,
        ));

        log::info!(
            "Nerva context built ({} dialects, {} sensors).",
            registry.dialect_count(),
            self.sensors.len()
        );
        Ok(Nerva {
            config,
            capabilities,
            registry,
            governor,
            bus,
            membrane,
            journal,
            sensors: self.sensors,
        })
    }
}
