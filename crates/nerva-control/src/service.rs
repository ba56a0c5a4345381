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

//! Central service for the resource governor.

use crate::observers::{ObserverHandle, ObserverSet};
use crate::tracker::{ModeChange, ModeTracker};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use nerva_core::platform::{SensorError, SensorSink, SensorSource};
use nerva_core::telemetry::{unix_millis, ForensicSink, ModeTransition};
use nerva_core::{ModeCell, ModeOracle, OperatingMode, PermitRequest, ResourceSnapshot, SensorReading};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread;
use std::time::{Duration, Instant};

/// Upper bound on how long the service thread sleeps between checks of its
/// running flag.
const IDLE_POLL: Duration = Duration::from_millis(50);

/// Configuration for the resource governor.
#[derive(Debug, Clone)]
pub struct GovernorConfig {
    /// Quiet period required before a new mode is committed.
    pub debounce: Duration,
    /// Whether committed transitions are handed to the forensic sink.
    pub forensic_logging: bool,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(150),
            forensic_logging: true,
        }
    }
}

/// The resource governor.
///
/// Classifies device conditions into an [`OperatingMode`] on a background
/// thread and serves the mode and the permit oracle synchronously to every
/// other component.
pub struct ResourceGovernor {
    config: GovernorConfig,
    mode: ModeCell,
    snapshot: Arc<RwLock<ResourceSnapshot>>,
    observers: ObserverSet,
    forensics: Option<Arc<dyn ForensicSink>>,
    ignited: AtomicBool,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
    event_tx: Sender<SensorReading>,
    event_rx: Mutex<Option<Receiver<SensorReading>>>,
}

impl ResourceGovernor {
    /// Creates a governor. Nothing runs until [`ignite`](Self::ignite).
    pub fn new(config: GovernorConfig) -> Self {
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let initial = ModeTracker::new(config.debounce).current();
        Self {
            config,
            mode: ModeCell::new(initial),
            snapshot: Arc::new(RwLock::new(ResourceSnapshot::default())),
            observers: ObserverSet::new(),
            forensics: None,
            ignited: AtomicBool::new(false),
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
            event_tx,
            event_rx: Mutex::new(Some(event_rx)),
        }
    }

    /// Sets the destination for forensic transition records.
    pub fn with_forensic_sink(mut self, sink: Arc<dyn ForensicSink>) -> Self {
        self.forensics = Some(sink);
        self
    }

    /// Returns a sink hosts can push readings into directly.
    ///
    /// Readings pushed before [`ignite`](Self::ignite) are queued and
    /// processed once the service thread starts.
    pub fn sensor_sink(&self) -> SensorSink {
        let tx = self.event_tx.clone();
        SensorSink::new(move |reading| {
            if tx.send(reading).is_err() {
                log::trace!("Governor: reading dropped, service is gone.");
            }
        })
    }

    /// Starts the service thread and attaches `sources`.
    ///
    /// Idempotent: only the first call has an effect. Unsupported sensors
    /// are skipped. Returns the number of sensors attached.
    pub fn ignite(&self, sources: &[Arc<dyn SensorSource>]) -> usize {
        if self.ignited.swap(true, Ordering::SeqCst) {
            log::debug!("Governor: already ignited.");
            return 0;
        }
        let Some(event_rx) = self
            .event_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return 0;
        };

        self.running.store(true, Ordering::SeqCst);
        let worker = ServiceWorker {
            tracker: ModeTracker::new(self.config.debounce),
            forensic_logging: self.config.forensic_logging,
            running: Arc::clone(&self.running),
            mode: self.mode.clone(),
            snapshot: Arc::clone(&self.snapshot),
            observers: self.observers.clone(),
            forensics: self.forensics.clone(),
        };
        let spawned = thread::Builder::new()
            .name("nerva-governor".into())
            .spawn(move || worker.run(event_rx));
        match spawned {
            Ok(handle) => {
                *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
            }
            Err(e) => {
                log::error!("Governor: failed to spawn service thread: {e}");
                self.running.store(false, Ordering::SeqCst);
                return 0;
            }
        }

        let mut attached = 0;
        for source in sources {
            match source.attach(self.sensor_sink()) {
                Ok(()) => {
                    log::debug!("Governor: sensor '{}' attached.", source.name());
                    attached += 1;
                }
                Err(SensorError::Unsupported(name)) => {
                    log::debug!("Governor: sensor '{name}' unsupported, continuing without it.");
                }
                Err(e) => {
                    log::warn!("Governor: {e}");
                }
            }
        }
        log::info!(
            "Governor ignited with {attached}/{} sensors in mode {}.",
            sources.len(),
            self.current_mode()
        );
        attached
    }

    /// The last committed mode. O(1).
    pub fn current_mode(&self) -> OperatingMode {
        self.mode.get()
    }

    /// A shareable read handle on the current mode.
    pub fn mode_cell(&self) -> ModeCell {
        self.mode.clone()
    }

    /// The merged snapshot of every reading received so far.
    pub fn snapshot(&self) -> ResourceSnapshot {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Registers `callback`, invoking it now with the current mode and again
    /// on every committed change.
    pub fn observe<F>(&self, callback: F) -> ObserverHandle
    where
        F: Fn(OperatingMode) + Send + Sync + 'static,
    {
        self.observers.add(callback, &self.mode)
    }

    /// Decides whether the requested work may run now. Side-effect free.
    pub fn consult_permit(&self, request: PermitRequest) -> bool {
        ModeOracle::consult_permit(self, request)
    }

    /// Returns `true` while the service thread is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stops the service thread. The governor keeps serving its last mode.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            // An observer may drop the last governor reference from the service thread.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl ModeOracle for ResourceGovernor {
    fn current_mode(&self) -> OperatingMode {
        self.mode.get()
    }
}

impl Drop for ResourceGovernor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for ResourceGovernor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceGovernor")
            .field("mode", &self.current_mode())
            .field("running", &self.is_running())
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// State owned by the service thread.
struct ServiceWorker {
    tracker: ModeTracker,
    forensic_logging: bool,
    running: Arc<AtomicBool>,
    mode: ModeCell,
    snapshot: Arc<RwLock<ResourceSnapshot>>,
    observers: ObserverSet,
    forensics: Option<Arc<dyn ForensicSink>>,
}

impl ServiceWorker {
    fn run(mut self, event_rx: Receiver<SensorReading>) {
        log::info!("Governor service thread started.");

        while self.running.load(Ordering::Relaxed) {
            let wait = self
                .tracker
                .deadline()
                .map(|deadline| deadline.saturating_duration_since(Instant::now()))
                .unwrap_or(IDLE_POLL)
                .min(IDLE_POLL);

            match event_rx.recv_timeout(wait) {
                Ok(reading) => {
                    self.tracker.ingest(&reading, Instant::now());
                    // Drain whatever else is queued before publishing the snapshot.
                    while let Ok(reading) = event_rx.try_recv() {
                        self.tracker.ingest(&reading, Instant::now());
                    }
                    *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) =
                        self.tracker.snapshot().clone();
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            if let Some(change) = self.tracker.poll(Instant::now()) {
                self.commit(change);
            }
        }

        log::info!("Governor service thread stopped.");
    }

    fn commit(&self, change: ModeChange) {
        self.mode.set(change.to);
        log::info!("Governor: mode {} -> {}", change.from, change.to);

        if self.forensic_logging && change.to != OperatingMode::Hibernate {
            if let Some(sink) = &self.forensics {
                let transition = ModeTransition {
                    from: change.from,
                    to: change.to,
                    at_ms: unix_millis(),
                    snapshot: change.snapshot,
                };
                if catch_unwind(AssertUnwindSafe(|| sink.record(&transition))).is_err() {
                    log::error!("Governor: forensic sink panicked; transition not recorded.");
                }
            }
        }

        let (generation, mode) = self.mode.versioned();
        self.observers.notify(generation, mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nerva_core::platform::NetworkClass;
    use nerva_core::PriorityTier;

    const SETTLE: Duration = Duration::from_millis(150);

    fn fast_config() -> GovernorConfig {
        GovernorConfig {
            debounce: Duration::ZERO,
            ..Default::default()
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        transitions: Mutex<Vec<ModeTransition>>,
    }

    impl ForensicSink for RecordingSink {
        fn record(&self, transition: &ModeTransition) {
            self.transitions.lock().unwrap().push(transition.clone());
        }
    }

    struct ScriptedSensor {
        readings: Vec<SensorReading>,
    }

    impl SensorSource for ScriptedSensor {
        fn name(&self) -> &'static str {
            "scripted"
        }
        fn attach(&self, sink: SensorSink) -> Result<(), SensorError> {
            for reading in &self.readings {
                sink.push(reading.clone());
            }
            Ok(())
        }
    }

    struct MissingSensor;

    impl SensorSource for MissingSensor {
        fn name(&self) -> &'static str {
            "battery"
        }
        fn attach(&self, _: SensorSink) -> Result<(), SensorError> {
            Err(SensorError::Unsupported("battery"))
        }
    }

    #[test]
    fn test_governor_lifecycle() {
        let governor = ResourceGovernor::new(fast_config());
        assert_eq!(governor.current_mode(), OperatingMode::Balanced);
        assert!(!governor.is_running());
        governor.ignite(&[]);
        assert!(governor.is_running());
        governor.stop();
        assert!(!governor.is_running());
    }

    #[test]
    fn test_ignite_is_idempotent() {
        let governor = ResourceGovernor::new(fast_config());
        let sensor: Arc<dyn SensorSource> = Arc::new(ScriptedSensor { readings: vec![] });
        assert_eq!(governor.ignite(&[sensor.clone()]), 1);
        assert_eq!(governor.ignite(&[sensor]), 0);
    }

    #[test]
    fn test_unsupported_sensor_is_tolerated() {
        let governor = ResourceGovernor::new(fast_config());
        let sources: Vec<Arc<dyn SensorSource>> = vec![Arc::new(MissingSensor)];
        assert_eq!(governor.ignite(&sources), 0);
        assert!(governor.is_running());
        assert_eq!(governor.current_mode(), OperatingMode::Balanced);
    }

    #[test]
    fn test_emergency_scenario() {
        let governor = ResourceGovernor::new(fast_config());
        let sensor: Arc<dyn SensorSource> = Arc::new(ScriptedSensor {
            readings: vec![
                SensorReading::Battery {
                    level: 0.10,
                    charging: false,
                },
                SensorReading::Visibility { visible: true },
            ],
        });
        governor.ignite(&[sensor]);
        thread::sleep(SETTLE);

        assert_eq!(governor.current_mode(), OperatingMode::Emergency);
        assert!(!governor.consult_permit(PermitRequest::new(PriorityTier::RESILIENT)));
        assert!(governor.consult_permit(PermitRequest::new(PriorityTier::VITAL)));
    }

    #[test]
    fn test_peak_scenario() {
        let governor = ResourceGovernor::new(fast_config());
        let sink = governor.sensor_sink();
        sink.push(SensorReading::Battery {
            level: 0.5,
            charging: true,
        });
        sink.push(SensorReading::Network {
            class: Some(NetworkClass::FourG),
            save_data: false,
        });
        sink.push(SensorReading::Visibility { visible: true });
        governor.ignite(&[]);
        thread::sleep(SETTLE);

        assert_eq!(governor.current_mode(), OperatingMode::Peak);
        assert!(governor.consult_permit(PermitRequest::new(PriorityTier::BEHAVIORAL)));
        assert_eq!(governor.snapshot().network_class, Some(NetworkClass::FourG));
    }

    #[test]
    fn test_observer_sees_initial_and_changed_mode() {
        let governor = ResourceGovernor::new(fast_config());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handle = governor.observe(move |mode| sink.lock().unwrap().push(mode));
        assert_eq!(*seen.lock().unwrap(), vec![OperatingMode::Balanced]);

        governor.ignite(&[]);
        governor.sensor_sink().push(SensorReading::Network {
            class: None,
            save_data: true,
        });
        thread::sleep(SETTLE);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![OperatingMode::Balanced, OperatingMode::Eco]
        );
        assert!(handle.unsubscribe());
    }

    #[test]
    fn test_forensics_skip_hibernate() {
        let recorder = Arc::new(RecordingSink::default());
        let governor = ResourceGovernor::new(fast_config()).with_forensic_sink(recorder.clone());
        governor.ignite(&[]);
        let sink = governor.sensor_sink();

        sink.push(SensorReading::Network {
            class: Some(NetworkClass::TwoG),
            save_data: false,
        });
        thread::sleep(SETTLE);
        sink.push(SensorReading::Visibility { visible: false });
        thread::sleep(SETTLE);
        sink.push(SensorReading::Visibility { visible: true });
        thread::sleep(SETTLE);

        let transitions = recorder.transitions.lock().unwrap();
        let pairs: Vec<_> = transitions.iter().map(|t| (t.from, t.to)).collect();
        assert_eq!(
            pairs,
            vec![
                (OperatingMode::Balanced, OperatingMode::Eco),
                (OperatingMode::Hibernate, OperatingMode::Eco),
            ]
        );
        assert_eq!(governor.current_mode(), OperatingMode::Eco);
    }

    #[test]
    fn test_forensic_logging_can_be_disabled() {
        let recorder = Arc::new(RecordingSink::default());
        let config = GovernorConfig {
            forensic_logging: false,
            ..fast_config()
        };
        let governor = ResourceGovernor::new(config).with_forensic_sink(recorder.clone());
        governor.ignite(&[]);
        governor.sensor_sink().push(SensorReading::Network {
            class: None,
            save_data: true,
        });
        thread::sleep(SETTLE);

        assert_eq!(governor.current_mode(), OperatingMode::Eco);
        assert!(recorder.transitions.lock().unwrap().is_empty());
    }

    #[test]
    fn test_debounce_absorbs_flicker() {
        let governor = ResourceGovernor::new(GovernorConfig {
            debounce: Duration::from_millis(100),
            ..Default::default()
        });
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        governor.observe(move |mode| sink.lock().unwrap().push(mode));
        governor.ignite(&[]);

        let sensors = governor.sensor_sink();
        sensors.push(SensorReading::Visibility { visible: false });
        sensors.push(SensorReading::Visibility { visible: true });
        thread::sleep(Duration::from_millis(300));

        assert_eq!(*seen.lock().unwrap(), vec![OperatingMode::Balanced]);
    }
}
