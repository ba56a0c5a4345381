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

use async_trait::async_trait;
use nerva_core::memory::CapabilityError;
use nerva_core::platform::{NetworkClass, PlatformCapabilities, SensorSource};
use nerva_core::transport::{RequestOptions, Transport, TransportError, WirePayload};
use nerva_infra::ManualSensor;
use nerva_sdk::prelude::*;
use nerva_sdk::ConfigError;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct CollectingTransport {
    posts: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Transport for CollectingTransport {
    fn send_beacon(&self, _url: &str, _payload: &WirePayload) -> bool {
        false
    }

    async fn post(
        &self,
        url: &str,
        payload: WirePayload,
        _options: RequestOptions,
    ) -> Result<(), TransportError> {
        let body = String::from_utf8_lossy(payload.as_bytes()).into_owned();
        self.posts.lock().unwrap().push((url.to_string(), body));
        Ok(())
    }
}

fn config() -> NervaConfig {
    NervaConfig::from_json_str(
        r#"{
            "debounce_ms": 0,
            "endpoints": { "telemetry": "https://collector.example/t" }
        }"#,
    )
    .unwrap()
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[test]
fn test_load_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"{{ "drain_interval_ms": 2000, "tier_capacity": 10, "forensic_logging": false }}"#
    )
    .unwrap();

    let config = NervaConfig::load(file.path()).unwrap();
    assert_eq!(config.drain_interval_ms, 2_000);
    assert_eq!(config.tier_capacity, 10);
    assert!(!config.forensic_logging);
}

#[test]
fn test_missing_config_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = NervaConfig::load(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[tokio::test]
async fn test_builder_seals_registry_with_dialects() {
    let nerva = Nerva::builder()
        .config(config())
        .transport(Arc::new(CollectingTransport::default()))
        .dialect(Dialect::new("session", 3, 1).operation("start", 1).operation("end", 2))
        .build()
        .unwrap();

    let registry = nerva.registry();
    assert!(registry.is_sealed());
    assert!(!registry.register_dialect(Dialect::new("late", 4, 1).operation("x", 1)));
    assert_eq!(registry.apparatus_code("late"), 0);

    let code = nerva.forge(Severity::Info, "session", "end");
    assert_eq!(code.apparatus(), 3);
    assert_eq!(code.operation(), 2);
    assert_eq!(registry.resolve_operation("session", code.operation()), "end");
}

#[tokio::test]
async fn test_sensor_drives_mode_and_membrane_gate() {
    let sensor = Arc::new(ManualSensor::new("host"));
    let transport = Arc::new(CollectingTransport::default());
    let nerva = Nerva::builder()
        .config(config())
        .transport(transport.clone())
        .sensor(sensor.clone() as Arc<dyn SensorSource>)
        .refinement(false)
        .build()
        .unwrap();
    assert_eq!(nerva.ignite(), 1);

    sensor.set_visible(true);
    sensor.set_battery(0.10, false);
    wait_for(|| nerva.current_mode() == OperatingMode::Emergency).await;
    assert_eq!(nerva.current_mode(), OperatingMode::Emergency);
    assert!(!nerva.consult_permit(PriorityTier::RESILIENT));
    assert!(nerva.consult_permit(PriorityTier::VITAL));

    assert!(nerva.emit(PriorityTier::RESILIENT, "telemetry", "sync").is_queued());
    let report = nerva.membrane().drain_cycle(Default::default()).await;
    assert_eq!(report.delivered(), 0);

    // Battery still critical, so the network change alone keeps EMERGENCY.
    sensor.set_network(Some(NetworkClass::FourG), false);
    sensor.set_battery(0.9, true);
    wait_for(|| nerva.current_mode() == OperatingMode::Peak).await;
    assert!(nerva.consult_permit(PriorityTier::BEHAVIORAL));

    nerva.membrane().drain_cycle(Default::default()).await;
    assert_eq!(
        *transport.posts.lock().unwrap(),
        vec![("https://collector.example/t".to_string(), "sync".to_string())]
    );

    let journal = nerva.journal().expect("forensic logging is on by default");
    let modes: Vec<_> = journal.entries().iter().map(|t| t.to).collect();
    assert_eq!(modes, vec![OperatingMode::Emergency, OperatingMode::Peak]);

    nerva.shutdown();
}

#[tokio::test]
async fn test_bus_routes_intentions_and_reactions() {
    let nerva = Nerva::builder()
        .config(config())
        .transport(Arc::new(CollectingTransport::default()))
        .dialect(Dialect::new("echo", 5, 2).operation("say", 1))
        .refinement(false)
        .build()
        .unwrap();
    let topic = nerva.forge(Severity::Info, "echo", "say");

    let responder = nerva.bus().remote_publisher();
    nerva.bus().subscribe_intention(topic, move |intention: &Intention| {
        responder.publish_reaction(
            topic,
            Reaction {
                answers: topic,
                outcome: Ok(intention.body.clone()),
            },
        );
    });
    let answers = Arc::new(Mutex::new(Vec::new()));
    let sink = answers.clone();
    nerva
        .bus()
        .subscribe_reaction(topic, move |reaction: &Reaction| {
            sink.lock().unwrap().push(reaction.outcome.clone());
        });

    let reached = nerva.bus().publish_intention(
        topic,
        &Intention::new(PriorityTier::OPERATIONAL, serde_json::json!({ "text": "hi" })),
    );
    assert_eq!(reached, 1);
    assert_eq!(nerva.bus().pump(), 1);
    assert_eq!(
        *answers.lock().unwrap(),
        vec![Ok(serde_json::json!({ "text": "hi" }))]
    );
}

#[tokio::test]
async fn test_signal_segment_respects_capabilities() {
    let restricted = Nerva::builder()
        .transport(Arc::new(CollectingTransport::default()))
        .capabilities(PlatformCapabilities::restricted())
        .refinement(false)
        .build()
        .unwrap();
    assert_eq!(
        restricted.signal_segment(4).unwrap_err(),
        CapabilityError::SharedMemoryUnavailable
    );

    let native = Nerva::builder()
        .transport(Arc::new(CollectingTransport::default()))
        .refinement(false)
        .build()
        .unwrap();
    let segment = native.signal_segment(4).unwrap();
    assert_eq!(segment.len(), 4);
}
