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

//! Reference host for the nerva runtime.
//!
//! Usage: `nerva-runtime [config.json]`
//!
//! Boots a context, then plays a short scripted device session: the page
//! starts visible on a good network, the battery drains into `ECO` and then
//! `EMERGENCY`, the charger is plugged in, the page is backgrounded and
//! finally restored. After each step one item per tier is emitted and a
//! drain cycle runs, so the log shows which tiers the membrane let through.
//! The session ends with the forced termination drain and the forensic
//! journal is printed to stdout as JSON lines.

use anyhow::{Context, Result};
use nerva_core::platform::NetworkClass;
use nerva_core::SensorReading;
use nerva_infra::ManualSensor;
use nerva_sdk::prelude::*;
use std::sync::Arc;
use std::time::Duration;

const APPARATUS: &str = "runtime.session";

struct Step {
    label: &'static str,
    reading: SensorReading,
}

fn session() -> Vec<Step> {
    vec![
        Step {
            label: "page visible",
            reading: SensorReading::Visibility { visible: true },
        },
        Step {
            label: "4g network",
            reading: SensorReading::Network {
                class: Some(NetworkClass::FourG),
                save_data: false,
            },
        },
        Step {
            label: "charging",
            reading: SensorReading::Battery {
                level: 0.80,
                charging: true,
            },
        },
        Step {
            label: "unplugged, battery low",
            reading: SensorReading::Battery {
                level: 0.25,
                charging: false,
            },
        },
        Step {
            label: "battery critical",
            reading: SensorReading::Battery {
                level: 0.08,
                charging: false,
            },
        },
        Step {
            label: "charger plugged in",
            reading: SensorReading::Battery {
                level: 0.09,
                charging: true,
            },
        },
        Step {
            label: "page hidden",
            reading: SensorReading::Visibility { visible: false },
        },
        Step {
            label: "page restored",
            reading: SensorReading::Visibility { visible: true },
        },
    ]
}

fn session_dialect() -> Dialect {
    Dialect::new(APPARATUS, 1, 1)
        .operation("step", 1)
        .operation("pulse", 2)
}

#[tokio::main]
async fn main() -> Result<()> {
    nerva_telemetry::init_logging();

    let config = match std::env::args().nth(1) {
        Some(path) => NervaConfig::load(&path).with_context(|| format!("loading {path}"))?,
        None => {
            log::info!("Runtime: no config file given, using defaults.");
            NervaConfig::default()
        }
    };
    let settle = Duration::from_millis(config.debounce_ms * 2 + 100);

    let host = Arc::new(ManualSensor::new("host"));
    let nerva = Nerva::builder()
        .config(config)
        .dialect(session_dialect())
        .sensor(host.clone())
        .build()
        .context("building nerva context")?;
    nerva.ignite();
    let watcher = nerva.observe(|mode| log::info!("Runtime: operating mode {mode}"));

    let step_code = nerva.forge(Severity::Info, APPARATUS, "step");
    let pulse_code = nerva.forge(Severity::Debug, APPARATUS, "pulse");
    log::info!(
        "Runtime: step opcode {step_code} = {}",
        nerva.registry().describe(step_code)
    );

    for (index, step) in session().into_iter().enumerate() {
        log::info!("Runtime: step {index}: {}", step.label);
        host.report(step.reading);
        tokio::time::sleep(settle).await;

        let mode = nerva.current_mode();
        for tier in PriorityTier::ALL {
            let body = serde_json::json!({
                "op": if tier == PriorityTier::BEHAVIORAL { pulse_code.raw() } else { step_code.raw() },
                "step": index,
                "mode": mode,
            });
            let outcome = nerva.emit(tier, "telemetry", body.to_string());
            if !outcome.is_queued() {
                log::warn!("Runtime: tier {tier} item not queued: {outcome:?}");
            }
        }
        let report = nerva.membrane().drain_cycle(Default::default()).await;
        log::info!(
            "Runtime: mode {mode}, delivered {}, pending {:?}",
            report.delivered(),
            PriorityTier::ALL.map(|tier| nerva.membrane().pending(tier))
        );
    }

    watcher.unsubscribe();
    nerva.shutdown();
    tokio::time::sleep(settle).await;
    log::info!("Runtime: final stats {:?}", nerva.membrane().stats());

    if let Some(journal) = nerva.journal() {
        journal
            .write_json_lines(std::io::stdout().lock())
            .context("writing forensic journal")?;
    }
    Ok(())
}
