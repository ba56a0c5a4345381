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

//! Runtime configuration.
//!
//! Every field has a default, so an empty JSON object is a valid
//! configuration. [`NervaConfig::validated`] applies the lower bounds.

use nerva_control::GovernorConfig;
use nerva_io::{EndpointMap, MembraneConfig, MIN_DRAIN_INTERVAL};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Errors raised while loading a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that was read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The JSON was malformed or had the wrong shape.
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Configuration of a [`Nerva`](crate::Nerva) context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NervaConfig {
    /// Period of the membrane drain timer, in milliseconds. At least 1000.
    pub drain_interval_ms: u64,
    /// Maximum queued items per priority tier. At least 1.
    pub tier_capacity: usize,
    /// Whether mode transitions are journaled.
    pub forensic_logging: bool,
    /// Governor debounce window, in milliseconds.
    pub debounce_ms: u64,
    /// Subscribers per topic above which the bus warns.
    pub congestion_threshold: usize,
    /// Destination name to URL.
    pub endpoints: BTreeMap<String, String>,
    /// URL for destinations missing from `endpoints`.
    pub default_endpoint: Option<String>,
    /// Maximum wait on the refinement worker, in milliseconds.
    pub refine_timeout_ms: u64,
    /// Number of transitions the forensic journal retains.
    pub journal_capacity: usize,
}

impl Default for NervaConfig {
    fn default() -> Self {
        Self {
            drain_interval_ms: 5_000,
            tier_capacity: 500,
            forensic_logging: true,
            debounce_ms: 150,
            congestion_threshold: nerva_core::event::DEFAULT_CONGESTION_THRESHOLD,
            endpoints: BTreeMap::new(),
            default_endpoint: None,
            refine_timeout_ms: 250,
            journal_capacity: 256,
        }
    }
}

impl NervaConfig {
    /// Parses a JSON document and validates it.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.validated())
    }

    /// Reads and parses a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&text)?;
        log::info!("Config loaded from {}.", path.display());
        Ok(config)
    }

    /// Clamps out-of-range values, logging each adjustment.
    pub fn validated(mut self) -> Self {
        let min_interval = MIN_DRAIN_INTERVAL.as_millis() as u64;
        if self.drain_interval_ms < min_interval {
            log::warn!(
                "Config: drain_interval_ms {} below minimum, using {min_interval}.",
                self.drain_interval_ms
            );
            self.drain_interval_ms = min_interval;
        }
        if self.tier_capacity == 0 {
            log::warn!("Config: tier_capacity 0 is invalid, using 1.");
            self.tier_capacity = 1;
        }
        if self.journal_capacity == 0 {
            self.journal_capacity = 1;
        }
        self
    }

    /// Governor settings derived from this configuration.
    pub fn governor_config(&self) -> GovernorConfig {
        GovernorConfig {
            debounce: Duration::from_millis(self.debounce_ms),
            forensic_logging: self.forensic_logging,
        }
    }

    /// Membrane settings derived from this configuration.
    pub fn membrane_config(&self) -> MembraneConfig {
        MembraneConfig {
            drain_interval: Duration::from_millis(self.drain_interval_ms),
            tier_capacity: self.tier_capacity,
            refine_timeout: Duration::from_millis(self.refine_timeout_ms),
        }
    }

    /// The endpoint map for the adaptive transport.
    pub fn endpoint_map(&self) -> EndpointMap {
        let map: EndpointMap = self
            .endpoints
            .iter()
            .map(|(name, url)| (name.clone(), url.clone()))
            .collect();
        match &self.default_endpoint {
            Some(url) => map.with_default(url.clone()),
            None => map,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_yields_defaults() {
        let config = NervaConfig::from_json_str("{}").unwrap();
        assert_eq!(config, NervaConfig::default());
        assert_eq!(config.membrane_config().drain_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_validation_clamps() {
        let config = NervaConfig::from_json_str(
            r#"{ "drain_interval_ms": 10, "tier_capacity": 0, "journal_capacity": 0 }"#,
        )
        .unwrap();
        assert_eq!(config.drain_interval_ms, 1_000);
        assert_eq!(config.tier_capacity, 1);
        assert_eq!(config.journal_capacity, 1);
    }

    #[test]
    fn test_endpoints_and_default() {
        let config = NervaConfig::from_json_str(
            r#"{
                "endpoints": { "telemetry": "https://t.example/pulse" },
                "default_endpoint": "https://t.example/any"
            }"#,
        )
        .unwrap();
        let map = config.endpoint_map();
        assert_eq!(map.resolve("telemetry"), Some("https://t.example/pulse"));
        assert_eq!(map.resolve("sync"), Some("https://t.example/any"));
    }

    #[test]
    fn test_malformed_json_is_a_parse_error() {
        let err = NervaConfig::from_json_str(r#"{ "tier_capacity": "lots" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_governor_config_mapping() {
        let config = NervaConfig {
            debounce_ms: 40,
            forensic_logging: false,
            ..Default::default()
        };
        let governor = config.governor_config();
        assert_eq!(governor.debounce, Duration::from_millis(40));
        assert!(!governor.forensic_logging);
    }
}
