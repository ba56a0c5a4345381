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

//! Severity codes (3 bits, `0` reserved for unknown).

use super::layout::UNKNOWN_CODE;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a telemetry pulse or bus message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Severity {
    /// Finest-grained tracing.
    Trace = 1,
    /// Debugging detail.
    Debug = 2,
    /// Normal operation.
    Info = 3,
    /// Noteworthy but expected.
    Notice = 4,
    /// Recoverable anomaly.
    Warn = 5,
    /// Failed operation.
    Error = 6,
    /// Unrecoverable failure.
    Fatal = 7,
}

impl Severity {
    /// All severities, least severe first.
    pub const ALL: [Severity; 7] = [
        Severity::Trace,
        Severity::Debug,
        Severity::Info,
        Severity::Notice,
        Severity::Warn,
        Severity::Error,
        Severity::Fatal,
    ];

    /// The 3-bit code of this severity.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// The severity for `code`, or `None` for the unknown sentinel and
    /// out-of-range values.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    /// Lower-case name.
    pub fn name(self) -> &'static str {
        match self {
            Severity::Trace => "trace",
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Notice => "notice",
            Severity::Warn => "warn",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        }
    }

    /// Parses a severity name, case-insensitively. `warning` and `critical`
    /// are accepted as aliases of `warn` and `fatal`.
    pub fn from_name(name: &str) -> Option<Self> {
        let lowered = name.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "warning" => Some(Severity::Warn),
            "critical" => Some(Severity::Fatal),
            other => Self::ALL.into_iter().find(|s| s.name() == other),
        }
    }

    /// Code for a severity name, or the unknown sentinel.
    pub fn code_for_name(name: &str) -> u8 {
        Self::from_name(name).map_or(UNKNOWN_CODE as u8, Severity::code)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
