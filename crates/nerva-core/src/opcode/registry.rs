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

//! The dialect table and its seal.

use super::layout::{CompoundOpcode, APPARATUS_MASK, LAYER_MASK, UNKNOWN_CODE};
use super::severity::Severity;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

/// Returned by reverse lookups of an unregistered apparatus code.
pub const UNKNOWN_APPARATUS: &str = "UNKNOWN_APPARATUS";
/// Returned by reverse lookups of an unregistered operation code.
pub const UNKNOWN_OPERATION: &str = "UNKNOWN_OPERATION";

/// Why a dialect was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DialectError {
    /// The apparatus identifier is empty.
    #[error("apparatus identifier is empty")]
    EmptyApparatusId,
    /// The apparatus code is `0` or does not fit in 10 bits.
    #[error("apparatus code {0} is outside 1..=1023")]
    ApparatusCodeOutOfRange(u16),
    /// The layer code does not fit in 3 bits.
    #[error("layer code {0} is outside 0..=7")]
    LayerCodeOutOfRange(u8),
    /// An operation identifier is empty.
    #[error("operation identifier is empty")]
    EmptyOperationId,
    /// An operation uses the reserved code `0`.
    #[error("operation `{0}` uses the reserved code 0")]
    ReservedOperationCode(String),
    /// Two operations share a code.
    #[error("operation code {0} is assigned twice")]
    DuplicateOperationCode(u16),
    /// An operation is declared twice.
    #[error("operation `{0}` is declared twice")]
    DuplicateOperationId(String),
    /// The apparatus code belongs to another apparatus.
    #[error("apparatus code {code} is already claimed by `{owner}`")]
    ApparatusCodeTaken {
        /// The contested code.
        code: u16,
        /// Current owner of the code.
        owner: String,
    },
}

/// An apparatus and the operations it speaks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialect {
    /// Human identifier of the apparatus (e.g. `"network"`).
    pub apparatus_id: String,
    /// 10-bit apparatus code, `1..=1023`.
    pub apparatus_code: u16,
    /// 3-bit layer code.
    pub layer_code: u8,
    /// Operation identifiers and their 16-bit codes (`1..=65535`).
    pub operations: Vec<(String, u16)>,
}

impl Dialect {
    /// Starts a dialect with no operations.
    pub fn new(apparatus_id: impl Into<String>, apparatus_code: u16, layer_code: u8) -> Self {
        Self {
            apparatus_id: apparatus_id.into(),
            apparatus_code,
            layer_code,
            operations: Vec::new(),
        }
    }

    /// Adds an operation.
    pub fn operation(mut self, operation_id: impl Into<String>, code: u16) -> Self {
        self.operations.push((operation_id.into(), code));
        self
    }

    /// Checks that every code fits its field and nothing is declared twice.
    pub fn validate(&self) -> Result<(), DialectError> {
        if self.apparatus_id.is_empty() {
            return Err(DialectError::EmptyApparatusId);
        }
        if self.apparatus_code == 0 || u32::from(self.apparatus_code) > APPARATUS_MASK {
            return Err(DialectError::ApparatusCodeOutOfRange(self.apparatus_code));
        }
        if u32::from(self.layer_code) > LAYER_MASK {
            return Err(DialectError::LayerCodeOutOfRange(self.layer_code));
        }

        let mut ids = HashSet::new();
        let mut codes = HashSet::new();
        for (id, code) in &self.operations {
            if id.is_empty() {
                return Err(DialectError::EmptyOperationId);
            }
            if *code == 0 {
                return Err(DialectError::ReservedOperationCode(id.clone()));
            }
            if !ids.insert(id.as_str()) {
                return Err(DialectError::DuplicateOperationId(id.clone()));
            }
            if !codes.insert(*code) {
                return Err(DialectError::DuplicateOperationCode(*code));
            }
        }
        Ok(())
    }
}

/// A dialect declared at compile time with [`inventory::submit!`].
///
/// The declaring crate needs its own `inventory` dependency, since the
/// macro expands to `::inventory` paths.
///
/// ```ignore
/// inventory::submit! {
///     nerva_core::opcode::StaticDialect {
///         apparatus_id: "network",
///         apparatus_code: 4,
///         layer_code: 1,
///         operations: &[("timeout", 1), ("retry", 2)],
///     }
/// }
/// ```
#[derive(Debug)]
pub struct StaticDialect {
    /// Human identifier of the apparatus.
    pub apparatus_id: &'static str,
    /// 10-bit apparatus code.
    pub apparatus_code: u16,
    /// 3-bit layer code.
    pub layer_code: u8,
    /// Operation identifiers and codes.
    pub operations: &'static [(&'static str, u16)],
}

impl StaticDialect {
    /// Converts the declaration into an owned dialect.
    pub fn to_dialect(&self) -> Dialect {
        let mut dialect = Dialect::new(self.apparatus_id, self.apparatus_code, self.layer_code);
        for (id, code) in self.operations {
            dialect = dialect.operation(*id, *code);
        }
        dialect
    }
}

inventory::collect!(StaticDialect);

#[derive(Debug)]
struct ApparatusEntry {
    code: u16,
    layer: u8,
    operations: HashMap<String, u16>,
    operation_names: HashMap<u16, String>,
}

#[derive(Debug, Default)]
struct DialectTable {
    apparatus: HashMap<String, ApparatusEntry>,
    apparatus_names: HashMap<u16, String>,
}

impl DialectTable {
    fn check_code_owner(&self, dialect: &Dialect) -> Result<(), DialectError> {
        match self.apparatus_names.get(&dialect.apparatus_code) {
            Some(owner) if *owner != dialect.apparatus_id => Err(DialectError::ApparatusCodeTaken {
                code: dialect.apparatus_code,
                owner: owner.clone(),
            }),
            _ => Ok(()),
        }
    }

    fn insert(&mut self, dialect: Dialect) {
        if let Some(previous) = self.apparatus.get(&dialect.apparatus_id) {
            self.apparatus_names.remove(&previous.code);
        }

        let operation_names = dialect
            .operations
            .iter()
            .map(|(id, code)| (*code, id.clone()))
            .collect();
        let entry = ApparatusEntry {
            code: dialect.apparatus_code,
            layer: dialect.layer_code,
            operations: dialect.operations.into_iter().collect(),
            operation_names,
        };

        self.apparatus_names
            .insert(dialect.apparatus_code, dialect.apparatus_id.clone());
        self.apparatus.insert(dialect.apparatus_id, entry);
    }
}

/// Registry mapping apparatus and operation identifiers to compact codes.
///
/// Dialects are registered during bootstrap, then the registry is
/// [sealed](Self::seal). Registration after the seal is ignored (and
/// logged) so a late caller can never alter codes already on the wire.
#[derive(Debug, Default)]
pub struct OpcodeRegistry {
    table: RwLock<DialectTable>,
    sealed: AtomicBool,
}

impl OpcodeRegistry {
    /// Creates an empty, unsealed registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry pre-filled with every dialect declared through
    /// [`inventory::submit!`]. The registry is left unsealed.
    pub fn with_static_dialects() -> Self {
        let registry = Self::new();
        for declared in inventory::iter::<StaticDialect> {
            registry.register_dialect(declared.to_dialect());
        }
        registry
    }

    fn read(&self) -> RwLockReadGuard<'_, DialectTable> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a dialect. Returns `false` (and changes nothing) if the
    /// registry is sealed or the dialect is invalid.
    ///
    /// Registering an apparatus identifier again replaces its dialect.
    pub fn register_dialect(&self, dialect: Dialect) -> bool {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        if self.sealed.load(Ordering::Acquire) {
            log::warn!(
                "OpcodeRegistry: sealed, ignoring late dialect `{}`",
                dialect.apparatus_id
            );
            return false;
        }
        if let Err(e) = dialect
            .validate()
            .and_then(|_| table.check_code_owner(&dialect))
        {
            log::warn!(
                "OpcodeRegistry: rejected dialect `{}`: {e}",
                dialect.apparatus_id
            );
            return false;
        }

        log::debug!(
            "OpcodeRegistry: registered `{}` (apparatus={}, layer={}, {} operations)",
            dialect.apparatus_id,
            dialect.apparatus_code,
            dialect.layer_code,
            dialect.operations.len()
        );
        table.insert(dialect);
        true
    }

    /// Freezes the registry. One-way.
    pub fn seal(&self) {
        let table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        if !self.sealed.swap(true, Ordering::AcqRel) {
            log::info!(
                "OpcodeRegistry: sealed with {} dialects",
                table.apparatus.len()
            );
        }
    }

    /// Returns `true` once [`seal`](Self::seal) has been called.
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Number of registered dialects.
    pub fn dialect_count(&self) -> usize {
        self.read().apparatus.len()
    }

    /// Code of a severity.
    pub fn severity_code(&self, severity: Severity) -> u8 {
        severity.code()
    }

    /// Code of a severity given by name, or the unknown sentinel.
    pub fn severity_code_by_name(&self, name: &str) -> u8 {
        Severity::code_for_name(name)
    }

    /// Code of an apparatus, or the unknown sentinel.
    pub fn apparatus_code(&self, apparatus_id: &str) -> u16 {
        self.read()
            .apparatus
            .get(apparatus_id)
            .map_or(UNKNOWN_CODE as u16, |e| e.code)
    }

    /// Layer of an apparatus, or the unknown sentinel.
    pub fn layer_code(&self, apparatus_id: &str) -> u8 {
        self.read()
            .apparatus
            .get(apparatus_id)
            .map_or(UNKNOWN_CODE as u8, |e| e.layer)
    }

    /// Code of an operation within an apparatus, or the unknown sentinel.
    pub fn operation_code(&self, apparatus_id: &str, operation_id: &str) -> u16 {
        self.read()
            .apparatus
            .get(apparatus_id)
            .and_then(|e| e.operations.get(operation_id).copied())
            .unwrap_or(UNKNOWN_CODE as u16)
    }

    /// Packs severity, layer, apparatus and operation into one opcode.
    ///
    /// Unknown identifiers contribute the `0` sentinel to their field.
    pub fn forge_compound_code(
        &self,
        severity: Severity,
        apparatus_id: &str,
        operation_id: &str,
    ) -> CompoundOpcode {
        let table = self.read();
        let (layer, apparatus, operation) = match table.apparatus.get(apparatus_id) {
            Some(entry) => (
                entry.layer,
                entry.code,
                entry
                    .operations
                    .get(operation_id)
                    .copied()
                    .unwrap_or(UNKNOWN_CODE as u16),
            ),
            None => (UNKNOWN_CODE as u8, UNKNOWN_CODE as u16, UNKNOWN_CODE as u16),
        };
        CompoundOpcode::pack(severity.code(), layer, apparatus, operation)
    }

    /// Reverse lookup of an operation code, or [`UNKNOWN_OPERATION`].
    pub fn resolve_operation(&self, apparatus_id: &str, operation_code: u16) -> String {
        self.read()
            .apparatus
            .get(apparatus_id)
            .and_then(|e| e.operation_names.get(&operation_code).cloned())
            .unwrap_or_else(|| UNKNOWN_OPERATION.to_string())
    }

    /// Reverse lookup of an apparatus code, or [`UNKNOWN_APPARATUS`].
    pub fn resolve_apparatus(&self, apparatus_code: u16) -> String {
        self.read()
            .apparatus_names
            .get(&apparatus_code)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_APPARATUS.to_string())
    }

    /// Human-readable rendering of an opcode, e.g. `"warn network.timeout"`.
    pub fn describe(&self, code: CompoundOpcode) -> String {
        let severity = Severity::from_code(code.severity()).map_or("unknown", Severity::name);
        let apparatus = self.resolve_apparatus(code.apparatus());
        let operation = self.resolve_operation(&apparatus, code.operation());
        format!("{severity} {apparatus}.{operation}")
    }
}
