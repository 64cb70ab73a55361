//! Error types for the module protocol and the graph builder.
//!
//! [`ModuleError`] is what a backend module returns from a lifecycle
//! operation; [`ModuleStatus`] is its flattened, reportable form.
//! [`EngineError`] covers the failures that abort a whole build or probe
//! pass.

use std::fmt;

use hwgraph_core::CoreError;
use serde::Serialize;
use thiserror::Error;

/// Errors a module operation can report.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// The module does not implement this operation.
    #[error("operation not supported by module")]
    NotSupported,

    /// The module could not initialize its backend or build its part of
    /// the graph. Its contribution is dropped.
    #[error("module '{module}' failed to initialize: {reason}")]
    InitFailure { module: &'static str, reason: String },

    /// A single backend call failed.
    #[error("module '{module}' backend call failed: {reason}")]
    BackendCallFailure { module: &'static str, reason: String },

    /// The backend's library or snapshot format does not match the version
    /// the module was written against.
    #[error("module '{module}' ABI version mismatch: expected {expected}, found {found}")]
    AbiVersionMismatch {
        module: &'static str,
        expected: u32,
        found: u32,
    },

    /// A graph mutation was rejected.
    #[error(transparent)]
    Graph(#[from] CoreError),
}

impl ModuleError {
    /// The reportable status of this error.
    pub fn status(&self) -> ModuleStatus {
        match self {
            ModuleError::NotSupported => ModuleStatus::NotSupported,
            ModuleError::InitFailure { .. } | ModuleError::AbiVersionMismatch { .. } => {
                ModuleStatus::InitFailure
            }
            ModuleError::BackendCallFailure { .. } => ModuleStatus::BackendCallFailure,
            ModuleError::Graph(err) if err.is_consistency_violation() => {
                ModuleStatus::ConsistencyViolation
            }
            ModuleError::Graph(_) => ModuleStatus::BackendCallFailure,
        }
    }

    /// Returns `true` if this error must abort the pass.
    pub fn is_fatal(&self) -> bool {
        self.status() == ModuleStatus::ConsistencyViolation
    }
}

/// Outcome of one module operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    Success,
    NotSupported,
    InitFailure,
    BackendCallFailure,
    ConsistencyViolation,
    /// The module was disabled at construction and never called.
    Disabled,
}

impl ModuleStatus {
    pub fn of(result: &Result<(), ModuleError>) -> ModuleStatus {
        match result {
            Ok(()) => ModuleStatus::Success,
            Err(err) => err.status(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ModuleStatus::Success => "success",
            ModuleStatus::NotSupported => "not supported",
            ModuleStatus::InitFailure => "init failure",
            ModuleStatus::BackendCallFailure => "backend call failure",
            ModuleStatus::ConsistencyViolation => "consistency violation",
            ModuleStatus::Disabled => "disabled",
        }
    }
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors that abort a build or probing pass.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No enabled main-capable module produced a base graph.
    #[error("no usable main module: {tried} main-capable module(s) tried")]
    NoMainModule { tried: usize },

    /// A module violated a graph invariant.
    #[error("consistency violation in module '{module}': {source}")]
    ConsistencyViolation {
        module: &'static str,
        #[source]
        source: CoreError,
    },

    /// No registered module has the given name.
    #[error("unknown module: {0}")]
    UnknownModule(String),

    /// A module's export operation failed.
    #[error("export by module '{module}' failed: {source}")]
    Export {
        module: &'static str,
        #[source]
        source: ModuleError,
    },

    /// A configuration value could not be parsed.
    #[error("invalid configuration value {name}={value}: {reason}")]
    Config {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// A probing task panicked or was cancelled.
    #[error("probe task failed: {0}")]
    ProbeTask(String),

    /// The builder lock was poisoned by a panicking probe.
    #[error("graph builder lock poisoned")]
    Poisoned,
}

impl EngineError {
    /// Wraps a fatal module error raised by `module`.
    pub(crate) fn from_module(module: &'static str, err: ModuleError) -> EngineError {
        match err {
            ModuleError::Graph(source) => EngineError::ConsistencyViolation { module, source },
            other => EngineError::ConsistencyViolation {
                module,
                source: CoreError::GraphInconsistency {
                    reason: other.to_string(),
                },
            },
        }
    }
}
