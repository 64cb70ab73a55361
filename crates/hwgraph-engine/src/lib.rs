//! Composition engine for hardware topology graphs.
//!
//! Defines the [`Module`] protocol backends implement, the correlation rule
//! that merges their objects into one vertex set, the [`GraphBuilder`] that
//! orchestrates a build, and the dynamic probing loop.
//!
//! # Modules
//!
//! - [`module`]: the Module trait
//! - [`correlate`]: key-based correlation and symmetric linking
//! - [`builder`]: GraphBuilder (main selection, secondaries, updates)
//! - [`report`]: BuildReport and per-module outcomes
//! - [`probe`]: tokio-driven periodic re-probing
//! - [`config`]: EngineConfig and its environment overrides
//! - [`error`]: ModuleError, ModuleStatus, EngineError

pub mod builder;
pub mod config;
pub mod correlate;
pub mod error;
pub mod module;
pub mod probe;
pub mod report;

// Re-export key types for ergonomic use.
pub use builder::GraphBuilder;
pub use config::EngineConfig;
pub use correlate::{correlate, link_symmetric, Correlation};
pub use error::{EngineError, ModuleError, ModuleStatus};
pub use module::Module;
pub use probe::{run_probing, ProbeStats};
pub use report::{BuildReport, ModuleOutcome, Phase};
