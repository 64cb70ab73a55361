//! Backend modules for the hwgraph composition engine.
//!
//! Each module wraps one hardware-discovery backend behind the
//! [`hwgraph_engine::Module`] protocol. Native library access is modelled by
//! JSON snapshots in the same shape a native walk produces.
//!
//! # Modules
//!
//! - [`topology`]: hardware-locality tree walk; the main module
//! - [`gpu`]: GPU management library; secondary
//! - [`cluster`]: site descriptor; secondary, disabled unless configured
//! - [`snapshot`]: versioned snapshot loading

pub mod cluster;
pub mod gpu;
pub mod snapshot;
pub mod topology;

pub use cluster::ClusterModule;
pub use gpu::GpuModule;
pub use snapshot::SnapshotError;
pub use topology::TopologyModule;
