//! The [`Module`] trait: the seam every hardware-discovery backend implements.
//!
//! A module is constructed with its backend already opened and its
//! enablement decided; the builder never calls a disabled module. Every
//! lifecycle operation except [`Module::init_graph_secondary`] has a default
//! that reports [`ModuleError::NotSupported`].
//!
//! Implementations should probe their backend completely before mutating
//! the graph. If a secondary or update pass still fails partway, the builder
//! rolls the graph back to where the pass started.

use std::io;

use hwgraph_core::{PropertyTable, TopologyGraph};

use crate::error::ModuleError;

/// A hardware-discovery backend.
///
/// The trait is synchronous: native discovery calls block, and the probing
/// loop runs them on a blocking worker thread.
pub trait Module: Send {
    /// Stable module name, also used as the adapter owner name.
    fn name(&self) -> &'static str;

    /// Whether the module takes part in the pass at all.
    fn is_enabled(&self) -> bool;

    /// Whether the module can build the base graph from empty state.
    fn is_main_module(&self) -> bool {
        false
    }

    /// One-line human description, shown by module listings.
    fn description(&self) -> &'static str {
        ""
    }

    /// The property tables of every adapter type this module attaches.
    fn property_tables(&self) -> Vec<PropertyTable>;

    /// Builds the base structural graph into an empty `graph`.
    fn init_graph(&mut self, _graph: &mut TopologyGraph) -> Result<(), ModuleError> {
        Err(ModuleError::NotSupported)
    }

    /// Correlates this module's native objects onto an existing graph.
    fn init_graph_secondary(&mut self, graph: &mut TopologyGraph) -> Result<(), ModuleError>;

    /// Re-probes the backend and reconciles the graph in place.
    fn update_graph(&mut self, _graph: &mut TopologyGraph) -> Result<(), ModuleError> {
        Err(ModuleError::NotSupported)
    }

    /// Writes the graph in a module-specific external representation.
    fn export_graph(
        &self,
        _graph: &TopologyGraph,
        _out: &mut dyn io::Write,
    ) -> Result<(), ModuleError> {
        Err(ModuleError::NotSupported)
    }

    /// Releases backend resources.
    fn shutdown(&mut self) -> Result<(), ModuleError> {
        Ok(())
    }
}
