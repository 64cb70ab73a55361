//! GraphBuilder: composes one main module and any number of secondary
//! modules into a single correlated graph.
//!
//! Module registration order is significant: the first enabled
//! main-capable module that succeeds builds the base graph, every other
//! enabled module then correlates onto it in order. The same builder drives
//! dynamic probing through [`GraphBuilder::update`].

use std::io;

use hwgraph_core::TopologyGraph;
use tracing::{debug, info, warn};

use crate::error::{EngineError, ModuleError};
use crate::module::Module;
use crate::report::{BuildReport, ModuleOutcome, Phase};

/// Owns the registered modules for the lifetime of a run.
#[derive(Default)]
pub struct GraphBuilder {
    modules: Vec<Box<dyn Module>>,
    /// Index of the module that built the current graph.
    main: Option<usize>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a module. Enablement was decided when it was constructed.
    pub fn register(&mut self, module: Box<dyn Module>) -> &mut Self {
        debug!(module = module.name(), enabled = module.is_enabled(), "module registered");
        self.modules.push(module);
        self
    }

    /// Registered modules in registration order, disabled ones included.
    pub fn modules(&self) -> impl Iterator<Item = &dyn Module> {
        self.modules.iter().map(|m| m.as_ref())
    }

    pub fn module(&self, name: &str) -> Option<&dyn Module> {
        self.modules().find(|m| m.name() == name)
    }

    /// Name of the module that built the current graph.
    pub fn main_module(&self) -> Option<&'static str> {
        self.main.map(|idx| self.modules[idx].name())
    }

    fn register_tables(&self, graph: &mut TopologyGraph) {
        for module in self.modules.iter().filter(|m| m.is_enabled()) {
            for table in module.property_tables() {
                graph.register_properties(table);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Build
    // -----------------------------------------------------------------------

    /// Builds a fresh graph.
    ///
    /// Main-capable modules are tried in registration order; a failing one
    /// has its partial graph discarded. A failing secondary has whatever it
    /// added rolled back and is recorded, except on a consistency violation,
    /// which aborts the build.
    pub fn build(&mut self) -> Result<(TopologyGraph, BuildReport), EngineError> {
        let mut report = BuildReport::default();
        for module in self.modules.iter().filter(|m| !m.is_enabled()) {
            report.push(ModuleOutcome::disabled(module.name()));
        }

        let mut base = None;
        let mut tried = 0;
        for idx in 0..self.modules.len() {
            if !(self.modules[idx].is_enabled() && self.modules[idx].is_main_module()) {
                continue;
            }
            tried += 1;

            let mut candidate = TopologyGraph::new();
            self.register_tables(&mut candidate);

            let module = &mut self.modules[idx];
            let result = module.init_graph(&mut candidate);
            report.push(ModuleOutcome::new(module.name(), Phase::Main, &result));
            match result {
                Ok(()) => {
                    base = Some((idx, candidate));
                    break;
                }
                Err(err) => {
                    warn!(module = module.name(), error = %err, "main module failed, discarding its graph");
                }
            }
        }

        let Some((main, mut graph)) = base else {
            return Err(EngineError::NoMainModule { tried });
        };
        self.main = Some(main);
        report.main_module = Some(self.modules[main].name());
        info!(
            module = self.modules[main].name(),
            vertices = graph.vertex_count(),
            "base graph built"
        );

        for (idx, module) in self.modules.iter_mut().enumerate() {
            // Main-capable modules before `main` already failed.
            if idx == main || !module.is_enabled() || (idx < main && module.is_main_module()) {
                continue;
            }
            let checkpoint = graph.checkpoint();
            let result = module.init_graph_secondary(&mut graph);
            report.push(ModuleOutcome::new(module.name(), Phase::Secondary, &result));
            if let Err(err) = result {
                if err.is_fatal() {
                    return Err(EngineError::from_module(module.name(), err));
                }
                let dropped = graph.rollback(checkpoint);
                warn!(module = module.name(), error = %err, dropped, "secondary module failed, continuing");
            }
        }

        graph
            .check_consistency()
            .map_err(|source| EngineError::ConsistencyViolation {
                module: "builder",
                source,
            })?;

        info!(
            vertices = graph.vertex_count(),
            edges = graph.edge_count(),
            adapters = graph.adapter_count(),
            failures = report.failures().count(),
            "graph build complete"
        );
        Ok((graph, report))
    }

    // -----------------------------------------------------------------------
    // Dynamic probing
    // -----------------------------------------------------------------------

    /// Runs `update_graph` on every enabled module against `graph`.
    ///
    /// Unsupported updates are recorded and skipped. A module whose update
    /// fails has its changes from this tick rolled back.
    pub fn update(&mut self, graph: &mut TopologyGraph) -> Result<BuildReport, EngineError> {
        let mut report = BuildReport {
            main_module: self.main_module(),
            outcomes: Vec::new(),
        };
        for module in self.modules.iter_mut().filter(|m| m.is_enabled()) {
            let checkpoint = graph.checkpoint();
            let result = module.update_graph(graph);
            report.push(ModuleOutcome::new(module.name(), Phase::Update, &result));
            match result {
                Ok(()) | Err(ModuleError::NotSupported) => {}
                Err(err) if err.is_fatal() => {
                    return Err(EngineError::from_module(module.name(), err));
                }
                Err(err) => {
                    let dropped = graph.rollback(checkpoint);
                    warn!(module = module.name(), error = %err, dropped, "update failed, keeping previous state");
                }
            }
        }
        debug!(
            vertices = graph.vertex_count(),
            edges = graph.edge_count(),
            "probe tick applied"
        );
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Export and teardown
    // -----------------------------------------------------------------------

    /// Forwards `graph` to the named module's own export format.
    pub fn export(
        &self,
        module: &str,
        graph: &TopologyGraph,
        out: &mut dyn io::Write,
    ) -> Result<(), EngineError> {
        let target = self
            .module(module)
            .ok_or_else(|| EngineError::UnknownModule(module.to_string()))?;
        target
            .export_graph(graph, out)
            .map_err(|source| EngineError::Export {
                module: target.name(),
                source,
            })
    }

    /// Calls `shutdown` on every module, continuing past failures. Returns
    /// the failures.
    pub fn shutdown(&mut self) -> Vec<(&'static str, ModuleError)> {
        let mut failures = Vec::new();
        for module in self.modules.iter_mut() {
            if let Err(err) = module.shutdown() {
                warn!(module = module.name(), error = %err, "module shutdown failed");
                failures.push((module.name(), err));
            }
        }
        failures
    }
}
