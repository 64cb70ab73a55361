//! Topology module: builds the base containment tree from a
//! hardware-locality walk.
//!
//! The walk is read from a JSON snapshot (see [`native::TopologySnapshot`]).
//! The tree is built breadth-first from an explicit work-list of
//! (native object, parent vertex) pairs, so arbitrarily deep topologies
//! never recurse. The root vertex is labelled and keyed
//! `machine:<hostname>`; PCI devices are labelled and keyed `bdfid:<id>`.
//!
//! As a secondary module it only correlates its keyed objects (the machine
//! and PCI devices) onto a graph another module built.

pub mod adapter;
pub mod native;

use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;

use hwgraph_core::{ComponentType, CorrelationKey, PropertyTable, TopologyGraph, VertexId};
use hwgraph_engine::{correlate, Module, ModuleError};
use tracing::{debug, info, warn};

use crate::snapshot::{self, SnapshotError};

pub use adapter::TopologyAdapter;
pub use native::{TopologyObject, TopologySnapshot, TOPOLOGY_FORMAT_VERSION};

pub const MODULE_NAME: &str = "topology";

/// Key of a PCI device.
pub fn pci_key(bdfid: u64) -> CorrelationKey {
    CorrelationKey::new(format!("bdfid:{bdfid}"))
}

/// Key of the machine vertex.
pub fn machine_key(hostname: &str) -> CorrelationKey {
    CorrelationKey::new(format!("machine:{hostname}"))
}

/// Hardware-locality backed main module.
#[derive(Debug)]
pub struct TopologyModule {
    path: Option<PathBuf>,
    hostname: Option<String>,
    snapshot: Option<TopologySnapshot>,
    enabled: bool,
}

impl TopologyModule {
    /// Opens a snapshot file. A format version mismatch disables the module;
    /// an unreadable file leaves it enabled so `init_graph` reports the
    /// failure.
    pub fn open(path: impl Into<PathBuf>, hostname: Option<String>) -> Self {
        let path = path.into();
        let (snapshot, enabled) =
            match snapshot::load::<TopologySnapshot>(&path, TOPOLOGY_FORMAT_VERSION) {
                Ok(snapshot) => (Some(snapshot), true),
                Err(err @ SnapshotError::VersionMismatch { .. }) => {
                    warn!(module = MODULE_NAME, error = %err.into_module_error(MODULE_NAME), "disabling module");
                    (None, false)
                }
                Err(err) => {
                    warn!(module = MODULE_NAME, error = %err, "topology snapshot not readable yet");
                    (None, true)
                }
            };
        TopologyModule {
            path: Some(path),
            hostname,
            snapshot,
            enabled,
        }
    }

    /// Uses an in-memory snapshot.
    pub fn from_snapshot(snapshot: TopologySnapshot, hostname: Option<String>) -> Self {
        let enabled = snapshot.format_version == TOPOLOGY_FORMAT_VERSION;
        if !enabled {
            warn!(
                module = MODULE_NAME,
                expected = TOPOLOGY_FORMAT_VERSION,
                found = snapshot.format_version,
                "ABI version mismatch, disabling module"
            );
        }
        TopologyModule {
            path: None,
            hostname,
            snapshot: enabled.then_some(snapshot),
            enabled,
        }
    }

    /// A module with no input, excluded from every pass.
    pub fn disabled() -> Self {
        TopologyModule {
            path: None,
            hostname: None,
            snapshot: None,
            enabled: false,
        }
    }

    /// The hostname the machine vertex is keyed by: the configured one, else
    /// the snapshot's.
    pub fn hostname(&self) -> Option<&str> {
        self.hostname
            .as_deref()
            .or_else(|| self.snapshot.as_ref()?.hostname.as_deref())
    }

    /// Loads the snapshot if construction could not.
    fn load(&mut self) -> Result<(), ModuleError> {
        if self.snapshot.is_some() {
            return Ok(());
        }
        let path = self.path.as_ref().ok_or_else(|| ModuleError::InitFailure {
            module: MODULE_NAME,
            reason: "no topology snapshot configured".to_string(),
        })?;
        let loaded = snapshot::load::<TopologySnapshot>(path, TOPOLOGY_FORMAT_VERSION).map_err(
            |err| ModuleError::InitFailure {
                module: MODULE_NAME,
                reason: err.to_string(),
            },
        )?;
        self.snapshot = Some(loaded);
        Ok(())
    }

    fn snapshot(&self) -> Result<&TopologySnapshot, ModuleError> {
        self.snapshot.as_ref().ok_or_else(|| ModuleError::InitFailure {
            module: MODULE_NAME,
            reason: "topology snapshot not loaded".to_string(),
        })
    }

    fn hostname_for(&self, snapshot: &TopologySnapshot) -> String {
        self.hostname
            .clone()
            .or_else(|| snapshot.hostname.clone())
            .unwrap_or_else(|| "localhost".to_string())
    }
}

/// A native object waiting for its vertex.
struct Pending<'a> {
    object: &'a TopologyObject,
    parent: Option<VertexId>,
    numa_affinity: Option<u32>,
    depth: u32,
}

/// Resolves a category, degrading mapping gaps to the generic placeholder.
fn resolve_or_degrade(object: &TopologyObject) -> ComponentType {
    match native::resolve(object) {
        Ok(component) => component,
        Err(err) => {
            warn!(module = MODULE_NAME, error = %err, "degrading to placeholder category");
            ComponentType::Unknown.placeholder()
        }
    }
}

/// Walks the snapshot breadth-first. `visit` receives each object with its
/// resolved category, NUMA affinity and correlation key, and returns the
/// vertex its children attach to.
fn walk<'a, F>(snapshot: &'a TopologySnapshot, hostname: &str, mut visit: F) -> Result<(), ModuleError>
where
    F: FnMut(
        &Pending<'a>,
        ComponentType,
        Option<u32>,
        Option<CorrelationKey>,
    ) -> Result<Option<VertexId>, ModuleError>,
{
    let mut queue = VecDeque::from([Pending {
        object: &snapshot.root,
        parent: None,
        numa_affinity: None,
        depth: 0,
    }]);

    while let Some(item) = queue.pop_front() {
        let component = resolve_or_degrade(item.object);
        let numa_affinity = if component == ComponentType::Memory {
            item.object.os_index.or(item.numa_affinity)
        } else {
            item.numa_affinity
        };
        let key = if item.depth == 0 {
            Some(machine_key(hostname))
        } else if component.is_a(ComponentType::PciDevice) {
            item.object.attributes.pci.map(|pci| pci_key(pci.bdfid()))
        } else {
            None
        };

        let vertex = visit(&item, component, numa_affinity, key)?;
        for child in &item.object.children {
            queue.push_back(Pending {
                object: child,
                parent: vertex,
                numa_affinity,
                depth: item.depth + 1,
            });
        }
    }
    Ok(())
}

fn export_object(graph: &TopologyGraph, vertex: VertexId) -> Option<TopologyObject> {
    let adapter = graph.adapter_of::<TopologyAdapter>(vertex)?;
    let children = graph
        .children(vertex)
        .into_iter()
        .filter_map(|child| export_object(graph, child))
        .collect();
    Some(adapter.to_object(children))
}

impl Module for TopologyModule {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn is_main_module(&self) -> bool {
        true
    }

    fn description(&self) -> &'static str {
        "hardware-locality topology walk: machine, memory, packages, caches, cores, PCI and OS devices"
    }

    fn property_tables(&self) -> Vec<PropertyTable> {
        vec![TopologyAdapter::property_table()]
    }

    fn init_graph(&mut self, graph: &mut TopologyGraph) -> Result<(), ModuleError> {
        self.load()?;
        let snapshot = self.snapshot()?;
        if native::resolve(&snapshot.root).ok() != Some(ComponentType::Node) {
            return Err(ModuleError::InitFailure {
                module: MODULE_NAME,
                reason: format!("root object is '{}', not a machine", snapshot.root.object_type),
            });
        }
        let hostname = self.hostname_for(snapshot);

        walk(snapshot, &hostname, |item, component, numa_affinity, key| {
            let vertex = graph.add_vertex(key.as_ref().map(|k| k.to_string()));
            graph.assign_component(vertex, component)?;
            if let Some(key) = &key {
                graph.set_correlation_key(vertex, key.clone())?;
            }
            let adapter = TopologyAdapter::new(item.object, numa_affinity, item.depth, key);
            graph.attach_adapter(vertex, Box::new(adapter))?;
            match item.parent {
                Some(parent) => {
                    graph.add_child(parent, vertex)?;
                }
                None => graph.set_root(vertex)?,
            }
            Ok(Some(vertex))
        })?;

        info!(
            module = MODULE_NAME,
            hostname = %hostname,
            vertices = graph.vertex_count(),
            "topology graph built"
        );
        Ok(())
    }

    fn init_graph_secondary(&mut self, graph: &mut TopologyGraph) -> Result<(), ModuleError> {
        self.load()?;
        let snapshot = self.snapshot()?;
        let hostname = self.hostname_for(snapshot);

        let mut planned = Vec::new();
        walk(snapshot, &hostname, |item, component, numa_affinity, key| {
            if let Some(key) = key {
                let adapter =
                    TopologyAdapter::new(item.object, numa_affinity, item.depth, Some(key.clone()));
                planned.push((component, key, adapter));
            }
            Ok(None)
        })?;

        for (component, key, adapter) in planned {
            let label = Some(key.to_string());
            let outcome = correlate(graph, component, key, label, Box::new(adapter))?;
            debug!(module = MODULE_NAME, vertex = %outcome.vertex(), "correlated topology object");
        }
        Ok(())
    }

    fn export_graph(
        &self,
        graph: &TopologyGraph,
        out: &mut dyn io::Write,
    ) -> Result<(), ModuleError> {
        let root = graph
            .root()
            .and_then(|root| export_object(graph, root))
            .ok_or_else(|| ModuleError::BackendCallFailure {
                module: MODULE_NAME,
                reason: "graph root carries no topology object".to_string(),
            })?;
        let hostname = self
            .hostname
            .clone()
            .or_else(|| self.snapshot.as_ref().and_then(|s| s.hostname.clone()));
        let snapshot = TopologySnapshot {
            format_version: TOPOLOGY_FORMAT_VERSION,
            hostname,
            root,
        };
        serde_json::to_writer_pretty(out, &snapshot).map_err(|err| {
            ModuleError::BackendCallFailure {
                module: MODULE_NAME,
                reason: err.to_string(),
            }
        })
    }

    fn shutdown(&mut self) -> Result<(), ModuleError> {
        self.snapshot = None;
        Ok(())
    }
}
