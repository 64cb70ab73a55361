//! Merge behavior of the builder with in-test backend modules.
//!
//! The main module builds machine -> pci placeholder devices; the
//! secondary module reports devices by key plus symmetric links between
//! them, the way an accelerator backend does.

use std::any::Any;
use std::collections::BTreeSet;

use proptest::prelude::*;

use hwgraph_core::{
    Adapter, ComponentType, CorrelationKey, LinkInfo, LinkKind, PropertyTable, TopologyEdge,
    TopologyGraph,
};
use hwgraph_engine::{
    correlate, link_symmetric, GraphBuilder, Module, ModuleError, ModuleStatus,
};

// ---------------------------------------------------------------------------
// Test modules
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct BaseAdapter {
    index: u32,
}

impl Adapter for BaseAdapter {
    fn module(&self) -> &'static str {
        "base"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
struct DeviceAdapter {
    bus_id: u64,
    memory: u64,
}

impl Adapter for DeviceAdapter {
    fn module(&self) -> &'static str {
        "devices"
    }

    fn correlation_key(&self) -> Option<CorrelationKey> {
        Some(pci_key(self.bus_id))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn pci_key(bus_id: u64) -> CorrelationKey {
    CorrelationKey::new(format!("bdfid:{bus_id}"))
}

/// Builds a machine with one unresolved device per bus id.
struct Base {
    placeholders: Vec<u64>,
}

impl Module for Base {
    fn name(&self) -> &'static str {
        "base"
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn is_main_module(&self) -> bool {
        true
    }

    fn property_tables(&self) -> Vec<PropertyTable> {
        vec![PropertyTable::builder::<BaseAdapter>("base")
            .property("os_index", |a: &BaseAdapter| Some(a.index))
            .build()]
    }

    fn init_graph(&mut self, graph: &mut TopologyGraph) -> Result<(), ModuleError> {
        let machine = graph.add_vertex(Some("machine:n01".into()));
        graph.assign_component(machine, ComponentType::Node)?;
        graph.set_correlation_key(machine, "machine:n01".into())?;
        graph.attach_adapter(machine, Box::new(BaseAdapter { index: 0 }))?;
        graph.set_root(machine)?;
        for (i, bus_id) in self.placeholders.iter().enumerate() {
            let key = pci_key(*bus_id);
            let device = graph.add_vertex(Some(key.to_string()));
            graph.assign_component(device, ComponentType::Device)?;
            graph.set_correlation_key(device, key)?;
            graph.attach_adapter(device, Box::new(BaseAdapter { index: i as u32 + 1 }))?;
            graph.add_child(machine, device)?;
        }
        Ok(())
    }

    fn init_graph_secondary(&mut self, _graph: &mut TopologyGraph) -> Result<(), ModuleError> {
        Err(ModuleError::NotSupported)
    }
}

/// Reports devices by bus id and links every consecutive pair.
struct Devices {
    bus_ids: Vec<u64>,
    reachable: bool,
}

impl Devices {
    fn probe(&self) -> Result<Vec<DeviceAdapter>, ModuleError> {
        if !self.reachable {
            return Err(ModuleError::BackendCallFailure {
                module: "devices",
                reason: "backend unreachable".into(),
            });
        }
        Ok(self
            .bus_ids
            .iter()
            .map(|&bus_id| DeviceAdapter {
                bus_id,
                memory: bus_id * 1024,
            })
            .collect())
    }

    fn merge(&self, graph: &mut TopologyGraph) -> Result<(), ModuleError> {
        let devices = self.probe()?;
        let mut vertices = Vec::new();
        for device in devices {
            let key = device.correlation_key().ok_or(ModuleError::NotSupported)?;
            let label = Some(key.to_string());
            let found = correlate(graph, ComponentType::PciDevice, key, label, Box::new(device))?;
            vertices.push(found.vertex());
        }
        for pair in vertices.windows(2) {
            if pair[0] == pair[1] {
                continue;
            }
            let link = TopologyEdge::Interconnect(LinkInfo {
                kind: LinkKind::Xgmi,
                hops: Some(1),
                ..LinkInfo::default()
            });
            link_symmetric(graph, pair[0], pair[1], link)?;
        }
        Ok(())
    }
}

impl Module for Devices {
    fn name(&self) -> &'static str {
        "devices"
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn property_tables(&self) -> Vec<PropertyTable> {
        vec![PropertyTable::builder::<DeviceAdapter>("devices")
            .property("bdfid", |a: &DeviceAdapter| Some(a.bus_id))
            .property("memory", |a: &DeviceAdapter| Some(a.memory))
            .build()]
    }

    fn init_graph_secondary(&mut self, graph: &mut TopologyGraph) -> Result<(), ModuleError> {
        self.merge(graph)
    }

    fn update_graph(&mut self, graph: &mut TopologyGraph) -> Result<(), ModuleError> {
        self.merge(graph)
    }
}

fn builder(placeholders: Vec<u64>, bus_ids: Vec<u64>) -> GraphBuilder {
    let mut builder = GraphBuilder::new();
    builder
        .register(Box::new(Base { placeholders }))
        .register(Box::new(Devices {
            bus_ids,
            reachable: true,
        }));
    builder
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn key_match_lands_on_placeholder_vertex() {
    let (graph, report) = builder(vec![768], vec![768]).build().unwrap();
    assert!(report.is_clean());

    let device = graph.find_by_key(&pci_key(768)).unwrap();
    let vertex = graph.vertex(device).unwrap();
    assert_eq!(vertex.adapters().len(), 2);
    assert_eq!(vertex.component(), ComponentType::Device);
    assert_eq!(graph.vertex_count(), 2);

    // First adapter answers its own names, the second fills in the rest.
    assert_eq!(graph.property(device, "os_index").as_deref(), Some("1"));
    assert_eq!(graph.property(device, "memory").as_deref(), Some("786432"));
}

#[test]
fn two_new_devices_get_one_symmetric_link() {
    let mut builder = builder(vec![], vec![1, 2]);
    let (base_edges, base_vertices) = {
        let mut graph = TopologyGraph::new();
        let mut base = Base {
            placeholders: vec![],
        };
        base.init_graph(&mut graph).unwrap();
        (graph.edge_count(), graph.vertex_count())
    };

    let (graph, _) = builder.build().unwrap();
    let k1 = graph.find_by_key(&pci_key(1)).unwrap();
    let k2 = graph.find_by_key(&pci_key(2)).unwrap();
    assert_ne!(k1, k2);
    assert_eq!(graph.vertex_count(), base_vertices + 2);
    assert_eq!(graph.edge_count(), base_edges + 2);

    let new_edges: Vec<_> = graph.edges().skip(base_edges).collect();
    assert!(new_edges.iter().all(|e| e.edge.is_relational()));
    let directions: BTreeSet<_> = new_edges.iter().map(|e| (e.source, e.target)).collect();
    assert_eq!(directions, BTreeSet::from([(k1, k2), (k2, k1)]));
}

#[test]
fn rerunning_secondary_is_idempotent() {
    let mut builder = builder(vec![5], vec![5, 6, 7]);
    let (mut graph, _) = builder.build().unwrap();
    let before = (graph.vertex_count(), graph.edge_count(), graph.adapter_count());

    for _ in 0..3 {
        let report = builder.update(&mut graph).unwrap();
        assert_eq!(report.status_of("devices"), Some(ModuleStatus::Success));
    }
    let after = (graph.vertex_count(), graph.edge_count(), graph.adapter_count());
    assert_eq!(before, after);
    graph.check_consistency().unwrap();
}

#[test]
fn unreachable_backend_on_update_is_isolated() {
    let mut builder = GraphBuilder::new();
    builder
        .register(Box::new(Base {
            placeholders: vec![3],
        }))
        .register(Box::new(Devices {
            bus_ids: vec![3, 4],
            reachable: true,
        }))
        .register(Box::new(Devices {
            bus_ids: vec![9],
            reachable: false,
        }));
    let (mut graph, report) = builder.build().unwrap();
    assert_eq!(report.failures().count(), 1);
    let snapshot = (graph.vertex_count(), graph.edge_count(), graph.adapter_count());

    let report = builder.update(&mut graph).unwrap();
    let failed: Vec<_> = report.failures().map(|o| o.status).collect();
    assert_eq!(failed, vec![ModuleStatus::BackendCallFailure]);
    assert_eq!(
        (graph.vertex_count(), graph.edge_count(), graph.adapter_count()),
        snapshot
    );
    let root = graph.root().unwrap();
    assert_eq!(graph.vertex(root).unwrap().component(), ComponentType::Node);
}

#[test]
fn device_key_on_machine_vertex_aborts_the_pass() {
    let mut builder = GraphBuilder::new();
    builder.register(Box::new(Base {
        placeholders: vec![],
    }));
    builder.register(Box::new(Colliding));
    assert!(builder.build().is_err());
}

/// Reports a PCI device under the machine's key.
struct Colliding;

impl Module for Colliding {
    fn name(&self) -> &'static str {
        "devices"
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn property_tables(&self) -> Vec<PropertyTable> {
        Vec::new()
    }

    fn init_graph_secondary(&mut self, graph: &mut TopologyGraph) -> Result<(), ModuleError> {
        let adapter = DeviceAdapter {
            bus_id: 0,
            memory: 0,
        };
        correlate(
            graph,
            ComponentType::PciDevice,
            "machine:n01".into(),
            None,
            Box::new(adapter),
        )?;
        Ok(())
    }
}

proptest! {
    #[test]
    fn correlation_is_injective_per_pass(
        placeholders in proptest::collection::btree_set(0u64..32, 0..6),
        reported in proptest::collection::vec(0u64..32, 0..12),
    ) {
        let placeholders: Vec<u64> = placeholders.into_iter().collect();
        let distinct: BTreeSet<u64> = placeholders.iter().chain(reported.iter()).copied().collect();

        let (graph, _) = builder(placeholders, reported).build().unwrap();

        // One vertex per distinct key, plus the machine.
        let keyed: Vec<_> = graph
            .vertices()
            .filter_map(|(_, v)| v.correlation_key().cloned())
            .collect();
        prop_assert_eq!(keyed.len(), distinct.len() + 1);
        for bus_id in distinct {
            let vertex = graph.find_by_key(&pci_key(bus_id));
            prop_assert!(vertex.is_some());
            let carriers = graph
                .vertices()
                .filter(|(_, v)| v.correlation_key() == Some(&pci_key(bus_id)))
                .count();
            prop_assert_eq!(carriers, 1);
        }
        prop_assert!(graph.check_consistency().is_ok());
    }
}
