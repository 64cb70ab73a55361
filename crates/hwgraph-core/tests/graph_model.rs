//! Data-model tests over the public TopologyGraph API.
//!
//! Covers the containment hierarchy and category filtering, degradation of
//! unmapped native categories, and correlation-key injectivity under
//! arbitrary key assignment sequences.

use std::any::Any;
use std::collections::HashMap;

use proptest::prelude::*;

use hwgraph_core::{
    Adapter, ComponentType, CoreError, CorrelationKey, PropertyTable, TopologyEdge, TopologyGraph,
    VertexId,
};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct NativeObject {
    native_type: &'static str,
    memory: Option<u64>,
}

impl Adapter for NativeObject {
    fn module(&self) -> &'static str {
        "native"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn native_table() -> PropertyTable {
    PropertyTable::builder::<NativeObject>("native")
        .property("native_type", |a: &NativeObject| Some(a.native_type.to_string()))
        .property("memory", |a: &NativeObject| a.memory)
        .build()
}

/// machine -> 2 physical cores -> 2 logical cores each.
fn three_level_graph() -> (TopologyGraph, VertexId, Vec<VertexId>) {
    let mut graph = TopologyGraph::new();
    let machine = graph.add_vertex(Some("machine:n01".into()));
    graph.assign_component(machine, ComponentType::Node).unwrap();
    graph.set_root(machine).unwrap();

    let mut leaves = Vec::new();
    for _ in 0..2 {
        let core = graph.add_vertex(None);
        graph.assign_component(core, ComponentType::PhysicalCore).unwrap();
        graph.add_child(machine, core).unwrap();
        for _ in 0..2 {
            let pu = graph.add_vertex(None);
            graph.assign_component(pu, ComponentType::LogicalCore).unwrap();
            graph.add_child(core, pu).unwrap();
            leaves.push(pu);
        }
    }
    (graph, machine, leaves)
}

// ---------------------------------------------------------------------------
// Hierarchy and filtering
// ---------------------------------------------------------------------------

#[test]
fn root_of_three_level_hierarchy_is_the_machine() {
    let (graph, machine, _) = three_level_graph();
    let root = graph.root().unwrap();
    assert_eq!(root, machine);
    assert_eq!(graph.vertex(root).unwrap().component().name(), "node");
    assert_eq!(graph.parent(root), None);
}

#[test]
fn logical_core_filter_returns_exactly_the_leaves() {
    let (graph, _, leaves) = three_level_graph();
    let view = graph.of_component(ComponentType::LogicalCore);
    assert_eq!(view.vertex_ids().collect::<Vec<_>>(), leaves);
    for leaf in &leaves {
        assert!(graph.children(*leaf).is_empty());
    }
}

#[test]
fn every_structural_edge_has_its_reciprocal() {
    let (graph, _, _) = three_level_graph();
    graph.check_consistency().unwrap();
    for record in graph.edges() {
        let wanted = record.edge.reciprocal();
        assert!(graph.has_edge_where(record.target, record.source, |e| *e == wanted));
    }
    // 6 containment relations, 2 edges each.
    assert_eq!(graph.edge_count(), 12);
    assert!(graph.edges().all(|e| e.edge.is_structural()));
}

#[test]
fn vertex_ids_survive_later_insertions() {
    let (mut graph, machine, leaves) = three_level_graph();
    let before: Vec<_> = leaves
        .iter()
        .map(|v| graph.vertex(*v).unwrap().component())
        .collect();

    let gpu = graph.add_vertex(Some("bdfid:768".into()));
    graph.assign_component(gpu, ComponentType::PciDevice).unwrap();
    graph.add_child(machine, gpu).unwrap();

    let after: Vec<_> = leaves
        .iter()
        .map(|v| graph.vertex(*v).unwrap().component())
        .collect();
    assert_eq!(before, after);
    assert_eq!(graph.children(machine).last(), Some(&gpu));
}

// ---------------------------------------------------------------------------
// Degradation of unmapped categories
// ---------------------------------------------------------------------------

#[test]
fn unmapped_native_category_degrades_and_stays_queryable() {
    let mut graph = TopologyGraph::new();
    graph.register_properties(native_table());

    let resolved = match "coprocessor".parse::<ComponentType>() {
        Ok(component) => component,
        Err(CoreError::TaxonomyMappingMissing { native }) => {
            assert_eq!(native, "coprocessor");
            ComponentType::Unknown.placeholder()
        }
        Err(other) => panic!("unexpected error: {other}"),
    };
    assert_eq!(resolved, ComponentType::Unknown);

    let v = graph.add_vertex(None);
    graph.assign_component(v, resolved).unwrap();
    graph
        .attach_adapter(
            v,
            Box::new(NativeObject {
                native_type: "coprocessor",
                memory: None,
            }),
        )
        .unwrap();

    let all = graph.filtered_view(|_| true);
    assert!(all.contains(v));
    assert_eq!(graph.property(v, "native_type").as_deref(), Some("coprocessor"));
    assert_eq!(graph.property(v, "memory"), None);
    assert_eq!(graph.property(v, "cache_size"), None);
}

#[test]
fn unknown_is_its_own_placeholder() {
    assert_eq!(ComponentType::Unknown.placeholder(), ComponentType::Unknown);
    assert_eq!(ComponentType::Gpu.placeholder(), ComponentType::Accelerator);
    assert_eq!(ComponentType::L3DataCache.placeholder(), ComponentType::DataCache);
}

// ---------------------------------------------------------------------------
// Key injectivity
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn correlation_keys_are_injective(
        assignments in proptest::collection::vec((0usize..8, 0u32..6), 1..40)
    ) {
        let mut graph = TopologyGraph::new();
        let vertices: Vec<_> = (0..8).map(|_| graph.add_vertex(None)).collect();
        let mut model: HashMap<CorrelationKey, VertexId> = HashMap::new();
        let mut keyed: HashMap<VertexId, CorrelationKey> = HashMap::new();

        for (slot, key) in assignments {
            let vertex = vertices[slot];
            let key = CorrelationKey::new(format!("bdfid:{key}"));
            let result = graph.set_correlation_key(vertex, key.clone());

            match (model.get(&key), keyed.get(&vertex)) {
                (Some(holder), _) if *holder == vertex => prop_assert!(result.is_ok()),
                (Some(_), _) => {
                    let is_collision = matches!(result, Err(CoreError::KeyCollision { .. }));
                    prop_assert!(is_collision);
                }
                (None, Some(_)) => prop_assert!(result.is_err()),
                (None, None) => {
                    prop_assert!(result.is_ok());
                    model.insert(key.clone(), vertex);
                    keyed.insert(vertex, key);
                }
            }
        }

        for (key, holder) in &model {
            prop_assert_eq!(graph.find_by_key(key), Some(*holder));
        }
        prop_assert!(graph.check_consistency().is_ok());
    }

    #[test]
    fn component_assigned_at_most_once(
        first in proptest::sample::select(ComponentType::ALL.to_vec()),
        second in proptest::sample::select(ComponentType::ALL.to_vec()),
    ) {
        let mut graph = TopologyGraph::new();
        let v = graph.add_vertex(None);
        graph.assign_component(v, first).unwrap();
        let result = graph.assign_component(v, second);
        if first == second {
            prop_assert!(result.is_ok());
        } else {
            let is_conflict = matches!(result, Err(CoreError::ComponentConflict { .. }));
            prop_assert!(is_conflict);
            prop_assert!(result.unwrap_err().is_consistency_violation());
        }
        prop_assert_eq!(graph.vertex(v).unwrap().component(), first);
    }
}

#[test]
fn interconnects_are_not_part_of_containment() {
    let (mut graph, machine, leaves) = three_level_graph();
    graph
        .add_symmetric(leaves[0], leaves[3], TopologyEdge::Interconnect(Default::default()))
        .unwrap();
    assert_eq!(graph.parent(leaves[3]).map(|p| graph.parent(p)), Some(Some(machine)));
    assert!(graph.children(leaves[0]).is_empty());
    graph.check_consistency().unwrap();
}

#[test]
fn wide_machine_builds_in_one_pass() {
    // Tens of thousands of keyed leaves under one root; insertion checks
    // only look at the new pair or key.
    let mut graph = TopologyGraph::new();
    let root = graph.add_vertex(Some("machine:wide".into()));
    graph.assign_component(root, ComponentType::Node).unwrap();
    graph.set_root(root).unwrap();
    for i in 0..40_000u32 {
        let leaf = graph.add_vertex(None);
        graph.assign_component(leaf, ComponentType::LogicalCore).unwrap();
        graph
            .set_correlation_key(leaf, CorrelationKey::new(format!("pu:{i}")))
            .unwrap();
        graph.add_child(root, leaf).unwrap();
    }
    assert_eq!(graph.vertex_count(), 40_001);
    assert_eq!(graph.edge_count(), 80_000);
    assert_eq!(graph.children(root).len(), 40_000);
    graph.check_consistency().unwrap();
}
