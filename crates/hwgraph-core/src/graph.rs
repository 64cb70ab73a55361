//! TopologyGraph: the single owner of vertices, edges and adapters.
//!
//! [`TopologyGraph`] wraps a petgraph `StableGraph<Vertex, TopologyEdge>` and
//! is the only entry point for mutating it. It enforces the data-model
//! invariants at insertion time:
//!
//! - a vertex's component type is assigned at most once,
//! - structural edges are inserted as a reciprocal pair in one call, after
//!   both endpoints were validated, so no partial state is ever observable,
//! - a vertex's adapter list only grows,
//! - a correlation key identifies at most one vertex.
//!
//! Nothing is ever removed, so every [`VertexId`] handed out stays valid for
//! the lifetime of the graph, including across dynamic probing ticks.
//!
//! Adapters live in an arena owned by the graph and are dropped together with
//! it. Property queries go through the [`PropertyRegistry`] the graph holds.
//!
//! The one exception to "nothing is removed" is [`TopologyGraph::rollback`],
//! which undoes a failed module's contribution back to a [`Checkpoint`].
//! Only elements created after the checkpoint are removed, so handles taken
//! before it stay valid.

use std::collections::HashMap;

use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::stable_graph::StableGraph;
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Direction};

use crate::adapter::{Adapter, CorrelationKey};
use crate::component::ComponentType;
use crate::edge::TopologyEdge;
use crate::error::CoreError;
use crate::id::{AdapterId, EdgeId, VertexId};
use crate::property::{PropertyKind, PropertyRegistry, PropertyTable, PropertyValue};
use crate::vertex::Vertex;

/// A borrowed edge with its endpoints.
#[derive(Debug, Clone, Copy)]
pub struct EdgeRecord<'g> {
    pub id: EdgeId,
    pub source: VertexId,
    pub target: VertexId,
    pub edge: &'g TopologyEdge,
}

/// A state a [`TopologyGraph`] can be rolled back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    vertices: usize,
    edges: usize,
    adapters: usize,
    root: Option<VertexId>,
}

/// Attribute writes since the last checkpoint.
#[derive(Debug, Default)]
struct Journal {
    assigned: Vec<VertexId>,
    keyed: Vec<VertexId>,
    /// Relational edges overwritten in place, with their previous value.
    rewritten: Vec<(EdgeIndex<u32>, TopologyEdge)>,
}

/// The hardware topology graph.
#[derive(Debug, Default)]
pub struct TopologyGraph {
    graph: StableGraph<Vertex, TopologyEdge, Directed, u32>,
    /// Adapter arena, indexed by `AdapterId.0`.
    adapters: Vec<Box<dyn Adapter>>,
    properties: PropertyRegistry,
    /// Correlation key -> the one vertex holding it.
    keys: HashMap<CorrelationKey, VertexId>,
    /// Label -> first vertex created with it.
    labels: HashMap<String, VertexId>,
    root: Option<VertexId>,
    journal: Journal,
}

impl TopologyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Property registration
    // -----------------------------------------------------------------------

    /// Registers a module's property table. Returns `false` if a table for
    /// the same adapter type was already registered.
    pub fn register_properties(&mut self, table: PropertyTable) -> bool {
        self.properties.register(table)
    }

    pub fn properties(&self) -> &PropertyRegistry {
        &self.properties
    }

    // -----------------------------------------------------------------------
    // Vertices
    // -----------------------------------------------------------------------

    /// Adds a vertex with an optional stable label.
    pub fn add_vertex(&mut self, label: Option<String>) -> VertexId {
        let idx = self.graph.add_node(Vertex::new(label.clone()));
        let id = VertexId::from(idx);
        if let Some(label) = label {
            self.labels.entry(label).or_insert(id);
        }
        id
    }

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.graph.node_weight(id.into())
    }

    pub fn contains(&self, id: VertexId) -> bool {
        self.vertex(id).is_some()
    }

    fn vertex_mut(&mut self, id: VertexId) -> Result<&mut Vertex, CoreError> {
        self.graph
            .node_weight_mut(id.into())
            .ok_or(CoreError::VertexNotFound { id })
    }

    /// Assigns a vertex's component type.
    ///
    /// Assigning the type the vertex already has is a no-op. Assigning a
    /// different one fails with [`CoreError::ComponentConflict`].
    pub fn assign_component(
        &mut self,
        id: VertexId,
        component: ComponentType,
    ) -> Result<(), CoreError> {
        let vertex = self.vertex_mut(id)?;
        match vertex.resolved_component() {
            None => {
                vertex.set_component(component);
                self.journal.assigned.push(id);
                Ok(())
            }
            Some(existing) if existing == component => Ok(()),
            Some(existing) => Err(CoreError::ComponentConflict {
                vertex: id,
                existing,
                requested: component,
            }),
        }
    }

    /// Gives a vertex its correlation key.
    ///
    /// Fails with [`CoreError::KeyCollision`] if another vertex holds the key,
    /// and with [`CoreError::GraphInconsistency`] if the vertex already holds a
    /// different key. Re-assigning the same key is a no-op.
    pub fn set_correlation_key(
        &mut self,
        id: VertexId,
        key: CorrelationKey,
    ) -> Result<(), CoreError> {
        if let Some(&holder) = self.keys.get(&key) {
            if holder == id {
                return Ok(());
            }
            return Err(CoreError::KeyCollision {
                key,
                holder,
                requested: format!("vertex {id}"),
            });
        }
        let vertex = self.vertex_mut(id)?;
        if let Some(existing) = vertex.correlation_key() {
            return Err(CoreError::GraphInconsistency {
                reason: format!("vertex {id} already keyed as '{existing}', cannot re-key as '{key}'"),
            });
        }
        vertex.set_key(key.clone());
        self.keys.insert(key, id);
        self.journal.keyed.push(id);

        #[cfg(debug_assertions)]
        self.assert_keyed(id);

        Ok(())
    }

    /// The vertex holding `key`, if any.
    pub fn find_by_key(&self, key: &CorrelationKey) -> Option<VertexId> {
        self.keys.get(key).copied()
    }

    /// The first vertex created with `label`, if any.
    pub fn find_by_label(&self, label: &str) -> Option<VertexId> {
        self.labels.get(label).copied()
    }

    /// Iterates all vertices in id order.
    pub fn vertices(&self) -> impl Iterator<Item = (VertexId, &Vertex)> + '_ {
        self.graph
            .node_indices()
            .map(move |idx| (VertexId::from(idx), &self.graph[idx]))
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    // -----------------------------------------------------------------------
    // Root
    // -----------------------------------------------------------------------

    pub fn root(&self) -> Option<VertexId> {
        self.root
    }

    pub fn set_root(&mut self, id: VertexId) -> Result<(), CoreError> {
        if !self.contains(id) {
            return Err(CoreError::VertexNotFound { id });
        }
        self.root = Some(id);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Adapters
    // -----------------------------------------------------------------------

    /// Appends an adapter to a vertex. The graph takes ownership of it.
    pub fn attach_adapter(
        &mut self,
        id: VertexId,
        adapter: Box<dyn Adapter>,
    ) -> Result<AdapterId, CoreError> {
        let adapter_id = AdapterId(self.adapters.len() as u32);
        self.vertex_mut(id)?.push_adapter(adapter_id);
        self.adapters.push(adapter);
        Ok(adapter_id)
    }

    pub fn adapter(&self, id: AdapterId) -> Option<&dyn Adapter> {
        self.adapters.get(id.0 as usize).map(|a| a.as_ref())
    }

    /// Adapters of a vertex in attachment order.
    pub fn adapters_of(&self, id: VertexId) -> impl Iterator<Item = &dyn Adapter> + '_ {
        self.vertex(id)
            .map(|v| v.adapters())
            .unwrap_or(&[])
            .iter()
            .filter_map(move |&a| self.adapter(a))
    }

    /// The first adapter of concrete type `A` attached to a vertex.
    pub fn adapter_of<A: Adapter>(&self, id: VertexId) -> Option<&A> {
        self.adapters_of(id)
            .find_map(|a| a.as_any().downcast_ref::<A>())
    }

    /// Returns `true` if a vertex already carries an adapter from `module`.
    pub fn has_adapter_from(&self, id: VertexId, module: &str) -> bool {
        self.adapters_of(id).any(|a| a.module() == module)
    }

    pub fn adapter_count(&self) -> usize {
        self.adapters.len()
    }

    // -----------------------------------------------------------------------
    // Edges
    // -----------------------------------------------------------------------

    fn require(&self, id: VertexId) -> Result<NodeIndex<u32>, CoreError> {
        let idx: NodeIndex<u32> = id.into();
        if self.graph.node_weight(idx).is_none() {
            return Err(CoreError::VertexNotFound { id });
        }
        Ok(idx)
    }

    /// Adds a single directed relational edge.
    ///
    /// Structural edges are rejected: they must go through
    /// [`add_child`](Self::add_child) so both directions are inserted
    /// together.
    pub fn add_edge(
        &mut self,
        source: VertexId,
        target: VertexId,
        edge: TopologyEdge,
    ) -> Result<EdgeId, CoreError> {
        if edge.is_structural() {
            return Err(CoreError::InvalidEdge {
                reason: format!("structural edge '{}' must be added as a pair", edge.name()),
            });
        }
        let from = self.require(source)?;
        let to = self.require(target)?;
        Ok(EdgeId::from(self.graph.add_edge(from, to, edge)))
    }

    /// Makes `child` a child of `parent`, inserting the `Child` and `Parent`
    /// edges together.
    ///
    /// Fails without inserting anything if either vertex is unknown, if they
    /// are the same vertex, or if `child` already has a parent.
    pub fn add_child(
        &mut self,
        parent: VertexId,
        child: VertexId,
    ) -> Result<(EdgeId, EdgeId), CoreError> {
        let p = self.require(parent)?;
        let c = self.require(child)?;
        if p == c {
            return Err(CoreError::InvalidEdge {
                reason: format!("vertex {parent} cannot contain itself"),
            });
        }
        if let Some(existing) = self.parent(child) {
            return Err(CoreError::InvalidEdge {
                reason: format!("vertex {child} already has parent {existing}"),
            });
        }

        let down = self.graph.add_edge(p, c, TopologyEdge::Child);
        let up = self.graph.add_edge(c, p, TopologyEdge::Parent);

        #[cfg(debug_assertions)]
        self.assert_contained(p, c);

        Ok((EdgeId::from(down), EdgeId::from(up)))
    }

    /// Inserts a relational edge in both directions.
    pub fn add_symmetric(
        &mut self,
        a: VertexId,
        b: VertexId,
        edge: TopologyEdge,
    ) -> Result<(EdgeId, EdgeId), CoreError> {
        if edge.is_structural() {
            return Err(CoreError::InvalidEdge {
                reason: format!("structural edge '{}' must be added with add_child", edge.name()),
            });
        }
        let ia = self.require(a)?;
        let ib = self.require(b)?;
        if ia == ib {
            return Err(CoreError::InvalidEdge {
                reason: format!("vertex {a} cannot be linked to itself"),
            });
        }
        let back = edge.reciprocal();
        let forward = self.graph.add_edge(ia, ib, edge);
        let backward = self.graph.add_edge(ib, ia, back);
        Ok((EdgeId::from(forward), EdgeId::from(backward)))
    }

    /// Overwrites the relational edges of `edge`'s kind between `a` and `b`
    /// with `edge` one way and its reciprocal the other.
    ///
    /// Returns `true` if a stored value changed. Nothing is inserted.
    pub fn refresh_symmetric(
        &mut self,
        a: VertexId,
        b: VertexId,
        edge: TopologyEdge,
    ) -> Result<bool, CoreError> {
        if edge.is_structural() {
            return Err(CoreError::InvalidEdge {
                reason: format!("structural edge '{}' cannot be rewritten", edge.name()),
            });
        }
        let ia = self.require(a)?;
        let ib = self.require(b)?;
        let back = edge.reciprocal();

        let mut changed = false;
        for (from, to, value) in [(ia, ib, edge), (ib, ia, back)] {
            let stale: Vec<EdgeIndex<u32>> = self
                .graph
                .edges_directed(from, Direction::Outgoing)
                .filter(|e| {
                    e.target() == to && e.weight().name() == value.name() && *e.weight() != value
                })
                .map(|e| e.id())
                .collect();
            for idx in stale {
                let previous = std::mem::replace(&mut self.graph[idx], value.clone());
                self.journal.rewritten.push((idx, previous));
                changed = true;
            }
        }
        Ok(changed)
    }

    pub fn edge(&self, id: EdgeId) -> Option<EdgeRecord<'_>> {
        let idx: EdgeIndex<u32> = id.into();
        let (s, t) = self.graph.edge_endpoints(idx)?;
        Some(EdgeRecord {
            id,
            source: s.into(),
            target: t.into(),
            edge: &self.graph[idx],
        })
    }

    /// Iterates all edges in id order.
    pub fn edges(&self) -> impl Iterator<Item = EdgeRecord<'_>> + '_ {
        self.graph.edge_indices().filter_map(move |idx| self.edge(idx.into()))
    }

    /// Outgoing edges of a vertex, oldest first.
    pub fn edges_from(&self, id: VertexId) -> Vec<EdgeRecord<'_>> {
        let mut out: Vec<_> = self
            .graph
            .edges_directed(id.into(), Direction::Outgoing)
            .map(|e| EdgeRecord {
                id: e.id().into(),
                source: e.source().into(),
                target: e.target().into(),
                edge: e.weight(),
            })
            .collect();
        out.sort_by_key(|e| e.id);
        out
    }

    /// Returns `true` if an edge from `source` to `target` satisfies `pred`.
    pub fn has_edge_where(
        &self,
        source: VertexId,
        target: VertexId,
        pred: impl Fn(&TopologyEdge) -> bool,
    ) -> bool {
        let target: NodeIndex<u32> = target.into();
        self.graph
            .edges_directed(source.into(), Direction::Outgoing)
            .any(|e| e.target() == target && pred(e.weight()))
    }

    /// Children of a vertex in insertion order.
    pub fn children(&self, id: VertexId) -> Vec<VertexId> {
        self.edges_from(id)
            .into_iter()
            .filter(|e| matches!(e.edge, TopologyEdge::Child))
            .map(|e| e.target)
            .collect()
    }

    /// The containing vertex, if any.
    pub fn parent(&self, id: VertexId) -> Option<VertexId> {
        self.graph
            .edges_directed(id.into(), Direction::Outgoing)
            .find(|e| matches!(e.weight(), TopologyEdge::Parent))
            .map(|e| e.target().into())
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    /// A lazy view over the vertices satisfying `predicate` and the edges
    /// between them. Nothing is copied.
    pub fn filtered_view<F>(&self, predicate: F) -> FilteredView<'_, F>
    where
        F: Fn(&Vertex) -> bool,
    {
        FilteredView {
            graph: self,
            predicate,
        }
    }

    /// View over vertices whose category is-a `component`.
    pub fn of_component(
        &self,
        component: ComponentType,
    ) -> FilteredView<'_, impl Fn(&Vertex) -> bool> {
        self.filtered_view(move |v: &Vertex| v.is_a(component))
    }

    // -----------------------------------------------------------------------
    // Property queries
    // -----------------------------------------------------------------------

    /// Typed cross-adapter query: the first attached adapter, in attachment
    /// order, whose table yields a present value for `name` wins.
    pub fn property_value(&self, id: VertexId, name: &str) -> Option<PropertyValue> {
        self.adapters_of(id)
            .find_map(|adapter| self.properties.value(adapter, name))
    }

    /// Textual cross-adapter query.
    pub fn property(&self, id: VertexId, name: &str) -> Option<String> {
        self.property_value(id, name).map(|v| v.to_string())
    }

    /// Cross-adapter query converted to a concrete Rust type.
    pub fn property_as<T: PropertyKind>(&self, id: VertexId, name: &str) -> Option<T> {
        self.property_value(id, name).and_then(T::from_value)
    }

    /// Every property name declared by the tables of a vertex's adapters,
    /// first occurrence order.
    pub fn property_names(&self, id: VertexId) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = Vec::new();
        for adapter in self.adapters_of(id) {
            if let Some(table) = self.properties.table_for(adapter) {
                for name in table.names() {
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
        }
        names
    }

    // -----------------------------------------------------------------------
    // Consistency
    // -----------------------------------------------------------------------

    /// Verifies the structural invariants: every structural edge has its
    /// reciprocal, no vertex has two parents, and the key index matches the
    /// keys stored on vertices.
    pub fn check_consistency(&self) -> Result<(), CoreError> {
        for record in self.edges() {
            if !record.edge.is_structural() {
                continue;
            }
            let wanted = record.edge.reciprocal();
            if !self.has_edge_where(record.target, record.source, |e| *e == wanted) {
                return Err(CoreError::GraphInconsistency {
                    reason: format!(
                        "{} edge {} -> {} has no reciprocal",
                        record.edge.name(),
                        record.source,
                        record.target
                    ),
                });
            }
        }

        for (id, vertex) in self.vertices() {
            let parents = self
                .graph
                .edges_directed(id.into(), Direction::Outgoing)
                .filter(|e| matches!(e.weight(), TopologyEdge::Parent))
                .count();
            if parents > 1 {
                return Err(CoreError::GraphInconsistency {
                    reason: format!("vertex {id} has {parents} parents"),
                });
            }
            if let Some(key) = vertex.correlation_key() {
                if self.keys.get(key) != Some(&id) {
                    return Err(CoreError::GraphInconsistency {
                        reason: format!("key '{key}' of vertex {id} is not indexed to it"),
                    });
                }
            }
        }

        if self.keys.len() != self.vertices().filter(|(_, v)| v.correlation_key().is_some()).count() {
            return Err(CoreError::GraphInconsistency {
                reason: "key index holds keys no vertex carries".to_string(),
            });
        }
        Ok(())
    }

    /// Checks the pair [`add_child`](Self::add_child) just inserted.
    #[cfg(debug_assertions)]
    fn assert_contained(&self, parent: NodeIndex<u32>, child: NodeIndex<u32>) {
        let parents: Vec<NodeIndex<u32>> = self
            .graph
            .edges_directed(child, Direction::Outgoing)
            .filter(|e| matches!(e.weight(), TopologyEdge::Parent))
            .map(|e| e.target())
            .collect();
        assert_eq!(parents, [parent], "vertex {} must have exactly one parent", VertexId::from(child));
        assert!(
            self.graph
                .edges_directed(parent, Direction::Outgoing)
                .any(|e| e.target() == child && matches!(e.weight(), TopologyEdge::Child)),
            "child edge {} -> {} missing",
            VertexId::from(parent),
            VertexId::from(child)
        );
    }

    /// Checks the key [`set_correlation_key`](Self::set_correlation_key)
    /// just stored.
    #[cfg(debug_assertions)]
    fn assert_keyed(&self, id: VertexId) {
        let key = self.vertex(id).and_then(|v| v.correlation_key());
        assert!(
            key.is_some_and(|k| self.keys.get(k) == Some(&id)),
            "key of vertex {id} is not indexed to it"
        );
    }

    // -----------------------------------------------------------------------
    // Rollback
    // -----------------------------------------------------------------------

    /// Marks the current state and starts recording attribute writes.
    ///
    /// Only the most recent checkpoint can be rolled back to.
    pub fn checkpoint(&mut self) -> Checkpoint {
        self.journal = Journal::default();
        Checkpoint {
            vertices: self.graph.node_count(),
            edges: self.graph.edge_count(),
            adapters: self.adapters.len(),
            root: self.root,
        }
    }

    /// Undoes everything done since `checkpoint`: vertices, edges and
    /// adapters added, components and keys assigned, relational edges
    /// refreshed, and the root. Returns `true` if anything was undone.
    ///
    /// Removed slots are freed highest first so later insertions reuse them
    /// in ascending order and ids stay dense.
    pub fn rollback(&mut self, checkpoint: Checkpoint) -> bool {
        let journal = std::mem::take(&mut self.journal);
        let mut changed = false;

        for (idx, previous) in journal.rewritten.into_iter().rev() {
            if let Some(weight) = self.graph.edge_weight_mut(idx) {
                *weight = previous;
                changed = true;
            }
        }
        for id in journal.keyed {
            if let Some(key) = self.graph.node_weight_mut(id.into()).and_then(|v| v.take_key()) {
                self.keys.remove(&key);
                changed = true;
            }
        }
        for id in journal.assigned {
            if let Some(vertex) = self.graph.node_weight_mut(id.into()) {
                vertex.clear_component();
                changed = true;
            }
        }

        let edges: Vec<EdgeIndex<u32>> = self
            .graph
            .edge_indices()
            .filter(|e| e.index() >= checkpoint.edges)
            .collect();
        for idx in edges.into_iter().rev() {
            self.graph.remove_edge(idx);
            changed = true;
        }
        let vertices: Vec<NodeIndex<u32>> = self
            .graph
            .node_indices()
            .filter(|n| n.index() >= checkpoint.vertices)
            .collect();
        for idx in vertices.into_iter().rev() {
            self.graph.remove_node(idx);
            changed = true;
        }
        self.labels
            .retain(|_, id| (id.0 as usize) < checkpoint.vertices);

        if self.adapters.len() > checkpoint.adapters {
            self.adapters.truncate(checkpoint.adapters);
            let first_dropped = AdapterId(checkpoint.adapters as u32);
            for vertex in self.graph.node_weights_mut() {
                vertex.truncate_adapters(first_dropped);
            }
            changed = true;
        }
        if self.root != checkpoint.root {
            self.root = checkpoint.root;
            changed = true;
        }

        debug_assert_eq!(self.graph.node_count(), checkpoint.vertices);
        debug_assert_eq!(self.graph.edge_count(), checkpoint.edges);
        changed
    }
}

/// A lazy, non-copying view over the vertices satisfying a predicate.
pub struct FilteredView<'g, F> {
    graph: &'g TopologyGraph,
    predicate: F,
}

impl<'g, F> FilteredView<'g, F>
where
    F: Fn(&Vertex) -> bool,
{
    pub fn graph(&self) -> &'g TopologyGraph {
        self.graph
    }

    pub fn contains(&self, id: VertexId) -> bool {
        self.graph.vertex(id).is_some_and(|v| (self.predicate)(v))
    }

    /// Matching vertices in id order.
    pub fn vertices(&self) -> impl Iterator<Item = (VertexId, &'g Vertex)> + '_ {
        self.graph.vertices().filter(move |(_, v)| (self.predicate)(*v))
    }

    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertices().map(|(id, _)| id)
    }

    /// Edges whose endpoints both match.
    pub fn edges(&self) -> impl Iterator<Item = EdgeRecord<'g>> + '_ {
        self.graph
            .edges()
            .filter(move |e| self.contains(e.source) && self.contains(e.target))
    }

    pub fn count(&self) -> usize {
        self.vertices().count()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices().next().is_none()
    }
}
