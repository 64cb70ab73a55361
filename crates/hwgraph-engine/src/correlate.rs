//! The correlation rule shared by secondary initialization and re-probing.
//!
//! A module derives a [`CorrelationKey`] for each native object and hands it
//! to [`correlate`] together with the category it expects the object to
//! have. The rule:
//!
//! - a vertex holding the key with a compatible category gets the adapter
//!   appended, unless it already carries one from the same module;
//! - a vertex holding the key with an incompatible category is a
//!   [`CoreError::KeyCollision`];
//! - otherwise a new vertex is created with the category and key.

use hwgraph_core::{
    Adapter, ComponentType, CoreError, CorrelationKey, TopologyEdge, TopologyGraph, VertexId,
};
use tracing::debug;

/// What [`correlate`] did with a native object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correlation {
    /// The adapter was appended to an existing vertex.
    Attached(VertexId),
    /// The vertex already carried an adapter from the same module; the new
    /// adapter was dropped.
    AlreadyAttached(VertexId),
    /// No vertex held the key; a new one was created.
    Created(VertexId),
}

impl Correlation {
    pub fn vertex(self) -> VertexId {
        match self {
            Correlation::Attached(v) | Correlation::AlreadyAttached(v) | Correlation::Created(v) => v,
        }
    }

    pub fn is_new(self) -> bool {
        matches!(self, Correlation::Created(_))
    }
}

/// Two categories are compatible when one is-a the other: a match may land
/// on a vertex resolved more finely than expected, or on a placeholder the
/// main module could not resolve further.
fn compatible(existing: ComponentType, expected: ComponentType) -> bool {
    existing.is_a(expected) || expected.is_a(existing)
}

/// Matches `adapter` onto the vertex holding `key`, or creates one.
pub fn correlate(
    graph: &mut TopologyGraph,
    expected: ComponentType,
    key: CorrelationKey,
    label: Option<String>,
    adapter: Box<dyn Adapter>,
) -> Result<Correlation, CoreError> {
    let module = adapter.module();

    if let Some(vertex) = graph.find_by_key(&key) {
        let existing = graph
            .vertex(vertex)
            .map(|v| v.component())
            .ok_or(CoreError::VertexNotFound { id: vertex })?;
        if !compatible(existing, expected) {
            return Err(CoreError::KeyCollision {
                key,
                holder: vertex,
                requested: format!("{} from module '{module}'", expected.name()),
            });
        }
        if graph.has_adapter_from(vertex, module) {
            debug!(%key, %vertex, module, "already correlated");
            return Ok(Correlation::AlreadyAttached(vertex));
        }
        graph.attach_adapter(vertex, adapter)?;
        debug!(%key, %vertex, module, "attached to existing vertex");
        return Ok(Correlation::Attached(vertex));
    }

    let vertex = graph.add_vertex(label);
    graph.assign_component(vertex, expected)?;
    graph.set_correlation_key(vertex, key.clone())?;
    graph.attach_adapter(vertex, adapter)?;
    debug!(%key, %vertex, module, component = expected.name(), "created vertex");
    Ok(Correlation::Created(vertex))
}

/// Inserts a symmetric relational edge between `a` and `b`. If an edge of
/// the same kind already connects them, its values are replaced instead.
/// Returns `true` if inserted.
pub fn link_symmetric(
    graph: &mut TopologyGraph,
    a: VertexId,
    b: VertexId,
    edge: TopologyEdge,
) -> Result<bool, CoreError> {
    let kind = edge.name();
    if graph.has_edge_where(a, b, |e| e.name() == kind) {
        if graph.refresh_symmetric(a, b, edge)? {
            debug!(%a, %b, kind, "relation refreshed");
        }
        return Ok(false);
    }
    graph.add_symmetric(a, b, edge)?;
    Ok(true)
}
