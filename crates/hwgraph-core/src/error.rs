//! Core error types for hwgraph-core.
//!
//! Uses `thiserror` for structured, matchable variants. Only
//! [`CoreError::TaxonomyMappingMissing`] is recoverable: callers
//! degrade it to the generic placeholder category. The consistency variants
//! invalidate every downstream query and abort the discovery pass.

use thiserror::Error;

use crate::adapter::CorrelationKey;
use crate::component::ComponentType;
use crate::id::VertexId;

/// Errors produced by the hwgraph-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A native category name has no branch in the taxonomy mapping.
    #[error("no component type mapping for native category '{native}'")]
    TaxonomyMappingMissing { native: String },

    /// A vertex was asked to change its already-resolved component type.
    #[error(
        "vertex {vertex} is already a {existing}, refusing to re-assign it as {requested}",
        existing = existing.name(),
        requested = requested.name()
    )]
    ComponentConflict {
        vertex: VertexId,
        existing: ComponentType,
        requested: ComponentType,
    },

    /// A correlation key is already held by another vertex, or a keyed vertex
    /// was matched with an incompatible category.
    #[error("correlation key '{key}' collides: held by vertex {holder}, requested for {requested}")]
    KeyCollision {
        key: CorrelationKey,
        holder: VertexId,
        requested: String,
    },

    /// A vertex id was not issued by this graph.
    #[error("vertex not found: VertexId({id})", id = id.0)]
    VertexNotFound { id: VertexId },

    /// An edge failed validation.
    #[error("invalid edge: {reason}")]
    InvalidEdge { reason: String },

    /// A structural invariant of the graph does not hold.
    #[error("graph inconsistency: {reason}")]
    GraphInconsistency { reason: String },
}

impl CoreError {
    /// Returns `true` for errors that invalidate the whole discovery pass.
    pub fn is_consistency_violation(&self) -> bool {
        matches!(
            self,
            CoreError::ComponentConflict { .. }
                | CoreError::KeyCollision { .. }
                | CoreError::GraphInconsistency { .. }
        )
    }
}
