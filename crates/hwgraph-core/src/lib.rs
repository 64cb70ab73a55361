//! Core data model for hardware topology graphs.
//!
//! Provides the component taxonomy, the adapter and property reflection
//! contracts, and [`TopologyGraph`], the single owner of every vertex, edge
//! and adapter.
//!
//! # Modules
//!
//! - [`component`]: ComponentType taxonomy and its is-a relation
//! - [`id`]: VertexId, EdgeId, AdapterId newtypes
//! - [`adapter`]: Adapter trait and CorrelationKey
//! - [`property`]: typed property tables and the registry
//! - [`edge`]: structural and relational edge payloads
//! - [`vertex`]: vertex payload
//! - [`graph`]: TopologyGraph and filtered views
//! - [`error`]: CoreError

pub mod adapter;
pub mod component;
pub mod edge;
pub mod error;
pub mod graph;
pub mod id;
pub mod property;
pub mod vertex;

// Re-export commonly used types
pub use adapter::{Adapter, CorrelationKey};
pub use component::ComponentType;
pub use edge::{LinkInfo, LinkKind, TopologyEdge};
pub use error::CoreError;
pub use graph::{Checkpoint, EdgeRecord, FilteredView, TopologyGraph};
pub use id::{AdapterId, EdgeId, VertexId};
pub use property::{
    PropertyDescriptor, PropertyKind, PropertyRegistry, PropertyTable, PropertyTableBuilder,
    PropertyType, PropertyValue,
};
pub use vertex::Vertex;
