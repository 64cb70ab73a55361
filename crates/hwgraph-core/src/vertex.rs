//! Vertex payload stored in the topology graph.

use smallvec::SmallVec;

use crate::adapter::CorrelationKey;
use crate::component::ComponentType;
use crate::id::AdapterId;

/// A hardware entity.
///
/// The component type and correlation key are write-once; the adapter list
/// is append-only. All mutation goes through
/// [`TopologyGraph`](crate::graph::TopologyGraph) so the graph can keep its
/// key index in sync.
#[derive(Debug, Clone, Default)]
pub struct Vertex {
    label: Option<String>,
    component: Option<ComponentType>,
    key: Option<CorrelationKey>,
    /// Most vertices carry one adapter per contributing module.
    adapters: SmallVec<[AdapterId; 2]>,
}

impl Vertex {
    pub(crate) fn new(label: Option<String>) -> Self {
        Vertex {
            label,
            ..Vertex::default()
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The resolved category, or the generic placeholder while unassigned.
    pub fn component(&self) -> ComponentType {
        self.component.unwrap_or(ComponentType::Unknown)
    }

    /// The category if one was ever assigned.
    pub fn resolved_component(&self) -> Option<ComponentType> {
        self.component
    }

    pub fn is_a(&self, ancestor: ComponentType) -> bool {
        self.component().is_a(ancestor)
    }

    pub fn correlation_key(&self) -> Option<&CorrelationKey> {
        self.key.as_ref()
    }

    /// Attached adapters in attachment order.
    pub fn adapters(&self) -> &[AdapterId] {
        &self.adapters
    }

    pub(crate) fn set_component(&mut self, component: ComponentType) {
        self.component = Some(component);
    }

    pub(crate) fn set_key(&mut self, key: CorrelationKey) {
        self.key = Some(key);
    }

    pub(crate) fn push_adapter(&mut self, adapter: AdapterId) {
        self.adapters.push(adapter);
    }

    // Undo paths for a graph rollback; they bypass write-once.

    pub(crate) fn clear_component(&mut self) {
        self.component = None;
    }

    pub(crate) fn take_key(&mut self) -> Option<CorrelationKey> {
        self.key.take()
    }

    /// Drops every adapter id at or past `first_dropped`.
    pub(crate) fn truncate_adapters(&mut self, first_dropped: AdapterId) {
        self.adapters.retain(|a| a.0 < first_dropped.0);
    }
}
