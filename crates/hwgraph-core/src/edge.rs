//! Edge types of the topology graph.
//!
//! Structural edges ([`TopologyEdge::Child`] / [`TopologyEdge::Parent`])
//! mirror hardware containment and only ever exist as a reciprocal pair.
//! Relational edges ([`TopologyEdge::Interconnect`]) describe links between
//! devices and are not part of the containment tree.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Physical kind of an inter-device link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    PciExpress,
    /// AMD Infinity Fabric (xGMI) GPU-to-GPU link.
    Xgmi,
    #[default]
    Undefined,
}

impl LinkKind {
    pub fn name(self) -> &'static str {
        match self {
            LinkKind::PciExpress => "pci_express",
            LinkKind::Xgmi => "xgmi",
            LinkKind::Undefined => "undefined",
        }
    }
}

/// Attributes of an interconnect edge. Bandwidths are only reported for
/// single-hop xGMI links.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LinkInfo {
    pub kind: LinkKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hops: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_bandwidth: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bandwidth: Option<u64>,
}

/// A directed, typed relation between two vertices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TopologyEdge {
    /// The target is contained by the source.
    Child,
    /// The target contains the source.
    Parent,
    /// Symmetric device-to-device link, stored once per direction.
    Interconnect(LinkInfo),
}

impl TopologyEdge {
    /// Returns `true` for containment edges.
    pub fn is_structural(&self) -> bool {
        matches!(self, TopologyEdge::Child | TopologyEdge::Parent)
    }

    /// Returns `true` for edges outside the containment tree.
    pub fn is_relational(&self) -> bool {
        !self.is_structural()
    }

    /// The edge that must exist in the opposite direction.
    pub fn reciprocal(&self) -> TopologyEdge {
        match self {
            TopologyEdge::Child => TopologyEdge::Parent,
            TopologyEdge::Parent => TopologyEdge::Child,
            TopologyEdge::Interconnect(link) => TopologyEdge::Interconnect(link.clone()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TopologyEdge::Child => "child",
            TopologyEdge::Parent => "parent",
            TopologyEdge::Interconnect(_) => "interconnect",
        }
    }
}

impl fmt::Display for TopologyEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopologyEdge::Interconnect(link) => write!(f, "interconnect ({})", link.kind.name()),
            other => f.write_str(other.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_edges_are_each_others_reciprocal() {
        assert_eq!(TopologyEdge::Child.reciprocal(), TopologyEdge::Parent);
        assert_eq!(TopologyEdge::Parent.reciprocal(), TopologyEdge::Child);
        assert!(TopologyEdge::Child.is_structural());
        assert!(!TopologyEdge::Parent.is_relational());
    }

    #[test]
    fn interconnect_is_its_own_reciprocal() {
        let link = TopologyEdge::Interconnect(LinkInfo {
            kind: LinkKind::Xgmi,
            hops: Some(1),
            weight: Some(15),
            min_bandwidth: Some(50_000),
            max_bandwidth: Some(100_000),
        });
        assert!(link.is_relational());
        assert_eq!(link.reciprocal(), link);
        assert_eq!(link.to_string(), "interconnect (xgmi)");
    }

    #[test]
    fn edge_serializes_with_type_tag() {
        let json = serde_json::to_value(TopologyEdge::Child).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "child" }));

        let link = TopologyEdge::Interconnect(LinkInfo {
            kind: LinkKind::PciExpress,
            hops: Some(2),
            ..LinkInfo::default()
        });
        let json = serde_json::to_value(&link).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "interconnect", "kind": "pci_express", "hops": 2 })
        );
    }
}
