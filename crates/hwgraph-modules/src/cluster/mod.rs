//! Cluster module: attaches site placement data (island, rack, partition,
//! interconnect) from a site descriptor to the machine vertex.
//!
//! Disabled unless a descriptor is configured. Neither export nor dynamic
//! updates are supported.

use std::any::Any;
use std::path::PathBuf;

use hwgraph_core::{Adapter, ComponentType, CorrelationKey, PropertyTable, TopologyGraph};
use hwgraph_engine::{correlate, Module, ModuleError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::snapshot::{self, SnapshotError};
use crate::topology::machine_key;

pub const MODULE_NAME: &str = "cluster";

/// Descriptor layout version this module reads.
pub const SITE_DESCRIPTOR_FORMAT_VERSION: u32 = 1;

/// Placement of one compute node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteNode {
    pub hostname: String,
    #[serde(default)]
    pub island: Option<u32>,
    #[serde(default)]
    pub rack: Option<String>,
    #[serde(default)]
    pub partition: Option<String>,
    #[serde(default)]
    pub interconnect: Option<String>,
}

/// A site's node placement table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteDescriptor {
    pub format_version: u32,
    #[serde(default)]
    pub site: Option<String>,
    #[serde(default)]
    pub nodes: Vec<SiteNode>,
}

#[derive(Debug, Clone)]
pub struct ClusterAdapter {
    site: Option<String>,
    node: SiteNode,
}

impl Adapter for ClusterAdapter {
    fn module(&self) -> &'static str {
        MODULE_NAME
    }

    fn correlation_key(&self) -> Option<CorrelationKey> {
        Some(machine_key(&self.node.hostname))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct ClusterModule {
    descriptor: Option<SiteDescriptor>,
    hostname: String,
}

impl ClusterModule {
    /// Reads a site descriptor. The module stays disabled if the
    /// descriptor cannot be used.
    pub fn open(path: impl Into<PathBuf>, hostname: impl Into<String>) -> Self {
        let path = path.into();
        let descriptor =
            match snapshot::load::<SiteDescriptor>(&path, SITE_DESCRIPTOR_FORMAT_VERSION) {
                Ok(descriptor) => Some(descriptor),
                Err(err @ SnapshotError::VersionMismatch { .. }) => {
                    warn!(module = MODULE_NAME, error = %err.into_module_error(MODULE_NAME), "disabling module");
                    None
                }
                Err(err) => {
                    warn!(module = MODULE_NAME, error = %err, "site descriptor unavailable, disabling module");
                    None
                }
            };
        ClusterModule {
            descriptor,
            hostname: hostname.into(),
        }
    }

    pub fn from_descriptor(descriptor: SiteDescriptor, hostname: impl Into<String>) -> Self {
        let usable = descriptor.format_version == SITE_DESCRIPTOR_FORMAT_VERSION;
        ClusterModule {
            descriptor: usable.then_some(descriptor),
            hostname: hostname.into(),
        }
    }

    pub fn disabled() -> Self {
        ClusterModule {
            descriptor: None,
            hostname: String::new(),
        }
    }
}

impl Module for ClusterModule {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    fn is_enabled(&self) -> bool {
        self.descriptor.is_some()
    }

    fn description(&self) -> &'static str {
        "site descriptor: island, rack, partition and interconnect of the node"
    }

    fn property_tables(&self) -> Vec<PropertyTable> {
        vec![PropertyTable::builder::<ClusterAdapter>(MODULE_NAME)
            .property("site", |a: &ClusterAdapter| a.site.clone())
            .property("island", |a: &ClusterAdapter| a.node.island)
            .property("rack", |a: &ClusterAdapter| a.node.rack.clone())
            .property("partition", |a: &ClusterAdapter| a.node.partition.clone())
            .property("interconnect", |a: &ClusterAdapter| a.node.interconnect.clone())
            .build()]
    }

    fn init_graph_secondary(&mut self, graph: &mut TopologyGraph) -> Result<(), ModuleError> {
        let descriptor = self.descriptor.as_ref().ok_or_else(|| ModuleError::InitFailure {
            module: MODULE_NAME,
            reason: "no site descriptor".to_string(),
        })?;
        let node = descriptor
            .nodes
            .iter()
            .find(|n| n.hostname == self.hostname)
            .ok_or_else(|| ModuleError::InitFailure {
                module: MODULE_NAME,
                reason: format!("host '{}' not listed in site descriptor", self.hostname),
            })?;

        let adapter = ClusterAdapter {
            site: descriptor.site.clone(),
            node: node.clone(),
        };
        let key = machine_key(&self.hostname);
        let label = Some(key.to_string());
        let outcome = correlate(graph, ComponentType::Node, key, label, Box::new(adapter))?;
        info!(module = MODULE_NAME, vertex = %outcome.vertex(), "site placement attached");
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), ModuleError> {
        self.descriptor = None;
        Ok(())
    }
}
