//! Per-vertex handle of the topology module.

use std::any::Any;

use hwgraph_core::{Adapter, CorrelationKey, PropertyTable};

use super::native::{ObjectAttributes, TopologyObject};
use super::MODULE_NAME;

/// One native topology object, detached from its children.
#[derive(Debug, Clone)]
pub struct TopologyAdapter {
    pub(crate) object_type: String,
    pub(crate) osdev_type: Option<String>,
    pub(crate) os_index: Option<u32>,
    pub(crate) name: Option<String>,
    pub(crate) attributes: ObjectAttributes,
    /// os_index of the nearest NUMA node at or above this object.
    pub(crate) numa_affinity: Option<u32>,
    pub(crate) depth: u32,
    pub(crate) key: Option<CorrelationKey>,
}

impl TopologyAdapter {
    pub(crate) fn new(
        object: &TopologyObject,
        numa_affinity: Option<u32>,
        depth: u32,
        key: Option<CorrelationKey>,
    ) -> Self {
        TopologyAdapter {
            object_type: object.object_type.clone(),
            osdev_type: object.osdev_type.clone(),
            os_index: object.os_index,
            name: object.name.clone(),
            attributes: object.attributes.clone(),
            numa_affinity,
            depth,
            key,
        }
    }

    pub fn native_type(&self) -> &str {
        &self.object_type
    }

    pub fn bdfid(&self) -> Option<u64> {
        self.attributes.pci.as_ref().map(|pci| pci.bdfid())
    }

    /// Local memory for NUMA nodes, total memory below the object otherwise.
    pub fn memory(&self) -> Option<u64> {
        self.attributes.local_memory.or(self.attributes.total_memory)
    }

    /// Rebuilds the native object with the given children.
    pub(crate) fn to_object(&self, children: Vec<TopologyObject>) -> TopologyObject {
        TopologyObject {
            object_type: self.object_type.clone(),
            osdev_type: self.osdev_type.clone(),
            os_index: self.os_index,
            name: self.name.clone(),
            attributes: self.attributes.clone(),
            children,
        }
    }

    pub(crate) fn property_table() -> PropertyTable {
        PropertyTable::builder::<TopologyAdapter>(MODULE_NAME)
            .property("native_type", |a: &TopologyAdapter| Some(a.object_type.clone()))
            .property("os_index", |a: &TopologyAdapter| a.os_index)
            .property("name", |a: &TopologyAdapter| a.name.clone())
            .property("depth", |a: &TopologyAdapter| Some(a.depth))
            .property("memory", |a: &TopologyAdapter| a.memory())
            .property("numa_affinity", |a: &TopologyAdapter| a.numa_affinity)
            .property("cache_size", |a: &TopologyAdapter| a.attributes.cache_size)
            .property("cache_linesize", |a: &TopologyAdapter| a.attributes.cache_linesize)
            .property("cache_associativity", |a: &TopologyAdapter| {
                a.attributes.cache_associativity
            })
            .property("bdfid", |a: &TopologyAdapter| a.bdfid())
            .property("pci_vendor_id", |a: &TopologyAdapter| {
                a.attributes.pci.and_then(|pci| pci.vendor_id)
            })
            .property("pci_device_id", |a: &TopologyAdapter| {
                a.attributes.pci.and_then(|pci| pci.device_id)
            })
            .build()
    }
}

impl Adapter for TopologyAdapter {
    fn module(&self) -> &'static str {
        MODULE_NAME
    }

    fn correlation_key(&self) -> Option<CorrelationKey> {
        self.key.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
