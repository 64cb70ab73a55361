//! Native topology objects as a hardware-locality walk reports them, and
//! their mapping onto the component taxonomy.

use std::str::FromStr;

use hwgraph_core::{ComponentType, CoreError};
use serde::{Deserialize, Serialize};

/// Snapshot layout version this module reads and writes.
pub const TOPOLOGY_FORMAT_VERSION: u32 = 2;

/// A whole topology walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub format_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub root: TopologyObject,
}

/// One native object and its children, in native order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyObject {
    #[serde(rename = "type")]
    pub object_type: String,
    /// Sub-type of OS devices (`gpu`, `network`, `block`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub osdev_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "ObjectAttributes::is_empty")]
    pub attributes: ObjectAttributes,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TopologyObject>,
}

/// Type-specific attributes. Only the ones matching the object type are set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectAttributes {
    /// Local memory of a NUMA node, in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_memory: Option<u64>,
    /// Total memory below this object, in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_memory: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_linesize: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_associativity: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pci: Option<PciAddress>,
}

impl ObjectAttributes {
    pub fn is_empty(&self) -> bool {
        *self == ObjectAttributes::default()
    }
}

/// PCI location and identity of a device or bridge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PciAddress {
    #[serde(default)]
    pub domain: u32,
    pub bus: u8,
    pub device: u8,
    pub function: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<u16>,
}

impl PciAddress {
    /// Packed bus/device/function id:
    /// `domain << 32 | bus << 8 | (device & 0x1f) << 3 | (function & 0x7)`.
    pub fn bdfid(&self) -> u64 {
        (u64::from(self.domain) << 32)
            | (u64::from(self.bus) << 8)
            | (u64::from(self.device & 0x1f) << 3)
            | u64::from(self.function & 0x7)
    }
}

// ---------------------------------------------------------------------------
// Native kinds
// ---------------------------------------------------------------------------

/// Native object types of a hardware-locality walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Machine,
    Package,
    Die,
    Core,
    Pu,
    /// Data or unified cache of the given level; `None` when the level is
    /// too large to name a category.
    Cache(Option<u8>),
    InstructionCache(Option<u8>),
    Group,
    NumaNode,
    MemCache,
    Bridge,
    PciDevice,
    OsDevice,
    Misc,
}

impl FromStr for ObjectKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        let kind = match lower.as_str() {
            "machine" => ObjectKind::Machine,
            "package" | "socket" => ObjectKind::Package,
            "die" => ObjectKind::Die,
            "core" => ObjectKind::Core,
            "pu" => ObjectKind::Pu,
            "group" => ObjectKind::Group,
            "numanode" | "node" => ObjectKind::NumaNode,
            "memcache" => ObjectKind::MemCache,
            "bridge" => ObjectKind::Bridge,
            "pcidev" | "pci_device" => ObjectKind::PciDevice,
            "osdev" | "os_device" => ObjectKind::OsDevice,
            "misc" => ObjectKind::Misc,
            other => cache_kind(other).ok_or_else(|| CoreError::TaxonomyMappingMissing {
                native: s.to_string(),
            })?,
        };
        Ok(kind)
    }
}

/// Parses `l<N>cache` and `l<N>icache` for any run of digits `N`.
fn cache_kind(lower: &str) -> Option<ObjectKind> {
    let rest = lower.strip_prefix('l')?;
    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let level = rest[..digits].parse::<u8>().ok();
    match &rest[digits..] {
        "cache" | "dcache" | "ucache" => Some(ObjectKind::Cache(level)),
        "icache" => Some(ObjectKind::InstructionCache(level)),
        _ => None,
    }
}

/// Sub-types of OS devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsDeviceKind {
    Block,
    Gpu,
    Network,
    OpenFabrics,
    Dma,
    Coprocessor,
}

impl FromStr for OsDeviceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "block" => Ok(OsDeviceKind::Block),
            "gpu" => Ok(OsDeviceKind::Gpu),
            "network" => Ok(OsDeviceKind::Network),
            "openfabrics" => Ok(OsDeviceKind::OpenFabrics),
            "dma" => Ok(OsDeviceKind::Dma),
            "coproc" | "coprocessor" => Ok(OsDeviceKind::Coprocessor),
            _ => Err(CoreError::TaxonomyMappingMissing {
                native: format!("osdev:{s}"),
            }),
        }
    }
}

/// Maps a native kind onto the taxonomy.
///
/// Cache levels with no dedicated category, and OS devices whose sub-type
/// is unknown, degrade to the nearest abstract ancestor.
pub fn component_for(kind: ObjectKind, osdev: Option<OsDeviceKind>) -> ComponentType {
    match kind {
        ObjectKind::Machine => ComponentType::Node,
        ObjectKind::Package => ComponentType::Package,
        ObjectKind::Die => ComponentType::Die,
        ObjectKind::Core => ComponentType::PhysicalCore,
        ObjectKind::Pu => ComponentType::LogicalCore,
        ObjectKind::Cache(level) => ComponentType::data_cache(level),
        ObjectKind::InstructionCache(level) => ComponentType::instruction_cache(level),
        ObjectKind::Group => ComponentType::Group,
        ObjectKind::NumaNode => ComponentType::Memory,
        ObjectKind::MemCache => ComponentType::MemorySideCache,
        ObjectKind::Bridge => ComponentType::Bridge,
        ObjectKind::PciDevice => ComponentType::PciDevice,
        ObjectKind::Misc => ComponentType::Misc,
        ObjectKind::OsDevice => match osdev {
            Some(OsDeviceKind::Block) => ComponentType::BlockDevice,
            Some(OsDeviceKind::Gpu) => ComponentType::Gpu,
            Some(OsDeviceKind::Network) => ComponentType::NetworkDevice,
            Some(OsDeviceKind::OpenFabrics) => ComponentType::OpenFabricsDevice,
            Some(OsDeviceKind::Dma) => ComponentType::DmaDevice,
            Some(OsDeviceKind::Coprocessor) => ComponentType::Accelerator,
            None => ComponentType::Device,
        },
    }
}

/// Resolves an object's category from its native strings.
///
/// Strings naming no known native type yield
/// [`CoreError::TaxonomyMappingMissing`]; callers degrade those to the
/// generic placeholder.
pub fn resolve(object: &TopologyObject) -> Result<ComponentType, CoreError> {
    let kind: ObjectKind = object.object_type.parse()?;
    let osdev = match (&kind, &object.osdev_type) {
        (ObjectKind::OsDevice, Some(sub)) => match sub.parse::<OsDeviceKind>() {
            Ok(sub) => Some(sub),
            Err(err) => {
                tracing::warn!(error = %err, "unknown OS device type, degrading to device");
                None
            }
        },
        _ => None,
    };
    Ok(component_for(kind, osdev))
}
