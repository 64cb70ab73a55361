//! Component taxonomy: the closed set of hardware categories a vertex can
//! resolve to.
//!
//! The taxonomy is a rooted "is-a" tree encoded as an explicit parent table
//! ([`ComponentType::parent`]). Abstract categories are placeholders a
//! concrete category degrades to when a backend cannot resolve the finer
//! distinction (a cache of unknown level, a coprocessor of unknown kind).
//! [`ComponentType::Unknown`] is the root and the generic placeholder for
//! anything the mapping does not cover.
//!
//! ```text
//! unknown
//! ├── node, memory, package, die, group, misc
//! ├── cache
//! │   ├── data_cache ── l1_data_cache .. l5_data_cache
//! │   ├── instruction_cache ── l1_instruction_cache .. l3_instruction_cache
//! │   └── memory_side_cache
//! ├── core ── physical_core, logical_core
//! └── device
//!     ├── pci_device, bridge
//!     ├── accelerator ── gpu
//!     └── network_device, open_fabrics_device, block_device, dma_device
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A hardware category.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    /// Generic placeholder, root of the taxonomy.
    #[default]
    Unknown,
    /// A whole machine.
    Node,
    /// A memory domain (NUMA node).
    Memory,
    Package,
    Die,
    Group,
    Misc,

    Cache,
    /// Data or unified CPU cache of unresolved level.
    DataCache,
    L1DataCache,
    L2DataCache,
    L3DataCache,
    L4DataCache,
    L5DataCache,
    /// Instruction cache of unresolved level.
    InstructionCache,
    L1InstructionCache,
    L2InstructionCache,
    L3InstructionCache,
    /// Memory-side cache in front of a memory domain, not a CPU cache.
    MemorySideCache,

    Core,
    PhysicalCore,
    /// A hardware thread (processing unit).
    LogicalCore,

    Device,
    PciDevice,
    Bridge,
    Accelerator,
    Gpu,
    NetworkDevice,
    OpenFabricsDevice,
    BlockDevice,
    DmaDevice,
}

impl ComponentType {
    /// Every category, in taxonomy order (parents before their children).
    pub const ALL: &'static [ComponentType] = &[
        ComponentType::Unknown,
        ComponentType::Node,
        ComponentType::Memory,
        ComponentType::Package,
        ComponentType::Die,
        ComponentType::Group,
        ComponentType::Misc,
        ComponentType::Cache,
        ComponentType::DataCache,
        ComponentType::L1DataCache,
        ComponentType::L2DataCache,
        ComponentType::L3DataCache,
        ComponentType::L4DataCache,
        ComponentType::L5DataCache,
        ComponentType::InstructionCache,
        ComponentType::L1InstructionCache,
        ComponentType::L2InstructionCache,
        ComponentType::L3InstructionCache,
        ComponentType::MemorySideCache,
        ComponentType::Core,
        ComponentType::PhysicalCore,
        ComponentType::LogicalCore,
        ComponentType::Device,
        ComponentType::PciDevice,
        ComponentType::Bridge,
        ComponentType::Accelerator,
        ComponentType::Gpu,
        ComponentType::NetworkDevice,
        ComponentType::OpenFabricsDevice,
        ComponentType::BlockDevice,
        ComponentType::DmaDevice,
    ];

    /// The direct "is-a" parent. `None` only for [`ComponentType::Unknown`].
    pub fn parent(self) -> Option<ComponentType> {
        use ComponentType::*;
        match self {
            Unknown => None,
            Node | Memory | Package | Die | Group | Misc | Cache | Core | Device => Some(Unknown),
            DataCache | InstructionCache | MemorySideCache => Some(Cache),
            L1DataCache | L2DataCache | L3DataCache | L4DataCache | L5DataCache => Some(DataCache),
            L1InstructionCache | L2InstructionCache | L3InstructionCache => Some(InstructionCache),
            PhysicalCore | LogicalCore => Some(Core),
            PciDevice | Bridge | Accelerator | NetworkDevice | OpenFabricsDevice | BlockDevice
            | DmaDevice => Some(Device),
            Gpu => Some(Accelerator),
        }
    }

    /// Iterates the strict ancestors, nearest first, ending at `Unknown`.
    pub fn ancestors(self) -> impl Iterator<Item = ComponentType> {
        std::iter::successors(self.parent(), |c| c.parent())
    }

    /// Returns `true` if `self` equals `ancestor` or descends from it.
    pub fn is_a(self, ancestor: ComponentType) -> bool {
        self == ancestor || self.ancestors().any(|c| c == ancestor)
    }

    /// Abstract categories only ever appear on a vertex as a degraded
    /// resolution.
    pub fn is_abstract(self) -> bool {
        use ComponentType::*;
        matches!(
            self,
            Unknown | Cache | DataCache | InstructionCache | Core | Device | Accelerator
        )
    }

    /// The nearest abstract ancestor this category degrades to.
    ///
    /// `Unknown` is its own placeholder.
    pub fn placeholder(self) -> ComponentType {
        self.ancestors()
            .find(|c| c.is_abstract())
            .unwrap_or(ComponentType::Unknown)
    }

    /// Resolves a data (or unified) cache level. Levels outside 1..=5, or no
    /// level at all, degrade to [`ComponentType::DataCache`].
    pub fn data_cache(level: Option<u8>) -> ComponentType {
        match level {
            Some(1) => ComponentType::L1DataCache,
            Some(2) => ComponentType::L2DataCache,
            Some(3) => ComponentType::L3DataCache,
            Some(4) => ComponentType::L4DataCache,
            Some(5) => ComponentType::L5DataCache,
            _ => ComponentType::DataCache,
        }
    }

    /// Resolves an instruction cache level. Levels outside 1..=3 degrade to
    /// [`ComponentType::InstructionCache`].
    pub fn instruction_cache(level: Option<u8>) -> ComponentType {
        match level {
            Some(1) => ComponentType::L1InstructionCache,
            Some(2) => ComponentType::L2InstructionCache,
            Some(3) => ComponentType::L3InstructionCache,
            _ => ComponentType::InstructionCache,
        }
    }

    /// The cache level of a resolved CPU cache category.
    pub fn cache_level(self) -> Option<u8> {
        use ComponentType::*;
        match self {
            L1DataCache | L1InstructionCache => Some(1),
            L2DataCache | L2InstructionCache => Some(2),
            L3DataCache | L3InstructionCache => Some(3),
            L4DataCache => Some(4),
            L5DataCache => Some(5),
            _ => None,
        }
    }

    /// Stable snake_case name, identical to the serde representation.
    pub fn name(self) -> &'static str {
        use ComponentType::*;
        match self {
            Unknown => "unknown",
            Node => "node",
            Memory => "memory",
            Package => "package",
            Die => "die",
            Group => "group",
            Misc => "misc",
            Cache => "cache",
            DataCache => "data_cache",
            L1DataCache => "l1_data_cache",
            L2DataCache => "l2_data_cache",
            L3DataCache => "l3_data_cache",
            L4DataCache => "l4_data_cache",
            L5DataCache => "l5_data_cache",
            InstructionCache => "instruction_cache",
            L1InstructionCache => "l1_instruction_cache",
            L2InstructionCache => "l2_instruction_cache",
            L3InstructionCache => "l3_instruction_cache",
            MemorySideCache => "memory_side_cache",
            Core => "core",
            PhysicalCore => "physical_core",
            LogicalCore => "logical_core",
            Device => "device",
            PciDevice => "pci_device",
            Bridge => "bridge",
            Accelerator => "accelerator",
            Gpu => "gpu",
            NetworkDevice => "network_device",
            OpenFabricsDevice => "open_fabrics_device",
            BlockDevice => "block_device",
            DmaDevice => "dma_device",
        }
    }

    /// One-line human description, used by category listings.
    pub fn description(self) -> &'static str {
        use ComponentType::*;
        match self {
            Unknown => "component whose category could not be resolved",
            Node => "a whole machine",
            Memory => "memory domain (NUMA node)",
            Package => "processor package (socket)",
            Die => "processor die inside a package",
            Group => "logical grouping of cores or caches",
            Misc => "miscellaneous object without finer classification",
            Cache => "any cache",
            DataCache => "data or unified CPU cache of unresolved level",
            L1DataCache => "level 1 data cache",
            L2DataCache => "level 2 data or unified cache",
            L3DataCache => "level 3 data or unified cache",
            L4DataCache => "level 4 data or unified cache",
            L5DataCache => "level 5 data or unified cache",
            InstructionCache => "instruction cache of unresolved level",
            L1InstructionCache => "level 1 instruction cache",
            L2InstructionCache => "level 2 instruction cache",
            L3InstructionCache => "level 3 instruction cache",
            MemorySideCache => "memory-side cache in front of a memory domain",
            Core => "any core",
            PhysicalCore => "physical processor core",
            LogicalCore => "hardware thread (processing unit)",
            Device => "any peripheral device",
            PciDevice => "PCI device",
            Bridge => "host or PCI bridge",
            Accelerator => "accelerator or coprocessor",
            Gpu => "graphics processing unit",
            NetworkDevice => "network interface",
            OpenFabricsDevice => "OpenFabrics (InfiniBand, Omni-Path) interface",
            BlockDevice => "block storage device",
            DmaDevice => "DMA engine",
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ComponentType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ComponentType::ALL
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| CoreError::TaxonomyMappingMissing {
                native: wanted.to_string(),
            })
    }
}
