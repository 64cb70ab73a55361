//! GPU module: correlates accelerators reported by a GPU management library
//! onto PCI device vertices and links peer-to-peer capable pairs.
//!
//! Devices are matched by their PCI key `bdfid:<id>`. A device with no
//! matching vertex gets a new `pci_device` vertex. Each pair of
//! peer-to-peer accessible devices gets one symmetric interconnect, carrying
//! link type, hop count, weight and, for xGMI links, bandwidth limits.
//!
//! Property values are read from the backend when queried, by PCI id, so
//! they reflect the device's state as of the latest probe even if the
//! library renumbered its devices in between.

pub mod backend;

use std::any::Any;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use hwgraph_core::{
    Adapter, ComponentType, CorrelationKey, LinkInfo, LinkKind, PropertyTable, TopologyEdge,
    TopologyGraph, VertexId,
};
use hwgraph_engine::{correlate, link_symmetric, Module, ModuleError};
use tracing::{debug, info, warn};

use crate::snapshot::SnapshotError;
use crate::topology::pci_key;

pub use backend::{BackendError, GpuBackend, GpuDevice, GpuInventory, GpuLink, InventoryBackend};

pub const MODULE_NAME: &str = "gpu";

/// Handle on one GPU, by PCI id.
#[derive(Debug)]
pub struct GpuAdapter {
    backend: Arc<dyn GpuBackend>,
    bdfid: u64,
}

impl GpuAdapter {
    pub fn bdfid(&self) -> u64 {
        self.bdfid
    }

    /// Live device data. A failed call reads as absent.
    fn live(&self) -> Option<GpuDevice> {
        match self.backend.device_by_bdfid(self.bdfid) {
            Ok(device) => Some(device),
            Err(err) => {
                debug!(module = MODULE_NAME, bdfid = self.bdfid, error = %err, "property read failed");
                None
            }
        }
    }

    fn property_table() -> PropertyTable {
        PropertyTable::builder::<GpuAdapter>(MODULE_NAME)
            .property("bdfid", |a: &GpuAdapter| Some(a.bdfid))
            .property("device_index", |a: &GpuAdapter| a.live().map(|d| d.index))
            .property("numa_affinity", |a: &GpuAdapter| a.live()?.numa_node)
            .property("memory", |a: &GpuAdapter| a.live()?.vram_total)
            .property("memory_vram", |a: &GpuAdapter| a.live()?.vram_total)
            .property("memory_visible_vram", |a: &GpuAdapter| {
                a.live()?.visible_vram_total
            })
            .property("memory_gtt", |a: &GpuAdapter| a.live()?.gtt_total)
            .property("busy_percent", |a: &GpuAdapter| a.live()?.busy_percent)
            .build()
    }
}

impl Adapter for GpuAdapter {
    fn module(&self) -> &'static str {
        MODULE_NAME
    }

    fn correlation_key(&self) -> Option<CorrelationKey> {
        Some(pci_key(self.bdfid))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// GPU management library backed secondary module.
#[derive(Debug)]
pub struct GpuModule {
    backend: Option<Arc<dyn GpuBackend>>,
}

impl GpuModule {
    pub fn new(backend: Arc<dyn GpuBackend>) -> Self {
        GpuModule {
            backend: Some(backend),
        }
    }

    /// Opens an inventory file. A format mismatch or an unreadable file
    /// disables the module.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        match InventoryBackend::open(path) {
            Ok(backend) => GpuModule::new(Arc::new(backend)),
            Err(err @ SnapshotError::VersionMismatch { .. }) => {
                warn!(module = MODULE_NAME, error = %err.into_module_error(MODULE_NAME), "disabling module");
                GpuModule::disabled()
            }
            Err(err) => {
                warn!(module = MODULE_NAME, error = %err, "GPU backend unavailable, disabling module");
                GpuModule::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        GpuModule { backend: None }
    }

    fn backend(&self) -> Result<&Arc<dyn GpuBackend>, ModuleError> {
        self.backend.as_ref().ok_or_else(|| ModuleError::InitFailure {
            module: MODULE_NAME,
            reason: "no GPU backend".to_string(),
        })
    }

    /// Refreshes the backend and probes devices and links, then correlates
    /// them. Nothing is written to the graph unless every probe succeeds.
    fn merge(&self, graph: &mut TopologyGraph) -> Result<(), ModuleError> {
        let backend = self.backend()?;
        let failure = |err: BackendError| ModuleError::BackendCallFailure {
            module: MODULE_NAME,
            reason: err.to_string(),
        };
        backend.refresh().map_err(failure)?;
        let devices = backend.devices().map_err(failure)?;
        let links = backend.links().map_err(failure)?;

        let mut vertices: HashMap<u32, VertexId> = HashMap::with_capacity(devices.len());
        let mut created = 0;
        for device in &devices {
            let key = pci_key(device.bdfid);
            let adapter = GpuAdapter {
                backend: Arc::clone(backend),
                bdfid: device.bdfid,
            };
            let label = Some(key.to_string());
            let outcome = correlate(graph, ComponentType::PciDevice, key, label, Box::new(adapter))?;
            if outcome.is_new() {
                created += 1;
            }
            vertices.insert(device.index, outcome.vertex());
        }

        let mut linked = 0;
        for link in links.iter().filter(|l| l.p2p_accessible) {
            let (Some(&a), Some(&b)) = (vertices.get(&link.source), vertices.get(&link.target))
            else {
                debug!(module = MODULE_NAME, source = link.source, target = link.target, "link to unknown device");
                continue;
            };
            if a == b {
                continue;
            }
            let xgmi = link.link_type == LinkKind::Xgmi;
            let info = LinkInfo {
                kind: link.link_type,
                hops: link.hops,
                weight: link.weight,
                min_bandwidth: link.min_bandwidth.filter(|_| xgmi),
                max_bandwidth: link.max_bandwidth.filter(|_| xgmi),
            };
            if link_symmetric(graph, a, b, TopologyEdge::Interconnect(info))? {
                linked += 1;
            }
        }

        info!(
            module = MODULE_NAME,
            devices = devices.len(),
            created,
            linked,
            "GPU devices correlated"
        );
        Ok(())
    }
}

impl Module for GpuModule {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    fn description(&self) -> &'static str {
        "GPU management library: memory, NUMA affinity, utilization and peer-to-peer links"
    }

    fn property_tables(&self) -> Vec<PropertyTable> {
        vec![GpuAdapter::property_table()]
    }

    fn init_graph_secondary(&mut self, graph: &mut TopologyGraph) -> Result<(), ModuleError> {
        self.merge(graph)
    }

    fn update_graph(&mut self, graph: &mut TopologyGraph) -> Result<(), ModuleError> {
        self.merge(graph)
    }

    fn shutdown(&mut self) -> Result<(), ModuleError> {
        self.backend = None;
        Ok(())
    }
}
