//! The GPU management-library seam and its snapshot-backed implementation.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use hwgraph_core::LinkKind;
use serde::{Deserialize, Serialize};

use crate::snapshot::{self, SnapshotError};

/// Inventory layout version [`InventoryBackend`] reads.
pub const GPU_INVENTORY_FORMAT_VERSION: u32 = 1;

/// Static and live data of one GPU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuDevice {
    pub index: u32,
    /// Packed PCI bus/device/function id.
    pub bdfid: u64,
    #[serde(default)]
    pub numa_node: Option<u32>,
    #[serde(default)]
    pub vram_total: Option<u64>,
    #[serde(default)]
    pub visible_vram_total: Option<u64>,
    #[serde(default)]
    pub gtt_total: Option<u64>,
    #[serde(default)]
    pub busy_percent: Option<u32>,
}

/// Connectivity between two device indices, as the library reports it for
/// the ordered pair (the module treats it as symmetric).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuLink {
    pub source: u32,
    pub target: u32,
    pub p2p_accessible: bool,
    #[serde(default)]
    pub link_type: LinkKind,
    #[serde(default)]
    pub hops: Option<u64>,
    #[serde(default)]
    pub weight: Option<u64>,
    /// Only reported for single-hop xGMI links.
    #[serde(default)]
    pub min_bandwidth: Option<u64>,
    #[serde(default)]
    pub max_bandwidth: Option<u64>,
}

/// A failed library call.
#[derive(Debug, thiserror::Error)]
#[error("{call} failed: {reason}")]
pub struct BackendError {
    pub call: &'static str,
    pub reason: String,
}

/// GPU management library.
///
/// Calls are blocking and may fail independently; the module probes
/// devices and links completely before touching the graph.
pub trait GpuBackend: Send + Sync + fmt::Debug {
    /// Takes a fresh reading of the hardware. Reads between two refreshes
    /// see the same state; a failed refresh leaves nothing to read.
    fn refresh(&self) -> Result<(), BackendError> {
        Ok(())
    }

    /// All monitored devices.
    fn devices(&self) -> Result<Vec<GpuDevice>, BackendError>;

    /// One device, found by its PCI id. Device indices may be renumbered
    /// between refreshes; the PCI id may not.
    fn device_by_bdfid(&self, bdfid: u64) -> Result<GpuDevice, BackendError> {
        self.devices()?
            .into_iter()
            .find(|d| d.bdfid == bdfid)
            .ok_or_else(|| BackendError {
                call: "device",
                reason: format!("no device with bdfid {bdfid}"),
            })
    }

    /// Link data for every unordered device pair.
    fn links(&self) -> Result<Vec<GpuLink>, BackendError>;
}

/// JSON inventory document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuInventory {
    pub format_version: u32,
    #[serde(default)]
    pub devices: Vec<GpuDevice>,
    #[serde(default)]
    pub links: Vec<GpuLink>,
}

/// Backend reading an inventory file. Each refresh re-reads the file, so
/// edits to it show up as live changes.
#[derive(Debug)]
pub struct InventoryBackend {
    path: PathBuf,
    /// The inventory as of the last refresh; `None` after a failed one.
    current: RwLock<Option<Arc<GpuInventory>>>,
}

impl InventoryBackend {
    /// Opens the inventory, checking its format version.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SnapshotError> {
        let path = path.into();
        let inventory = snapshot::load::<GpuInventory>(&path, GPU_INVENTORY_FORMAT_VERSION)?;
        Ok(InventoryBackend {
            path,
            current: RwLock::new(Some(Arc::new(inventory))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn current(&self, call: &'static str) -> Result<Arc<GpuInventory>, BackendError> {
        let current = self.current.read().map_err(|_| BackendError {
            call,
            reason: "inventory lock poisoned".to_string(),
        })?;
        current.clone().ok_or_else(|| BackendError {
            call,
            reason: format!("{} unavailable since the last refresh", self.path.display()),
        })
    }
}

impl GpuBackend for InventoryBackend {
    fn refresh(&self) -> Result<(), BackendError> {
        let loaded = snapshot::load::<GpuInventory>(&self.path, GPU_INVENTORY_FORMAT_VERSION);
        let mut current = self.current.write().map_err(|_| BackendError {
            call: "refresh",
            reason: "inventory lock poisoned".to_string(),
        })?;
        match loaded {
            Ok(inventory) => {
                *current = Some(Arc::new(inventory));
                Ok(())
            }
            Err(err) => {
                *current = None;
                Err(BackendError {
                    call: "refresh",
                    reason: err.to_string(),
                })
            }
        }
    }

    fn devices(&self) -> Result<Vec<GpuDevice>, BackendError> {
        Ok(self.current("devices")?.devices.clone())
    }

    fn device_by_bdfid(&self, bdfid: u64) -> Result<GpuDevice, BackendError> {
        self.current("device")?
            .devices
            .iter()
            .find(|d| d.bdfid == bdfid)
            .cloned()
            .ok_or_else(|| BackendError {
                call: "device",
                reason: format!("no device with bdfid {bdfid}"),
            })
    }

    fn links(&self) -> Result<Vec<GpuLink>, BackendError> {
        Ok(self.current("links")?.links.clone())
    }
}
