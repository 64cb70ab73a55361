//! Shared snapshot fixtures.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Machine `n01`: one NUMA node holding a package with a cache chain down
/// to one core and two hardware threads; a bridge with two PCI devices, the
/// first exposing a GPU; and one object of a type with no category.
pub const TOPOLOGY: &str = r#"{
    "format_version": 2,
    "hostname": "n01",
    "root": {
        "type": "Machine",
        "os_index": 0,
        "attributes": { "total_memory": 68719476736 },
        "children": [
            {
                "type": "NUMANode",
                "os_index": 0,
                "attributes": { "local_memory": 68719476736 },
                "children": [
                    {
                        "type": "Package",
                        "os_index": 0,
                        "children": [
                            {
                                "type": "L3Cache",
                                "attributes": { "cache_size": 33554432, "cache_linesize": 64 },
                                "children": [
                                    {
                                        "type": "L2Cache",
                                        "attributes": { "cache_size": 524288, "cache_linesize": 64 },
                                        "children": [
                                            {
                                                "type": "L1Cache",
                                                "attributes": { "cache_size": 32768, "cache_linesize": 64 },
                                                "children": [
                                                    {
                                                        "type": "Core",
                                                        "os_index": 0,
                                                        "children": [
                                                            { "type": "PU", "os_index": 0 },
                                                            { "type": "PU", "os_index": 1 }
                                                        ]
                                                    }
                                                ]
                                            }
                                        ]
                                    }
                                ]
                            }
                        ]
                    }
                ]
            },
            {
                "type": "Bridge",
                "children": [
                    {
                        "type": "PCIDev",
                        "attributes": {
                            "pci": { "bus": 3, "device": 0, "function": 0, "vendor_id": 4098, "device_id": 29580 }
                        },
                        "children": [
                            { "type": "OSDev", "osdev_type": "gpu", "name": "card0" }
                        ]
                    },
                    {
                        "type": "PCIDev",
                        "attributes": { "pci": { "bus": 4, "device": 0, "function": 0 } }
                    }
                ]
            },
            { "type": "Quantum", "name": "qpu0" }
        ]
    }
}"#;

/// Vertices the topology fixture produces.
pub const TOPOLOGY_VERTICES: usize = 14;

/// Three GPUs: two on the fixture's PCI devices (bdfid 768 and 1024), one
/// the topology does not know (bdfid 2048).
pub const GPU_INVENTORY: &str = r#"{
    "format_version": 1,
    "devices": [
        { "index": 0, "bdfid": 768, "numa_node": 0, "vram_total": 34342961152,
          "visible_vram_total": 34342961152, "gtt_total": 67108864000, "busy_percent": 12 },
        { "index": 1, "bdfid": 1024, "numa_node": 0, "vram_total": 34342961152 },
        { "index": 2, "bdfid": 2048 }
    ],
    "links": [
        { "source": 0, "target": 1, "p2p_accessible": true, "link_type": "xgmi",
          "hops": 1, "weight": 15, "min_bandwidth": 50000, "max_bandwidth": 100000 },
        { "source": 0, "target": 2, "p2p_accessible": true, "link_type": "pci_express",
          "hops": 2, "weight": 40, "max_bandwidth": 999 },
        { "source": 1, "target": 2, "p2p_accessible": false, "link_type": "pci_express", "hops": 2 }
    ]
}"#;

pub const SITE_DESCRIPTOR: &str = r#"{
    "format_version": 1,
    "site": "lrz",
    "nodes": [
        { "hostname": "n01", "island": 3, "rack": "r12", "partition": "gpu", "interconnect": "omni-path" }
    ]
}"#;

/// Fixture files in a temporary directory.
pub struct Fixtures {
    pub dir: TempDir,
}

impl Fixtures {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("topology.json"), TOPOLOGY).unwrap();
        fs::write(dir.path().join("gpus.json"), GPU_INVENTORY).unwrap();
        fs::write(dir.path().join("site.json"), SITE_DESCRIPTOR).unwrap();
        Fixtures { dir }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn topology(&self) -> PathBuf {
        self.path("topology.json")
    }

    pub fn gpus(&self) -> PathBuf {
        self.path("gpus.json")
    }

    pub fn site(&self) -> PathBuf {
        self.path("site.json")
    }

    pub fn rewrite(&self, path: &Path, text: &str) {
        fs::write(path, text).unwrap();
    }
}
