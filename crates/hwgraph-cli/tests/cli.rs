//! Runs the `hwgraph` binary against snapshot files.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

const TOPOLOGY: &str = r#"{
    "format_version": 2,
    "hostname": "n01",
    "root": {
        "type": "Machine",
        "children": [
            {
                "type": "NUMANode",
                "os_index": 0,
                "attributes": { "local_memory": 17179869184 },
                "children": [
                    {
                        "type": "Package",
                        "os_index": 0,
                        "children": [
                            { "type": "Core", "os_index": 0, "children": [ { "type": "PU", "os_index": 0 } ] }
                        ]
                    }
                ]
            },
            {
                "type": "PCIDev",
                "attributes": { "pci": { "bus": 3, "device": 0, "function": 0 } }
            }
        ]
    }
}"#;

const GPUS: &str = r#"{
    "format_version": 1,
    "devices": [
        { "index": 0, "bdfid": 768, "vram_total": 1024 },
        { "index": 1, "bdfid": 1024, "vram_total": 2048 }
    ],
    "links": [
        { "source": 0, "target": 1, "p2p_accessible": true, "link_type": "xgmi", "hops": 1 }
    ]
}"#;

const SITE: &str = r#"{
    "format_version": 1,
    "site": "lrz",
    "nodes": [ { "hostname": "n01", "island": 2, "partition": "test" } ]
}"#;

struct Inputs {
    dir: TempDir,
}

impl Inputs {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("topology.json"), TOPOLOGY).unwrap();
        fs::write(dir.path().join("gpus.json"), GPUS).unwrap();
        fs::write(dir.path().join("site.json"), SITE).unwrap();
        Inputs { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

fn hwgraph(topology: Option<&Path>, args: &[&str]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_hwgraph"));
    for var in [
        "HWGRAPH_TOPOLOGY",
        "HWGRAPH_GPU_INVENTORY",
        "HWGRAPH_SITE_DESCRIPTOR",
        "HWGRAPH_HOSTNAME",
        "HWGRAPH_PROBING_FREQUENCY_MS",
        "HWGRAPH_PROBING_PERIOD_MS",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    if let Some(topology) = topology {
        cmd.arg("--topology").arg(topology);
    }
    cmd.args(args).output().unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).unwrap()
}

#[test]
fn lists_output_formats() {
    let out = hwgraph(None, &["-O"]);
    assert_eq!(out.status.code(), Some(0));
    let text = stdout(&out);
    assert!(text.lines().any(|l| l.starts_with("dot ")));
    assert!(text.lines().any(|l| l.starts_with("csv ")));
}

#[test]
fn lists_component_types_without_a_topology() {
    let out = hwgraph(None, &["--list-component-types"]);
    assert_eq!(out.status.code(), Some(0));
    assert!(stdout(&out).contains("logical_core"));
}

#[test]
fn lists_modules_with_their_state() {
    let inputs = Inputs::new();
    let out = hwgraph(Some(&inputs.path("topology.json")), &["-M"]);
    assert_eq!(out.status.code(), Some(0));
    let text = stdout(&out);
    let line = |name: &str| text.lines().find(|l| l.starts_with(name)).unwrap().to_string();
    assert!(line("topology").contains("main"));
    assert!(line("topology").contains("enabled"));
    assert!(line("gpu").contains("disabled"));
    assert!(line("cluster").contains("disabled"));
}

#[test]
fn default_output_is_dot_on_stdout() {
    let inputs = Inputs::new();
    let out = hwgraph(Some(&inputs.path("topology.json")), &[]);
    assert_eq!(out.status.code(), Some(0));
    let text = stdout(&out);
    assert!(text.starts_with("digraph topology {\n"));
    assert!(text.contains("\"label\"=\"machine:n01\""));
    assert!(text.trim_end().ends_with('}'));
}

#[test]
fn missing_topology_is_a_build_failure() {
    let out = hwgraph(None, &[]);
    assert_eq!(out.status.code(), Some(2));
    assert!(stdout(&out).is_empty());
}

#[test]
fn unknown_component_is_a_usage_error() {
    let inputs = Inputs::new();
    let out = hwgraph(Some(&inputs.path("topology.json")), &["-c", "core,warp_drive"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("warp_drive"));
}

#[test]
fn unknown_property_is_a_usage_error() {
    let inputs = Inputs::new();
    let out = hwgraph(Some(&inputs.path("topology.json")), &["-p", "memory,bogus"]);
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn unknown_flag_is_a_usage_error() {
    let out = hwgraph(None, &["--frobnicate"]);
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn output_extension_selects_csv() {
    let inputs = Inputs::new();
    let target = inputs.path("graph.csv");
    let out = hwgraph(
        Some(&inputs.path("topology.json")),
        &["-c", "core", "-p", "os_index", "-o", target.to_str().unwrap()],
    );
    assert_eq!(out.status.code(), Some(0));
    let text = fs::read_to_string(target).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines[0], "id,label,component,os_index");
    assert_eq!(lines.len(), 3);
    assert!(lines[1].ends_with(",physical_core,0"));
}

#[test]
fn explicit_format_overrides_extension() {
    let inputs = Inputs::new();
    let target = inputs.path("graph.csv");
    let out = hwgraph(
        Some(&inputs.path("topology.json")),
        &["-o", target.to_str().unwrap(), "-f", "dot"],
    );
    assert_eq!(out.status.code(), Some(0));
    assert!(fs::read_to_string(target).unwrap().starts_with("digraph"));
}

#[test]
fn unknown_output_format_is_a_usage_error() {
    let inputs = Inputs::new();
    let out = hwgraph(Some(&inputs.path("topology.json")), &["-f", "json"]);
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn unwritable_output_is_an_io_error() {
    let inputs = Inputs::new();
    let target = inputs.path("no/such/dir/graph.dot");
    let out = hwgraph(
        Some(&inputs.path("topology.json")),
        &["-o", target.to_str().unwrap()],
    );
    assert_eq!(out.status.code(), Some(3));
}

#[test]
fn all_modules_contribute_to_the_export() {
    let inputs = Inputs::new();
    let gpus = inputs.path("gpus.json");
    let site = inputs.path("site.json");
    let out = hwgraph(
        Some(&inputs.path("topology.json")),
        &[
            "--gpu-inventory",
            gpus.to_str().unwrap(),
            "--site-descriptor",
            site.to_str().unwrap(),
            "-f",
            "csv",
            "-c",
            "node,pci_device",
            "-p",
            "memory_vram,island",
        ],
    );
    assert_eq!(out.status.code(), Some(0));
    let text = stdout(&out);
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines[0], "id,label,component,memory_vram,island");
    assert_eq!(lines[1], "0,machine:n01,node,,2");
    assert!(lines.contains(&"2,bdfid:768,pci_device,1024,"));
    assert!(lines.iter().any(|l| l.ends_with(",bdfid:1024,pci_device,2048,")));
}

#[test]
fn lists_properties_per_component() {
    let inputs = Inputs::new();
    let gpus = inputs.path("gpus.json");
    let out = hwgraph(
        Some(&inputs.path("topology.json")),
        &["-P", "--gpu-inventory", gpus.to_str().unwrap()],
    );
    assert_eq!(out.status.code(), Some(0));
    let text = stdout(&out);
    assert!(text.starts_with("node:\n"));
    assert!(text.contains("pci_device:\n"));
    assert!(text.contains("  memory_vram "));
}

#[test]
fn dynamic_probing_runs_for_the_period_then_exports() {
    let inputs = Inputs::new();
    let gpus = inputs.path("gpus.json");
    let out = hwgraph(
        Some(&inputs.path("topology.json")),
        &["--gpu-inventory", gpus.to_str().unwrap(), "-d", "10", "-l", "100"],
    );
    assert_eq!(out.status.code(), Some(0));
    assert!(stdout(&out).contains("\"type\"=\"interconnect\""));
}

#[test]
fn dynamic_probing_without_a_frequency_uses_the_default() {
    let inputs = Inputs::new();
    let out = hwgraph(Some(&inputs.path("topology.json")), &["-l", "50", "-d"]);
    assert_eq!(out.status.code(), Some(0));
}
