//! Hardware topology graph CLI.
//!
//! Provides the `hwgraph` binary: builds the topology graph of one machine
//! from the configured backend snapshots and writes it as dot or csv,
//! optionally after a period of dynamic probing.
//!
//! Backend inputs can be supplied through the environment:
//! - `HWGRAPH_TOPOLOGY`: hardware-locality topology snapshot (required)
//! - `HWGRAPH_GPU_INVENTORY`: GPU inventory file
//! - `HWGRAPH_SITE_DESCRIPTOR`: cluster site descriptor
//! - `HWGRAPH_HOSTNAME`: hostname the machine vertex is keyed by
//!
//! Logging goes to stderr, filtered by `RUST_LOG` (default `warn`).

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use tokio::sync::RwLock;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hwgraph_core::{ComponentType, TopologyGraph};
use hwgraph_engine::{run_probing, BuildReport, EngineConfig, EngineError, GraphBuilder};
use hwgraph_export::listing::{write_component_types, write_properties_per_component};
use hwgraph_export::{parse_components, ExportError, ExportView, OutputFormat};
use hwgraph_modules::{ClusterModule, GpuModule, TopologyModule};

const EXIT_OK: i32 = 0;
const EXIT_USAGE: i32 = 1;
const EXIT_BUILD: i32 = 2;
const EXIT_IO: i32 = 3;

/// Get a graph representation of the hardware topology of this system.
///
/// Without options the graph is printed to stdout in dot format.
#[derive(Parser, Debug)]
#[command(name = "hwgraph", version)]
struct Cli {
    /// List available modules and exit.
    #[arg(short = 'M', long)]
    list_modules: bool,

    /// List component types (usable with -c) and exit.
    #[arg(short = 'C', long)]
    list_component_types: bool,

    /// List properties per component type (usable with -p) and exit.
    #[arg(short = 'P', long)]
    list_properties_per_component: bool,

    /// List output formats (usable with -f or as -o extension) and exit.
    #[arg(short = 'O', long)]
    list_output_formats: bool,

    /// Only include vertices of the listed component types.
    #[arg(short = 'c', long, value_name = "COMPONENT,...", value_delimiter = ',')]
    component_types: Vec<String>,

    /// Only include the listed vertex properties.
    #[arg(short = 'p', long, value_name = "PROPERTY,...", value_delimiter = ',')]
    vertex_properties: Vec<String>,

    /// Periodically re-probe the hardware; the optional frequency is in
    /// milliseconds (default 1000).
    #[arg(short = 'd', long, value_name = "MS", num_args = 0..=1)]
    dynamic_probing: Option<Option<u64>>,

    /// Time limit of dynamic probing in milliseconds (default 60000).
    #[arg(short = 'l', long, value_name = "MS")]
    probing_period: Option<u64>,

    /// Output file; its extension selects the format unless -f is given.
    #[arg(short = 'o', long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Output format, regardless of the output file's extension.
    #[arg(short = 'f', long, value_name = "FORMAT")]
    output_format: Option<String>,

    /// Hardware-locality topology snapshot.
    #[arg(long, env = "HWGRAPH_TOPOLOGY", value_name = "FILE")]
    topology: Option<PathBuf>,

    /// GPU inventory file.
    #[arg(long, env = "HWGRAPH_GPU_INVENTORY", value_name = "FILE")]
    gpu_inventory: Option<PathBuf>,

    /// Cluster site descriptor.
    #[arg(long, env = "HWGRAPH_SITE_DESCRIPTOR", value_name = "FILE")]
    site_descriptor: Option<PathBuf>,

    /// Hostname of this machine (default: the topology snapshot's).
    #[arg(long, env = "HWGRAPH_HOSTNAME", value_name = "NAME")]
    hostname: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Help and version go to stdout and are not failures.
            let code = if err.use_stderr() { EXIT_USAGE } else { EXIT_OK };
            let _ = err.print();
            process::exit(code);
        }
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();

    process::exit(run(cli).await);
}

/// Everything the export step needs, validated before any backend is
/// touched.
struct ExportRequest {
    components: Vec<ComponentType>,
    properties: Vec<String>,
    format: OutputFormat,
    output: Option<PathBuf>,
}

/// Execute the CLI.
///
/// Returns exit code: 0 = success, 1 = usage error, 2 = build failure,
/// 3 = I/O error.
async fn run(cli: Cli) -> i32 {
    let mut stdout = io::stdout().lock();

    if cli.list_output_formats {
        for format in OutputFormat::ALL {
            if writeln!(stdout, "{:<8}{}", format.name(), format.description()).is_err() {
                return EXIT_IO;
            }
        }
        return EXIT_OK;
    }
    if cli.list_component_types {
        return exit_code(write_component_types(&mut stdout));
    }
    drop(stdout);

    let request = match export_request(&cli) {
        Ok(request) => request,
        Err(err) => {
            eprintln!("Error: {err}");
            return EXIT_USAGE;
        }
    };
    let config = match engine_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}");
            return EXIT_USAGE;
        }
    };

    let mut builder = register_modules(&cli);
    if cli.list_modules {
        return list_modules(&builder);
    }

    // Backend calls block; keep them off the runtime's worker threads.
    let built = tokio::task::spawn_blocking(move || {
        let result = builder.build();
        (builder, result)
    })
    .await;
    let (builder, result) = match built {
        Ok(pair) => pair,
        Err(err) => {
            eprintln!("Error: graph build task failed: {err}");
            return EXIT_BUILD;
        }
    };
    let (graph, report) = match result {
        Ok(built) => built,
        Err(err) => {
            eprintln!("Error: {err}");
            if matches!(err, EngineError::NoMainModule { .. }) {
                eprintln!("hint: pass a topology snapshot with --topology or HWGRAPH_TOPOLOGY");
            }
            shutdown(builder).await;
            return EXIT_BUILD;
        }
    };
    log_report(&report);

    let graph = Arc::new(RwLock::new(graph));
    let builder = Arc::new(Mutex::new(builder));

    if config.dynamic_probing {
        if let Err(err) = run_probing(Arc::clone(&graph), Arc::clone(&builder), &config).await {
            eprintln!("Error: dynamic probing aborted: {err}");
            shutdown_shared(builder).await;
            return EXIT_BUILD;
        }
    }

    let code = {
        let graph = graph.read().await;
        if cli.list_properties_per_component {
            exit_code(write_properties_per_component(&graph, &mut io::stdout().lock()))
        } else {
            export(&graph, &request)
        }
    };

    shutdown_shared(builder).await;
    code
}

fn export_request(cli: &Cli) -> Result<ExportRequest, ExportError> {
    let components = parse_components(&cli.component_types)?;
    let explicit = cli
        .output_format
        .as_deref()
        .map(str::parse::<OutputFormat>)
        .transpose()?;
    let format = OutputFormat::resolve(explicit, cli.output.as_deref())?;
    Ok(ExportRequest {
        components,
        properties: cli.vertex_properties.clone(),
        format,
        output: cli.output.clone(),
    })
}

/// Environment defaults, overridden by the probing flags.
fn engine_config(cli: &Cli) -> Result<EngineConfig, EngineError> {
    let mut config = EngineConfig::from_env()?;
    if let Some(frequency) = cli.dynamic_probing {
        config = config.with_dynamic_probing(frequency.map(Duration::from_millis));
        if let Some(period) = cli.probing_period {
            config = config.with_probing_period(Duration::from_millis(period));
        }
    } else if cli.probing_period.is_some() {
        warn!("--probing-period has no effect without --dynamic-probing");
    }
    config.validate()?;
    Ok(config)
}

fn register_modules(cli: &Cli) -> GraphBuilder {
    let topology = match &cli.topology {
        Some(path) => TopologyModule::open(path, cli.hostname.clone()),
        None => TopologyModule::disabled(),
    };
    let hostname = topology.hostname().unwrap_or("localhost").to_string();
    let gpu = match &cli.gpu_inventory {
        Some(path) => GpuModule::open(path),
        None => GpuModule::disabled(),
    };
    let cluster = match &cli.site_descriptor {
        Some(path) => ClusterModule::open(path, hostname),
        None => ClusterModule::disabled(),
    };

    let mut builder = GraphBuilder::new();
    builder
        .register(Box::new(topology))
        .register(Box::new(gpu))
        .register(Box::new(cluster));
    builder
}

fn list_modules(builder: &GraphBuilder) -> i32 {
    let mut stdout = io::stdout().lock();
    for module in builder.modules() {
        let role = if module.is_main_module() { "main" } else { "secondary" };
        let state = if module.is_enabled() { "enabled" } else { "disabled" };
        if writeln!(
            stdout,
            "{:<10}{:<11}{:<10}{}",
            module.name(),
            role,
            state,
            module.description()
        )
        .is_err()
        {
            return EXIT_IO;
        }
    }
    EXIT_OK
}

fn log_report(report: &BuildReport) {
    for failure in report.failures() {
        warn!(
            module = failure.module,
            phase = failure.phase.name(),
            status = %failure.status,
            detail = failure.detail.as_deref().unwrap_or(""),
            "module did not contribute"
        );
    }
    info!(main = report.main_module.unwrap_or("none"), "build finished");
}

fn export(graph: &TopologyGraph, request: &ExportRequest) -> i32 {
    let mut view = ExportView::new(graph).with_components(&request.components);
    // No -p means every property.
    if !request.properties.is_empty() {
        view = match view.with_properties(&request.properties) {
            Ok(view) => view,
            Err(err) => {
                eprintln!("Error: {err}");
                return EXIT_USAGE;
            }
        };
    }

    let result = match &request.output {
        Some(path) => match File::create(path) {
            Ok(file) => {
                let mut out = BufWriter::new(file);
                request
                    .format
                    .write(&view, &mut out)
                    .and_then(|()| out.flush().map_err(ExportError::from))
            }
            Err(err) => {
                eprintln!("Error: cannot create '{}': {err}", path.display());
                return EXIT_IO;
            }
        },
        None => {
            let mut out = io::stdout().lock();
            request
                .format
                .write(&view, &mut out)
                .and_then(|()| out.flush().map_err(ExportError::from))
        }
    };
    exit_code(result)
}

/// Exit code of a listing or export result.
fn exit_code(result: Result<(), ExportError>) -> i32 {
    match result {
        Ok(()) => EXIT_OK,
        Err(err) => {
            eprintln!("Error: {err}");
            if err.is_usage() {
                EXIT_USAGE
            } else {
                EXIT_IO
            }
        }
    }
}

async fn shutdown(mut builder: GraphBuilder) {
    let _ = tokio::task::spawn_blocking(move || builder.shutdown()).await;
}

/// Releases every module's backend, even if another module's release fails.
async fn shutdown_shared(builder: Arc<Mutex<GraphBuilder>>) {
    let released = tokio::task::spawn_blocking(move || match builder.lock() {
        Ok(mut builder) => builder.shutdown().len(),
        Err(_) => {
            warn!("module registry poisoned, skipping shutdown");
            0
        }
    })
    .await;
    if let Ok(failures) = released {
        if failures > 0 {
            warn!(failures, "some modules failed to shut down");
        }
    }
}
