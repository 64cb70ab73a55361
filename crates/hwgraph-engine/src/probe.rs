//! Dynamic probing: periodic re-invocation of `update_graph`.
//!
//! The graph sits behind a `tokio::sync::RwLock` so exporters can read it
//! while no probe is running. Each tick runs the blocking module updates on
//! a `spawn_blocking` worker that holds the write guard for the whole tick.
//! A tick that arrives while the previous probe is still running is skipped.
//! At the probing deadline an in-flight probe gets one more tick interval to
//! finish, and its result is collected like any other. A probe still running
//! after that is detached; the next reader queues behind its write guard.

use std::sync::{Arc, Mutex};

use hwgraph_core::TopologyGraph;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::builder::GraphBuilder;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::report::BuildReport;

/// Counters of one probing run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeStats {
    /// Ticks observed.
    pub ticks: u64,
    /// Probes that ran to completion.
    pub completed: u64,
    /// Ticks skipped because a probe was in flight.
    pub skipped: u64,
    /// Module update failures across all completed probes.
    pub module_failures: u64,
}

type ProbeTask = JoinHandle<Result<BuildReport, EngineError>>;

/// Runs probe ticks until `config.probing_period` elapses.
///
/// Fails only on a consistency violation raised by a module update, or if a
/// probe task panicked.
pub async fn run_probing(
    graph: Arc<RwLock<TopologyGraph>>,
    builder: Arc<Mutex<GraphBuilder>>,
    config: &EngineConfig,
) -> Result<ProbeStats, EngineError> {
    config.validate()?;

    let mut stats = ProbeStats::default();
    let mut ticker = interval(config.probing_frequency);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let deadline = sleep(config.probing_period);
    tokio::pin!(deadline);

    let mut in_flight: Option<ProbeTask> = None;

    info!(
        frequency_ms = config.probing_frequency.as_millis() as u64,
        period_ms = config.probing_period.as_millis() as u64,
        "dynamic probing started"
    );

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = ticker.tick() => {
                stats.ticks += 1;
                if in_flight.as_ref().is_some_and(|task| !task.is_finished()) {
                    stats.skipped += 1;
                    debug!(tick = stats.ticks, "probe still running, skipping tick");
                    continue;
                }
                if let Some(task) = in_flight.take() {
                    collect(task.await, &mut stats)?;
                }
                in_flight = Some(spawn_probe(Arc::clone(&graph), Arc::clone(&builder)));
            }
        }
    }

    if let Some(mut task) = in_flight.take() {
        match timeout(config.probing_frequency, &mut task).await {
            Ok(joined) => collect(joined, &mut stats)?,
            Err(_) => warn!(
                grace_ms = config.probing_frequency.as_millis() as u64,
                "probe still running after the deadline, detaching it"
            ),
        }
    }

    info!(
        ticks = stats.ticks,
        completed = stats.completed,
        skipped = stats.skipped,
        failures = stats.module_failures,
        "dynamic probing finished"
    );
    Ok(stats)
}

fn spawn_probe(graph: Arc<RwLock<TopologyGraph>>, builder: Arc<Mutex<GraphBuilder>>) -> ProbeTask {
    tokio::task::spawn_blocking(move || {
        let mut builder = builder.lock().map_err(|_| EngineError::Poisoned)?;
        let mut graph = graph.blocking_write();
        builder.update(&mut graph)
    })
}

fn collect(
    joined: Result<Result<BuildReport, EngineError>, tokio::task::JoinError>,
    stats: &mut ProbeStats,
) -> Result<(), EngineError> {
    let report = joined.map_err(|e| EngineError::ProbeTask(e.to_string()))??;
    stats.completed += 1;
    for failure in report.failures() {
        stats.module_failures += 1;
        warn!(module = failure.module, status = %failure.status, "probe failure");
    }
    Ok(())
}
