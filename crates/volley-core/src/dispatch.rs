use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::caller::{CallError, Caller};
use crate::gate::Gate;
use crate::stats::{RunSummary, StatsCollector};

/// Outcome of one task: the call outcome plus task bookkeeping. Produced
/// exactly once per task index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallResult {
    pub task_index: u64,
    pub status: Option<u16>,
    pub latency_ms: u64,
    pub error: Option<CallError>,
}

/// Knobs for a single dispatcher run.
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Number of tasks to launch.
    pub task_count: u64,
    /// Maximum concurrent in-flight calls.
    pub concurrency: u64,
    /// Pause inserted after a task releases its permit. The pause happens
    /// outside the gate, so it never occupies a concurrency slot.
    pub pacing: Option<Duration>,
    /// Status code that counts as a success.
    pub expect_status: u16,
    /// Emit one log line per completed task.
    pub log_each_call: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            task_count: 1000,
            concurrency: 100,
            pacing: Some(Duration::from_millis(100)),
            expect_status: 200,
            log_each_call: true,
        }
    }
}

/// Everything a finished run produces: per-task results in completion order
/// plus the aggregate summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub summary: RunSummary,
    pub results: Vec<CallResult>,
}

/// Fan-out / fan-in orchestrator: launches every task, waits for all of
/// them, then aggregates.
pub struct Dispatcher {
    caller: Arc<dyn Caller>,
    opts: DispatchOptions,
}

impl Dispatcher {
    pub fn new(caller: Arc<dyn Caller>, opts: DispatchOptions) -> Self {
        Self { caller, opts }
    }

    pub async fn run(&self) -> Result<RunReport> {
        // An unbuildable gate is fatal before any task launches; everything
        // after this point degrades the success count instead of failing.
        let gate = Arc::new(Gate::new(self.opts.concurrency)?);

        info!(
            "Dispatching {} calls via '{}' (concurrency limit {})",
            self.opts.task_count,
            self.caller.name(),
            gate.capacity()
        );

        let started = Instant::now();
        let (result_tx, mut result_rx) =
            mpsc::channel::<CallResult>(self.opts.task_count.max(1) as usize);

        for task_index in 0..self.opts.task_count {
            let gate = gate.clone();
            let caller = self.caller.clone();
            let result_tx = result_tx.clone();
            let pacing = self.opts.pacing;

            tokio::spawn(async move {
                let permit = gate.admit().await;

                let call_started = Instant::now();
                let outcome = caller.call().await;
                let latency_ms = call_started.elapsed().as_millis() as u64;

                drop(permit);

                if let Some(pause) = pacing {
                    sleep(pause).await;
                }

                let _ = result_tx
                    .send(CallResult {
                        task_index,
                        status: outcome.status,
                        latency_ms,
                        error: outcome.error,
                    })
                    .await;
            });
        }

        // Every task holds a sender clone; the channel closes once the last
        // task has reported. Draining it is the fan-in barrier.
        drop(result_tx);

        let mut stats = StatsCollector::new(self.opts.expect_status);
        let mut results = Vec::with_capacity(self.opts.task_count as usize);

        while let Some(result) = result_rx.recv().await {
            if self.opts.log_each_call {
                match &result.error {
                    None => info!(
                        "Call {} -> {} ({}ms)",
                        result.task_index,
                        result.status.unwrap_or_default(),
                        result.latency_ms
                    ),
                    Some(error) => warn!(
                        "Call {} -> {} ({}ms)",
                        result.task_index, error, result.latency_ms
                    ),
                }
            }

            stats.record(&result);
            results.push(result);
        }

        let summary = stats.summary(started.elapsed(), gate.peak_in_flight());

        info!(
            "All calls completed: {}/{} ok in {}ms",
            summary.success_count, summary.total_tasks, summary.duration_ms
        );

        Ok(RunReport { summary, results })
    }
}
