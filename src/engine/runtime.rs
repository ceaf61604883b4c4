//! Monte Carlo execution runtime.
//!
//! Runs of a batch are independent, so they are fanned out over a small,
//! bounded, thread-based worker pool. Every worker shares the same `Engine`
//! and `Sampler` by `Arc`; each run owns its state and random stream. The
//! only synchronization point is the final reduction into an
//! `AggregateResult`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use tracing::{debug, info, warn};

use crate::aggregate::AggregateResult;
use crate::error::{EngineError, EngineResult, ExecutionError};
use crate::result::RunResult;
use crate::sampling::Sampler;

use super::Engine;

/// Worker-pool configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonteCarloConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Maximum queued runs.
    pub queue_capacity: usize,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            workers: thread::available_parallelism().map_or(2, usize::from),
            queue_capacity: 1024,
        }
    }
}

impl MonteCarloConfig {
    /// Single-worker configuration.
    #[must_use]
    pub const fn sequential() -> Self {
        Self {
            workers: 1,
            queue_capacity: 1,
        }
    }

    /// Sets the worker count.
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
}

/// Cooperative cancellation signal shared by the runs of a batch.
///
/// Runs observe it at the top of every timestep.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns `true` once `cancel` has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

type Outcome = (usize, EngineResult<RunResult>);

enum Job {
    Run { run_index: usize },
}

struct WorkerPool {
    tx: Sender<Job>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    fn start(
        config: MonteCarloConfig,
        engine: &Arc<Engine>,
        sampler: &Arc<Sampler>,
        base_seed: u64,
        cancel: &CancellationToken,
        results: &Sender<Outcome>,
    ) -> EngineResult<Self> {
        let workers = config.workers.max(1);
        let (tx, rx) = bounded::<Job>(config.queue_capacity.max(1));

        let mut handles = Vec::with_capacity(workers);
        for idx in 0..workers {
            let rx: Receiver<Job> = rx.clone();
            let engine = Arc::clone(engine);
            let sampler = Arc::clone(sampler);
            let cancel = cancel.clone();
            let results = results.clone();
            let spawned = thread::Builder::new()
                .name(format!("econsim-mc-{idx}"))
                .spawn(move || loop {
                    match rx.recv() {
                        Ok(Job::Run { run_index }) => {
                            let outcome = engine.run_single(&sampler, base_seed, run_index, &cancel);
                            let _ = results.send((run_index, outcome));
                        }
                        Err(_) => break,
                    }
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    let pool = Self { tx, workers: handles };
                    pool.shutdown();
                    return Err(EngineError::internal(format!("spawn worker {idx}: {e}")));
                }
            }
        }

        debug!(workers, "worker pool started");
        Ok(Self { tx, workers: handles })
    }

    fn submit(&self, run_index: usize) -> Result<(), ExecutionError> {
        self.tx
            .send(Job::Run { run_index })
            .map_err(|_| ExecutionError::WorkerDisconnected)
    }

    fn shutdown(self) {
        // Workers drain queued jobs, then see the closed channel and exit.
        drop(self.tx);
        for handle in self.workers {
            if handle.join().is_err() {
                warn!("worker thread panicked");
            }
        }
    }
}

/// Executes Monte Carlo batches of one engine.
#[derive(Debug, Clone)]
pub struct MonteCarloRunner {
    engine: Arc<Engine>,
    config: MonteCarloConfig,
}

impl MonteCarloRunner {
    /// Creates a runner.
    #[must_use]
    pub const fn new(engine: Arc<Engine>, config: MonteCarloConfig) -> Self {
        Self { engine, config }
    }

    /// The shared engine.
    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Executes `runs` runs seeded from `base_seed`.
    pub fn run(&self, runs: usize, base_seed: u64) -> EngineResult<AggregateResult> {
        self.run_with_cancel(runs, base_seed, &CancellationToken::new())
    }

    /// Executes `runs` runs, stopping cooperatively once `cancel` fires.
    ///
    /// Cancelled or timed-out runs are discarded and listed in
    /// `cancelled_runs`. Any other run error aborts the batch; the error of
    /// the lowest failing run index is returned. A correlation matrix that
    /// cannot be factored aborts the batch before any run starts.
    pub fn run_with_cancel(
        &self,
        runs: usize,
        base_seed: u64,
        cancel: &CancellationToken,
    ) -> EngineResult<AggregateResult> {
        if runs == 0 {
            return Err(ExecutionError::InvalidConfig {
                reason: "Monte Carlo mode requires at least one run".to_string(),
            }
            .into());
        }

        let sampler = Arc::new(self.engine.sampler()?);
        info!(
            model = %self.engine.model().name,
            runs,
            base_seed,
            workers = self.config.workers.max(1),
            sampled = sampler.dimension(),
            "monte carlo batch started"
        );

        let (results_tx, results_rx) = unbounded::<Outcome>();
        let pool = WorkerPool::start(
            self.config,
            &self.engine,
            &sampler,
            base_seed,
            cancel,
            &results_tx,
        )?;
        drop(results_tx);

        let mut cancelled = Vec::new();
        let mut submitted = 0;
        let mut submit_error = None;
        for run_index in 0..runs {
            if cancel.is_cancelled() {
                cancelled.extend(run_index..runs);
                break;
            }
            if let Err(err) = pool.submit(run_index) {
                submit_error = Some(err);
                break;
            }
            submitted += 1;
        }
        pool.shutdown();

        let mut completed = Vec::with_capacity(submitted);
        let mut failure: Option<(usize, EngineError)> = None;
        for (run_index, outcome) in results_rx {
            match outcome {
                Ok(run) => completed.push(run),
                Err(err) if err.is_cancellation() => cancelled.push(run_index),
                Err(err) => {
                    if failure.as_ref().map_or(true, |(idx, _)| run_index < *idx) {
                        failure = Some((run_index, err));
                    }
                }
            }
        }

        if let Some((run_index, err)) = failure {
            warn!(run_index, error = %err, "monte carlo batch failed");
            return Err(err);
        }
        if let Some(err) = submit_error {
            return Err(err.into());
        }
        if completed.len() + cancelled.len() != runs {
            return Err(ExecutionError::WorkerDisconnected.into());
        }

        cancelled.sort_unstable();
        info!(
            model = %self.engine.model().name,
            completed = completed.len(),
            cancelled = cancelled.len(),
            "monte carlo batch finished"
        );
        Ok(AggregateResult::from_runs(
            self.engine.model(),
            self.engine.fingerprint(),
            base_seed,
            runs,
            completed,
            cancelled,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::ir::{Distribution, Expr, ModelBuilder};

    fn engine() -> Arc<Engine> {
        let model = ModelBuilder::new("noise", 3)
            .stochastic("g", Distribution::Normal { mean: 0.0, std_dev: 1.0 })
            .current("y", Expr::ident("g") * Expr::num(2.0))
            .build()
            .unwrap();
        Arc::new(Engine::new(model, EngineConfig::default()).unwrap())
    }

    #[test]
    fn token_is_shared_between_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn batch_collects_every_run_in_index_order() {
        let runner = MonteCarloRunner::new(engine(), MonteCarloConfig::default().with_workers(4));
        let aggregate = runner.run(25, 11).unwrap();
        assert_eq!(aggregate.runs.len(), 25);
        assert!(aggregate.cancelled_runs.is_empty());
        let indices: Vec<_> = aggregate.runs.iter().map(|r| r.metadata.run_index).collect();
        assert_eq!(indices, (0..25).map(Some).collect::<Vec<_>>());
    }

    #[test]
    fn worker_count_does_not_change_results() {
        let one = MonteCarloRunner::new(engine(), MonteCarloConfig::sequential())
            .run(12, 5)
            .unwrap();
        let many = MonteCarloRunner::new(engine(), MonteCarloConfig::default().with_workers(6))
            .run(12, 5)
            .unwrap();
        assert_eq!(one, many);
    }

    #[test]
    fn zero_runs_is_rejected() {
        let err = MonteCarloRunner::new(engine(), MonteCarloConfig::default())
            .run(0, 1)
            .unwrap_err();
        assert!(err.is_execution());
    }

    #[test]
    fn pre_cancelled_batch_discards_every_run() {
        let token = CancellationToken::new();
        token.cancel();
        let aggregate = MonteCarloRunner::new(engine(), MonteCarloConfig::default())
            .run_with_cancel(8, 1, &token)
            .unwrap();
        assert!(aggregate.runs.is_empty());
        assert_eq!(aggregate.cancelled_runs, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn zero_sized_config_is_clamped() {
        let config = MonteCarloConfig {
            workers: 0,
            queue_capacity: 0,
        };
        let aggregate = MonteCarloRunner::new(engine(), config).run(3, 2).unwrap();
        assert_eq!(aggregate.runs.len(), 3);
    }
}
