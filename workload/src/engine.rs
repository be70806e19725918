use std::{sync::Arc, time::Duration};

use key_space::KeySpace;
use rand::{Rng, SeedableRng, rngs::StdRng};
use tokio::{
    sync::{oneshot, watch},
    time::Instant,
};
use tokio_util::sync::CancellationToken;

use crate::{
    aggregate::{BenchRow, aggregate},
    client::{Connector, KvConnection},
    connect::{ConnectPolicy, connect_with_retry},
    error::WorkloadError,
    harness::Harness,
    target::{Operation, Target},
};

/// Latency samples kept per worker. Later operations are still counted but
/// not timed.
pub const LATENCY_SAMPLE_CAP: usize = 2000;

/// Distance between the seeds of neighbouring workers.
pub const WORKER_SEED_STRIDE: u64 = 1337;

pub const WORKLOAD_FILL: u8 = b'Y';

/// One matrix cell.
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    pub target: Target,
    pub operation: Operation,
    pub keys: Arc<KeySpace>,
    pub value_size: usize,
    pub duration: Duration,
    pub concurrency: usize,
    pub seed: u64,
}

impl WorkloadConfig {
    pub fn worker_seed(&self, worker: usize) -> u64 {
        self.seed
            .wrapping_add((worker as u64).wrapping_mul(WORKER_SEED_STRIDE))
    }
}

/// What one worker observed. Owned by the worker until it finishes, then
/// moved to the aggregator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerResult {
    pub ops: u64,
    pub errors: u64,
    pub latencies_ns: Vec<u64>,
}

impl WorkerResult {
    fn with_capacity(cap: usize) -> Self {
        Self {
            ops: 0,
            errors: 0,
            latencies_ns: Vec::with_capacity(cap),
        }
    }

    fn record(&mut self, latency: Duration, cap: usize) {
        self.ops += 1;
        if self.latencies_ns.len() < cap {
            self.latencies_ns
                .push(u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX));
        }
    }
}

/// Everything a worker task needs, moved into it at spawn.
struct WorkerContext<C> {
    index: usize,
    connector: Arc<C>,
    policy: ConnectPolicy,
    cancel: CancellationToken,
    config: Arc<WorkloadConfig>,
    // dropped unsent if the worker dies before connecting
    ready: oneshot::Sender<()>,
    start: watch::Receiver<Option<Instant>>,
}

impl<C: Connector> Harness<C> {
    /// Runs one timed cell with `config.concurrency` workers, each on its
    /// own connection, and aggregates what they observed.
    ///
    /// The window opens once every worker has either connected or given up,
    /// and closes at the same deadline for all of them.
    pub async fn run(&self, config: WorkloadConfig) -> Result<BenchRow, WorkloadError> {
        let results = self.run_workers(Arc::new(config.clone())).await?;
        Ok(aggregate(&config, results))
    }

    pub async fn run_workers(
        &self,
        config: Arc<WorkloadConfig>,
    ) -> Result<Vec<WorkerResult>, WorkloadError> {
        let (start_tx, start_rx) = watch::channel(None);

        let mut handles = Vec::with_capacity(config.concurrency);
        let mut ready = Vec::with_capacity(config.concurrency);
        for index in 0..config.concurrency {
            let (ready_tx, ready_rx) = oneshot::channel();
            let ctx = WorkerContext {
                index,
                connector: self.connector.clone(),
                policy: self.policy,
                cancel: self.cancel.clone(),
                config: config.clone(),
                ready: ready_tx,
                start: start_rx.clone(),
            };
            handles.push(tokio::spawn(run_worker(ctx)));
            ready.push(ready_rx);
        }
        drop(start_rx);

        for signal in ready {
            let _ = signal.await;
        }
        let opened = Instant::now();
        let _ = start_tx.send(Some(opened + config.duration));

        let mut results = Vec::with_capacity(handles.len());
        let mut panicked = None;
        for (index, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::error!(worker = index, error = %e, "worker task failed");
                    panicked.get_or_insert(index);
                }
            }
        }
        if let Some(index) = panicked {
            return Err(WorkloadError::WorkerPanicked(index));
        }

        tracing::debug!(
            op = %config.operation,
            clients = config.concurrency,
            elapsed = ?opened.elapsed(),
            "workers joined"
        );
        Ok(results)
    }
}

async fn run_worker<C: Connector>(ctx: WorkerContext<C>) -> WorkerResult {
    let WorkerContext {
        index,
        connector,
        policy,
        cancel,
        config,
        ready,
        mut start,
    } = ctx;

    let connection =
        connect_with_retry(connector.as_ref(), &config.target, &policy, &cancel).await;

    let _ = ready.send(());
    let deadline = match start.wait_for(Option::is_some).await {
        Ok(deadline) => *deadline,
        Err(_) => None,
    };

    let Some(deadline) = deadline else {
        return WorkerResult::default();
    };
    let mut connection = match connection {
        Ok(connection) => connection,
        Err(WorkloadError::Cancelled) => return WorkerResult::default(),
        Err(e) => {
            tracing::warn!(
                worker = index,
                error = %e,
                "worker could not connect, contributing zero ops"
            );
            return WorkerResult::default();
        }
    };

    let mut rng = StdRng::seed_from_u64(config.worker_seed(index));
    let value = vec![WORKLOAD_FILL; config.value_size];
    let key_count = config.keys.len();
    let mut result = WorkerResult::with_capacity(LATENCY_SAMPLE_CAP);

    while Instant::now() < deadline && !cancel.is_cancelled() {
        let key = &config.keys[rng.gen_range(0..key_count)];

        let sent = Instant::now();
        let outcome = match config.operation {
            Operation::Get => connection.get(key).await.map(|_| ()),
            Operation::Set => connection.set(key, &value).await,
        };
        let latency = sent.elapsed();

        match outcome {
            Ok(()) => result.record(latency, LATENCY_SAMPLE_CAP),
            Err(e) if e.is_disconnect() => {
                tracing::warn!(
                    worker = index,
                    error = %e,
                    ops = result.ops,
                    "connection lost, worker stopping early"
                );
                break;
            }
            Err(_) => result.errors += 1,
        }
    }

    result
}
