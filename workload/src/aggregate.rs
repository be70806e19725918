use std::time::Duration;

use key_space::KeyMode;

use crate::{
    engine::{WorkerResult, WorkloadConfig},
    target::{Operation, Target},
};

/// The summary of one matrix cell. Latencies are in microseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchRow {
    pub target: Target,
    pub operation: Operation,
    pub key_mode: KeyMode,
    pub clients: usize,
    pub value_size: usize,
    pub duration: Duration,
    pub total_ops: u64,
    pub errors: u64,
    pub ops_per_sec: f64,
    pub ops_per_sec_per_client: f64,
    pub p50_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
}

/// Folds the per-worker results of one cell into a row.
///
/// Throughput is computed against the requested duration, so every cell of a
/// matrix is divided by the same window.
pub fn aggregate(config: &WorkloadConfig, results: Vec<WorkerResult>) -> BenchRow {
    let total_ops: u64 = results.iter().map(|r| r.ops).sum();
    let errors: u64 = results.iter().map(|r| r.errors).sum();
    let latencies = merge_sorted(results);

    let secs = config.duration.as_secs_f64();
    let ops_per_sec = if secs > 0.0 {
        total_ops as f64 / secs
    } else {
        0.0
    };
    let ops_per_sec_per_client = if config.concurrency > 0 {
        ops_per_sec / config.concurrency as f64
    } else {
        0.0
    };

    BenchRow {
        target: config.target.clone(),
        operation: config.operation,
        key_mode: config.keys.mode(),
        clients: config.concurrency,
        value_size: config.value_size,
        duration: config.duration,
        total_ops,
        errors,
        ops_per_sec,
        ops_per_sec_per_client,
        p50_us: percentile_us(&latencies, 0.50),
        p95_us: percentile_us(&latencies, 0.95),
        p99_us: percentile_us(&latencies, 0.99),
    }
}

fn merge_sorted(results: Vec<WorkerResult>) -> Vec<u64> {
    let total = results.iter().map(|r| r.latencies_ns.len()).sum();
    let mut merged = Vec::with_capacity(total);
    for result in results {
        merged.extend(result.latencies_ns);
    }
    merged.sort_unstable();
    merged
}

/// Nearest-rank percentile over an ascending slice of nanosecond samples:
/// the value at index `floor(p * (n - 1))`, in microseconds. Zero when empty.
pub fn percentile_us(sorted_ns: &[u64], p: f64) -> f64 {
    if sorted_ns.is_empty() {
        return 0.0;
    }
    let last = sorted_ns.len() - 1;
    let index = ((p.clamp(0.0, 1.0) * last as f64).floor() as usize).min(last);
    sorted_ns[index] as f64 / 1000.0
}
