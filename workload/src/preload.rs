use std::time::{Duration, Instant};

use key_space::KeySpace;

use crate::{
    client::{Connector, KvConnection},
    error::WorkloadError,
    harness::Harness,
    target::Target,
};

pub const PRELOAD_FILL: u8 = b'X';

#[derive(Debug, Clone, PartialEq)]
pub struct PreloadReport {
    pub loaded: usize,
    pub elapsed: Duration,
    /// False when the run was interrupted before every key was written.
    pub complete: bool,
}

impl PreloadReport {
    pub fn ops_per_sec(&self) -> f64 {
        rate(self.loaded as u64, self.elapsed)
    }
}

fn rate(ops: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 { ops as f64 / secs } else { 0.0 }
}

impl<C: Connector> Harness<C> {
    /// Writes every key once, in key-space order, over a single connection.
    /// Any failed SET aborts the run.
    pub async fn preload(
        &self,
        target: &Target,
        keys: &KeySpace,
        value_size: usize,
        report_every: usize,
    ) -> Result<PreloadReport, WorkloadError> {
        let total = keys.len();
        tracing::info!(keys = total, value_size, "preloading (single connection)");

        let mut connection = self.connect(target).await?;
        let value = vec![PRELOAD_FILL; value_size];
        let report_every = report_every.max(1);

        let started = Instant::now();
        let mut last_report = started;
        let mut loaded = 0;

        for (index, key) in keys.iter().enumerate() {
            if self.is_cancelled() {
                break;
            }

            connection
                .set(key, &value)
                .await
                .map_err(|source| WorkloadError::Preload {
                    index,
                    key: key.to_string(),
                    source,
                })?;
            loaded += 1;

            if loaded % report_every == 0 || loaded == total {
                let now = Instant::now();
                let interval = (loaded - 1) % report_every + 1;
                let percent = format!("{:.1}%", 100.0 * loaded as f64 / total as f64);
                let overall_rate = rate(loaded as u64, now - started) / 1000.0;
                let current_rate = rate(interval as u64, now - last_report) / 1000.0;
                let overall = format!("{overall_rate:.1}k ops/sec");
                let current = format!("{current_rate:.1}k ops/sec");
                tracing::info!(loaded, total, %percent, %overall, %current, "preload progress");
                last_report = now;
            }
        }

        let report = PreloadReport {
            loaded,
            elapsed: started.elapsed(),
            complete: loaded == total,
        };
        if report.complete {
            tracing::info!(
                keys = report.loaded,
                elapsed = ?report.elapsed,
                ops_per_sec = report.ops_per_sec().round() as u64,
                "preload complete"
            );
        } else {
            tracing::warn!(loaded, total, "preload interrupted");
        }
        Ok(report)
    }
}
