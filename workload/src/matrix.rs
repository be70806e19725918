use std::{sync::Arc, time::Duration};

use key_space::KeySpace;

use crate::{
    aggregate::BenchRow,
    client::Connector,
    engine::WorkloadConfig,
    error::{ConfigError, WorkloadError},
    harness::Harness,
    target::{Operation, Target},
};

/// The dimensions swept by a run. Cells are visited value size first, then
/// client count, then operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixPlan {
    pub value_sizes: Vec<usize>,
    pub client_counts: Vec<usize>,
    pub operations: Vec<Operation>,
    pub duration: Duration,
}

impl MatrixPlan {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.value_sizes.is_empty() {
            return Err(ConfigError::EmptyList("value size"));
        }
        if self.client_counts.is_empty() {
            return Err(ConfigError::EmptyList("client count"));
        }
        if self.operations.is_empty() {
            return Err(ConfigError::EmptyList("operation"));
        }
        if self.value_sizes.contains(&0) {
            return Err(ConfigError::Zero("value size"));
        }
        if self.client_counts.contains(&0) {
            return Err(ConfigError::Zero("client count"));
        }
        if self.duration.is_zero() {
            return Err(ConfigError::Zero("duration"));
        }
        Ok(())
    }

    pub fn max_value_size(&self) -> Option<usize> {
        self.value_sizes.iter().copied().max()
    }

    pub fn cells(&self, target: &Target, keys: &Arc<KeySpace>) -> Vec<WorkloadConfig> {
        let mut cells = Vec::with_capacity(
            self.value_sizes.len() * self.client_counts.len() * self.operations.len(),
        );
        for &value_size in &self.value_sizes {
            for &concurrency in &self.client_counts {
                for &operation in &self.operations {
                    cells.push(WorkloadConfig {
                        target: target.clone(),
                        operation,
                        keys: keys.clone(),
                        value_size,
                        duration: self.duration,
                        concurrency,
                        seed: operation.base_seed(),
                    });
                }
            }
        }
        cells
    }
}

impl<C: Connector> Harness<C> {
    /// Runs every cell in order, one at a time. An interrupt stops the sweep;
    /// rows of finished cells are kept and the interrupted cell is dropped.
    pub async fn run_matrix(
        &self,
        target: &Target,
        plan: &MatrixPlan,
        keys: Arc<KeySpace>,
    ) -> Result<Vec<BenchRow>, WorkloadError> {
        let cells = plan.cells(target, &keys);
        let total = cells.len();
        let mut rows = Vec::with_capacity(total);

        for (index, cell) in cells.into_iter().enumerate() {
            if self.is_cancelled() {
                tracing::warn!(done = index, total, "sweep interrupted");
                break;
            }
            tracing::info!(
                cell = index + 1,
                total,
                op = %cell.operation,
                clients = cell.concurrency,
                value_size = cell.value_size,
                duration = ?cell.duration,
                "running cell"
            );

            let row = self.run(cell).await?;
            if self.is_cancelled() {
                tracing::warn!(done = index, total, "sweep interrupted, discarding partial cell");
                break;
            }

            let ops_per_sec = format!("{:.2}", row.ops_per_sec);
            let p50 = format!("{:.3}us", row.p50_us);
            let p95 = format!("{:.3}us", row.p95_us);
            let p99 = format!("{:.3}us", row.p99_us);
            tracing::info!(
                ops = row.total_ops,
                errors = row.errors,
                %ops_per_sec,
                %p50,
                %p95,
                %p99,
                "cell done"
            );
            rows.push(row);
        }

        Ok(rows)
    }
}
