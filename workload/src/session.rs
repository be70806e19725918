use std::{sync::Arc, time::Duration};

use key_space::{KeyMode, KeySpace};

use crate::{
    aggregate::BenchRow,
    client::Connector,
    error::{ConfigError, WorkloadError},
    harness::Harness,
    matrix::MatrixPlan,
    target::Target,
};

pub const DEFAULT_REPORT_INTERVAL: usize = 50_000;

/// A full run against one target: preload, warm-up, then the matrix sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchPlan {
    pub target: Target,
    pub key_count: u64,
    pub key_mode: KeyMode,
    pub matrix: MatrixPlan,
    pub warmup: Duration,
    pub skip_preload: bool,
    pub report_interval: usize,
}

impl BenchPlan {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_count == 0 {
            return Err(ConfigError::NoKeys);
        }
        if self.report_interval == 0 {
            return Err(ConfigError::Zero("report interval"));
        }
        self.matrix.validate()
    }
}

impl<C: Connector> Harness<C> {
    /// Runs every phase of `plan` in order and returns the collected rows.
    /// Configuration and setup failures abort before any measurement; an
    /// interrupt returns whatever rows were finished.
    pub async fn run_plan(&self, plan: &BenchPlan) -> Result<Vec<BenchRow>, WorkloadError> {
        plan.validate()?;
        let keys = Arc::new(KeySpace::build(plan.key_count, plan.key_mode)?);
        tracing::info!(
            keys = keys.len(),
            mode = %plan.key_mode,
            "key space built"
        );

        self.probe(&plan.target).await?;

        if plan.skip_preload {
            tracing::info!("preload skipped");
        } else if let Some(value_size) = plan.matrix.max_value_size() {
            let report = self
                .preload(&plan.target, &keys, value_size, plan.report_interval)
                .await?;
            if !report.complete {
                return Ok(Vec::new());
            }
        }

        if self.is_cancelled() {
            return Ok(Vec::new());
        }
        if !plan.warmup.is_zero() {
            self.warmup(&plan.target, keys.clone(), plan.warmup).await;
        }

        self.run_matrix(&plan.target, &plan.matrix, keys).await
    }
}
