//! Phases of a key-value benchmark run: connecting, preloading, warm-up,
//! the timed workload engine, and the matrix sweep that drives it.

pub mod aggregate;
pub mod client;
pub mod connect;
pub mod engine;
pub mod error;
pub mod harness;
pub mod matrix;
pub mod preload;
pub mod session;
pub mod target;
pub mod warmup;

#[cfg(test)]
mod mock;

pub use aggregate::{BenchRow, aggregate, percentile_us};
pub use client::{ClientError, Connector, KvConnection, RedisConnection, RedisConnector};
pub use connect::ConnectPolicy;
pub use engine::{WorkerResult, WorkloadConfig};
pub use error::{ConfigError, WorkloadError};
pub use harness::Harness;
pub use matrix::MatrixPlan;
pub use preload::PreloadReport;
pub use session::{BenchPlan, DEFAULT_REPORT_INTERVAL};
pub use target::{Operation, Target};
