mod sink;

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use key_space::KeyMode;
use sink::CsvSink;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use workload::{
    BenchPlan, BenchRow, DEFAULT_REPORT_INTERVAL, Harness, MatrixPlan, Operation, RedisConnector,
    Target,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Throughput and tail-latency sweeps against a Redis-protocol key-value server",
    long_about = None
)]
struct Cli {
    /// Server label written to every result row
    #[arg(long, default_value = "redis")]
    name: String,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 6379)]
    port: u16,

    /// Number of keys to build and preload
    #[arg(long, default_value_t = 1_000_000)]
    keys: u64,

    /// `sequential` (key:1..=N) or `decimal` (key:<i mod 2^31>)
    #[arg(long, default_value = "sequential")]
    key_mode: KeyMode,

    /// Value sizes in bytes
    #[arg(long, value_delimiter = ',', default_value = "64,256,1024")]
    values: Vec<usize>,

    /// Client counts
    #[arg(long, value_delimiter = ',', default_value = "16,32,64")]
    clients: Vec<usize>,

    #[arg(long, value_delimiter = ',', default_value = "get,set")]
    ops: Vec<Operation>,

    /// Seconds per matrix cell
    #[arg(long, default_value_t = 30)]
    duration: u64,

    #[arg(long, default_value_t = 10)]
    warmup_sec: u64,

    #[arg(long, default_value = "results.csv")]
    out: PathBuf,

    #[arg(long)]
    skip_preload: bool,

    /// Keys between preload progress lines
    #[arg(long, default_value_t = DEFAULT_REPORT_INTERVAL)]
    report_interval: usize,
}

impl Cli {
    fn plan(&self) -> BenchPlan {
        BenchPlan {
            target: Target::new(self.name.clone(), self.host.clone(), self.port),
            key_count: self.keys,
            key_mode: self.key_mode,
            matrix: MatrixPlan {
                value_sizes: self.values.clone(),
                client_counts: self.clients.clone(),
                operations: self.ops.clone(),
                duration: Duration::from_secs(self.duration),
            },
            warmup: Duration::from_secs(self.warmup_sec),
            skip_preload: self.skip_preload,
            report_interval: self.report_interval,
        }
    }
}

fn print_summary(rows: &[BenchRow]) {
    println!("\n=== Benchmark Summary ===");
    println!(
        "{:<5} {:>8} {:>10} {:>14} {:>10} {:>10} {:>10}",
        "op", "clients", "value", "ops/sec", "p50 us", "p95 us", "p99 us"
    );
    for row in rows {
        println!(
            "{:<5} {:>8} {:>10} {:>14.2} {:>10.3} {:>10.3} {:>10.3}",
            row.operation,
            row.clients,
            row.value_size,
            row.ops_per_sec,
            row.p50_us,
            row.p95_us,
            row.p99_us
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let plan = cli.plan();
    plan.validate()?;
    let mut sink = CsvSink::create(&cli.out)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current step");
            on_interrupt.cancel();
        }
    });

    tracing::info!(
        name = %plan.target.name,
        target = %plan.target,
        out = %sink.path().display(),
        "starting benchmark"
    );
    let harness = Harness::new(RedisConnector, cancel);
    let rows = harness.run_plan(&plan).await?;

    sink.write_rows(&rows)?;
    tracing::info!(rows = rows.len(), out = %sink.path().display(), "results written");
    print_summary(&rows);

    Ok(())
}
