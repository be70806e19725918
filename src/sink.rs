use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use thiserror::Error;
use workload::BenchRow;

pub const HEADER: &str = concat!(
    "server,host,port,op,key_dist,clients,value_size,seconds,ops,",
    "ops_per_sec,ops_per_sec_per_client,errors,p50_us,p95_us,p99_us\n",
);

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("output path is empty")]
    EmptyPath,

    #[error("Could not create {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result file, one line per matrix cell.
pub struct CsvSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl CsvSink {
    /// Creates (or truncates) the file and writes the header.
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        if path.as_os_str().is_empty() {
            return Err(SinkError::EmptyPath);
        }
        let file = File::create(path).map_err(|source| SinkError::Create {
            path: path.to_path_buf(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        writer.write_all(HEADER.as_bytes())?;
        writer.flush()?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_row(&mut self, row: &BenchRow) -> Result<(), SinkError> {
        writeln!(
            self.writer,
            "{},{},{},{},{},{},{},{},{},{:.2},{:.2},{},{:.3},{:.3},{:.3}",
            escape(&row.target.name),
            escape(&row.target.host),
            row.target.port,
            row.operation,
            row.key_mode.label(),
            row.clients,
            row.value_size,
            row.duration.as_secs(),
            row.total_ops,
            row.ops_per_sec,
            row.ops_per_sec_per_client,
            row.errors,
            row.p50_us,
            row.p95_us,
            row.p99_us,
        )?;
        Ok(())
    }

    pub fn write_rows(&mut self, rows: &[BenchRow]) -> Result<(), SinkError> {
        for row in rows {
            self.write_row(row)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
