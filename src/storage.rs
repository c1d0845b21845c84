use crate::state::{AlertRecord, MetricSample};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS system_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ts TEXT NOT NULL,
    cpu REAL NOT NULL,
    memory REAL NOT NULL,
    disk REAL NOT NULL,
    status TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS alerts_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ts TEXT NOT NULL,
    level TEXT NOT NULL,
    message TEXT NOT NULL
);
";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to open database {path}: {source}")]
    Open {
        path: String,
        source: rusqlite::Error,
    },
    #[error("failed to prepare schema in {path}: {source}")]
    Schema {
        path: String,
        source: rusqlite::Error,
    },
    #[error("failed to write to {table}: {source}")]
    Write {
        table: &'static str,
        source: rusqlite::Error,
    },
    #[error("failed to read from {table}: {source}")]
    Read {
        table: &'static str,
        source: rusqlite::Error,
    },
    #[error("failed to close database: {0}")]
    Close(rusqlite::Error),
}

/// Every insert commits before returning; a failure loses at most the
/// write in flight.
pub struct Store {
    conn: Connection,
    path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowCounts {
    pub samples: u64,
    pub alerts: u64,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let path_display = path.display().to_string();
        let mut conn = Connection::open(&path).map_err(|source| StorageError::Open {
            path: path_display.clone(),
            source,
        })?;

        let schema_err = |source| StorageError::Schema {
            path: path_display.clone(),
            source,
        };
        conn.pragma_update(None, "synchronous", "FULL")
            .map_err(schema_err)?;
        let tx = conn.transaction().map_err(schema_err)?;
        tx.execute_batch(SCHEMA).map_err(schema_err)?;
        tx.commit().map_err(schema_err)?;

        info!(path = %path.display(), "database ready");
        Ok(Self { conn, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append_sample(&mut self, sample: &MetricSample) -> Result<(), StorageError> {
        let write_err = |source| StorageError::Write {
            table: "system_log",
            source,
        };
        let tx = self.conn.transaction().map_err(write_err)?;
        tx.execute(
            "INSERT INTO system_log (ts, cpu, memory, disk, status) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                sample.timestamp,
                sample.cpu_percent,
                sample.memory_percent,
                sample.disk_percent,
                sample.status.as_str(),
            ],
        )
        .map_err(write_err)?;
        tx.commit().map_err(write_err)?;
        debug!(ts = %sample.timestamp, "sample committed");
        Ok(())
    }

    pub fn append_alert(&mut self, alert: &AlertRecord) -> Result<(), StorageError> {
        let write_err = |source| StorageError::Write {
            table: "alerts_log",
            source,
        };
        let tx = self.conn.transaction().map_err(write_err)?;
        tx.execute(
            "INSERT INTO alerts_log (ts, level, message) VALUES (?1, ?2, ?3)",
            params![alert.timestamp, alert.level.as_str(), alert.message],
        )
        .map_err(write_err)?;
        tx.commit().map_err(write_err)?;
        debug!(ts = %alert.timestamp, metric = %alert.metric, "alert committed");
        Ok(())
    }

    pub fn row_counts(&self) -> Result<RowCounts, StorageError> {
        Ok(RowCounts {
            samples: self.count("system_log")?,
            alerts: self.count("alerts_log")?,
        })
    }

    fn count(&self, table: &'static str) -> Result<u64, StorageError> {
        self.conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| n.max(0) as u64)
            .map_err(|source| StorageError::Read { table, source })
    }

    pub fn close(self) -> Result<(), StorageError> {
        self.conn
            .close()
            .map_err(|(_conn, err)| StorageError::Close(err))
    }
}
