pub mod system;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Readings {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
}

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("no CPUs reported by the host")]
    NoCpus,
    #[error("total memory reported as zero")]
    MemoryUnavailable,
    #[error("no mounted filesystem at {mount}")]
    DiskNotFound { mount: String },
    #[error("failed to stat filesystem at {mount}: {source}")]
    DiskStat {
        mount: String,
        source: std::io::Error,
    },
}

/// `read` is raced against shutdown and may be dropped mid-way.
pub trait MetricsSource {
    async fn read(&mut self) -> Result<Readings, CollectError>;
}
