use crate::collectors::Readings;
use crate::config::ThresholdConfig;
use std::fmt;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleStatus {
    Up,
}

impl SampleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SampleStatus::Up => "UP",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Warning,
}

impl AlertLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertLevel::Warning => "WARNING",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Cpu,
    Memory,
    Disk,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Cpu, Metric::Memory, Metric::Disk];

    fn describe(self, value: f64) -> String {
        match self {
            Metric::Cpu => format!("High CPU usage! ({value:.1}%)"),
            Metric::Memory => format!("High Memory usage! ({value:.1}%)"),
            Metric::Disk => format!("Low Disk Space! ({value:.1}%)"),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Metric::Cpu => "cpu",
            Metric::Memory => "memory",
            Metric::Disk => "disk",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub timestamp: String,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub status: SampleStatus,
}

impl MetricSample {
    pub fn new(timestamp: String, readings: Readings) -> Self {
        Self {
            timestamp,
            cpu_percent: readings.cpu_percent,
            memory_percent: readings.memory_percent,
            disk_percent: readings.disk_percent,
            status: SampleStatus::Up,
        }
    }

    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Cpu => self.cpu_percent,
            Metric::Memory => self.memory_percent,
            Metric::Disk => self.disk_percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertRecord {
    pub timestamp: String,
    pub level: AlertLevel,
    pub metric: Metric,
    pub message: String,
}

impl ThresholdConfig {
    pub fn limit(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Cpu => self.cpu_percent,
            Metric::Memory => self.memory_percent,
            Metric::Disk => self.disk_percent,
        }
    }
}

pub fn apply_threshold_rules(
    sample: &MetricSample,
    thresholds: &ThresholdConfig,
) -> Vec<AlertRecord> {
    Metric::ALL
        .iter()
        .copied()
        .filter(|metric| sample.value(*metric) > thresholds.limit(*metric))
        .map(|metric| AlertRecord {
            timestamp: sample.timestamp.clone(),
            level: AlertLevel::Warning,
            metric,
            message: metric.describe(sample.value(metric)),
        })
        .collect()
}
