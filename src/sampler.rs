use crate::collectors::{CollectError, MetricsSource};
use crate::config::Config;
use crate::state::{apply_threshold_rules, MetricSample, TIMESTAMP_FORMAT};
use crate::storage::{StorageError, Store};
use chrono::Local;
use std::io::Write;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("failed to collect host metrics: {0}")]
    Collect(#[from] CollectError),
    #[error("failed to write report: {0}")]
    Report(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { samples: u32 },
    Interrupted { samples: u32 },
}

// Shutdown is only observed while waiting on the host or sleeping; writes
// never sit inside a select.
pub async fn run<S, W>(
    cfg: &Config,
    source: &mut S,
    store: &mut Store,
    out: &mut W,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<RunOutcome, RunError>
where
    S: MetricsSource,
    W: Write,
{
    let interval = Duration::from_secs(cfg.interval_secs);
    let mut stored = 0_u32;

    for i in 1..=cfg.samples {
        if *shutdown.borrow() {
            return Ok(RunOutcome::Interrupted { samples: stored });
        }

        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let readings = tokio::select! {
            biased;
            Ok(()) = shutdown.changed() => {
                info!(iteration = i, "shutdown requested during collection");
                return Ok(RunOutcome::Interrupted { samples: stored });
            }
            readings = source.read() => readings?,
        };

        let sample = MetricSample::new(timestamp, readings);
        store.append_sample(&sample)?;
        stored += 1;
        debug!(iteration = i, total = cfg.samples, ts = %sample.timestamp, "sample stored");

        write!(out, "{}", report_line(&sample))?;
        for alert in apply_threshold_rules(&sample, &cfg.thresholds) {
            write!(out, " ⚠️ ALERT: {}", alert.message)?;
            warn!(
                metric = %alert.metric,
                value = sample.value(alert.metric),
                limit = cfg.thresholds.limit(alert.metric),
                "threshold exceeded"
            );
            store.append_alert(&alert)?;
        }
        writeln!(out)?;
        out.flush()?;

        if i < cfg.samples {
            tokio::select! {
                biased;
                Ok(()) = shutdown.changed() => {
                    info!(iteration = i, "shutdown requested during pause");
                    return Ok(RunOutcome::Interrupted { samples: stored });
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    if *shutdown.borrow() {
        info!(samples = stored, "shutdown requested during the last iteration");
        return Ok(RunOutcome::Interrupted { samples: stored });
    }
    Ok(RunOutcome::Completed { samples: stored })
}

fn report_line(sample: &MetricSample) -> String {
    format!(
        "Logged: ('{}', {:.1}, {:.1}, {:.1}, '{}')",
        sample.timestamp,
        sample.cpu_percent,
        sample.memory_percent,
        sample.disk_percent,
        sample.status.as_str()
    )
}
