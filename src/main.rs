mod collectors;
mod config;
mod sampler;
mod state;
mod storage;

use clap::Parser;
use collectors::system::SystemSource;
use config::{Config, ConfigError};
use sampler::{RunError, RunOutcome};
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use storage::Store;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "resmon")]
#[command(version)]
struct Cli {
    /// YAML config file; built-in defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    database: Option<PathBuf>,
    #[arg(long)]
    samples: Option<u32>,
    #[arg(long)]
    print_default_config: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let cfg = match load_config(&cli) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    info!(
        database = %cfg.database_path.display(),
        samples = cfg.samples,
        interval_secs = cfg.interval_secs,
        cpu_threshold = cfg.thresholds.cpu_percent,
        memory_threshold = cfg.thresholds.memory_percent,
        disk_threshold = cfg.thresholds.disk_percent,
        "starting resmon"
    );

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let signal_task = match install_interrupt_handler(shutdown_tx) {
        Ok(task) => Some(task),
        Err(err) => {
            error!(error = %err, "failed to listen for Ctrl+C");
            None
        }
    };

    let mut store = match Store::open(&cfg.database_path) {
        Ok(store) => store,
        Err(err) => {
            error!(error = %err, "failed to initialise storage");
            std::process::exit(1);
        }
    };

    println!("Starting resource monitor (threshold alerts). Press Ctrl+C to stop.\n");

    let started = Instant::now();
    let mut source = SystemSource::new(&cfg.disk_mount);
    let mut stdout = std::io::stdout();
    let result = sampler::run(&cfg, &mut source, &mut store, &mut stdout, &mut shutdown_rx).await;
    if let Some(task) = signal_task {
        task.abort();
    }

    let elapsed = Duration::from_secs(started.elapsed().as_secs());
    if finish(result, store, elapsed, &mut stdout) {
        std::process::exit(1);
    }
}

/// Reports how the run ended and releases the store. Returns true when the
/// process should exit with a failure status.
fn finish<W: Write>(
    result: Result<RunOutcome, RunError>,
    store: Store,
    elapsed: Duration,
    out: &mut W,
) -> bool {
    let mut failed = false;
    match result {
        Ok(RunOutcome::Completed { samples }) => info!(samples, "run completed"),
        Ok(RunOutcome::Interrupted { samples }) => {
            if let Err(err) = writeln!(out, "\nInterrupted by user.") {
                warn!(error = %err, "failed to write interrupt notice");
            }
            info!(samples, "run interrupted");
        }
        Err(err) => {
            error!(error = %err, "run aborted");
            failed = true;
        }
    }

    match store.row_counts() {
        Ok(counts) => info!(
            total_samples = counts.samples,
            total_alerts = counts.alerts,
            elapsed = %humantime::format_duration(elapsed),
            "database totals"
        ),
        Err(err) => warn!(error = %err, "failed to count stored rows"),
    }

    let location = store.path().display().to_string();
    if let Err(err) = store.close() {
        error!(error = %err, "failed to close database");
        failed = true;
    }
    if let Err(err) = writeln!(out, "\nDone. Records saved to {location}") {
        warn!(error = %err, "failed to write shutdown line");
    }
    failed
}

// The handler is registered before returning, so an interrupt that lands
// before the task is first polled is still delivered.
#[cfg(unix)]
fn install_interrupt_handler(shutdown: watch::Sender<bool>) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    Ok(tokio::spawn(async move {
        if interrupt.recv().await.is_some() {
            let _ = shutdown.send(true);
        }
    }))
}

#[cfg(not(unix))]
fn install_interrupt_handler(shutdown: watch::Sender<bool>) -> std::io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = shutdown.send(true);
            }
            Err(err) => error!(error = %err, "failed to listen for Ctrl+C"),
        }
    }))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config, ConfigError> {
    let mut cfg = match &cli.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };
    if let Some(database) = &cli.database {
        cfg.database_path = database.clone();
    }
    if let Some(samples) = cli.samples {
        cfg.samples = samples;
    }
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_apply_on_top_of_defaults() {
        let cli = Cli::parse_from(["resmon", "--database", "/tmp/other.db", "--samples", "2"]);
        let cfg = load_config(&cli).expect("overrides must validate");
        assert_eq!(cfg.database_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(cfg.samples, 2);
        assert_eq!(cfg.interval_secs, 10);
    }

    #[test]
    fn invalid_override_is_rejected() {
        let cli = Cli::parse_from(["resmon", "--samples", "0"]);
        assert!(matches!(load_config(&cli), Err(ConfigError::Validation(_))));
    }

    fn finish_with(result: Result<RunOutcome, RunError>) -> (bool, String, PathBuf, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.db");
        let store = Store::open(&path).unwrap();
        let mut out = Vec::new();
        let failed = finish(result, store, Duration::from_secs(40), &mut out);
        (failed, String::from_utf8(out).unwrap(), path, dir)
    }

    #[test]
    fn completed_run_prints_done_only() {
        let (failed, out, path, _dir) = finish_with(Ok(RunOutcome::Completed { samples: 5 }));
        assert!(!failed);
        assert_eq!(out, format!("\nDone. Records saved to {}\n", path.display()));
    }

    #[test]
    fn interrupted_run_prints_notice_then_done() {
        let (failed, out, path, _dir) = finish_with(Ok(RunOutcome::Interrupted { samples: 2 }));
        assert!(!failed);
        assert_eq!(
            out,
            format!(
                "\nInterrupted by user.\n\nDone. Records saved to {}\n",
                path.display()
            )
        );
    }

    #[test]
    fn failed_run_still_closes_and_reports_location() {
        let (failed, out, path, _dir) =
            finish_with(Err(RunError::Collect(collectors::CollectError::NoCpus)));
        assert!(failed);
        assert!(!out.contains("Interrupted by user."));
        assert!(out.ends_with(&format!("Done. Records saved to {}\n", path.display())));

        let reopened = Store::open(&path).unwrap();
        assert_eq!(
            reopened.row_counts().unwrap(),
            storage::RowCounts { samples: 0, alerts: 0 }
        );
        reopened.close().unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn interrupt_raised_before_first_poll_sets_shutdown() {
        use nix::sys::signal::{raise, Signal};

        let (tx, mut rx) = watch::channel(false);
        let task = install_interrupt_handler(tx).unwrap();
        raise(Signal::SIGINT).unwrap();

        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .expect("interrupt must be delivered")
            .unwrap();
        assert!(*rx.borrow());
        task.abort();
    }
}
