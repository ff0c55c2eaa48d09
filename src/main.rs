use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use port_probe_rs::output;
use port_probe_rs::ports::{self, PortSet};
use port_probe_rs::scanner::{self, ScanConfig, ScanProgress};
use port_probe_rs::services::ServiceTable;

/// port-probe-rs — concurrent TCP reachability probe with optional banner grabbing.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "port-probe-rs",
    version,
    about = "Concurrent TCP reachability probe with optional banner grabbing. Only scan hosts you are authorized to test.",
    long_about = None
)]
struct Cli {
    /// Target hostname or IP address.
    target: String,

    /// Comma-separated ports or ranges (e.g. 22,80,8000-8100). Overrides --start/--end.
    #[arg(long)]
    ports: Option<String>,

    /// First port of the range scanned when --ports is not given.
    #[arg(long, default_value_t = 1)]
    start: u32,

    /// Last port of the range scanned when --ports is not given.
    #[arg(long, default_value_t = 1024)]
    end: u32,

    /// Max concurrent connection attempts.
    #[arg(long, default_value_t = 100)]
    threads: usize,

    /// Per-connection timeout in seconds.
    #[arg(long, default_value_t = 0.5)]
    timeout: f64,

    /// Read an initial banner from open ports.
    #[arg(long, default_value_t = false)]
    banner: bool,

    /// Save the report to this path (.csv for CSV, anything else for JSON).
    #[arg(long)]
    output: Option<PathBuf>,

    /// List closed, filtered and failed ports too, not only open ones.
    #[arg(long, default_value_t = false)]
    all: bool,

    /// Verbose progress output.
    #[arg(long, short, default_value_t = false)]
    verbose: bool,
}

impl Cli {
    fn port_set(&self) -> Result<PortSet> {
        match self.ports.as_deref() {
            Some(spec) => ports::normalize(spec).with_context(|| format!("invalid --ports {spec:?}")),
            None => ports::range(self.start, self.end)
                .with_context(|| format!("invalid --start/--end {}-{}", self.start, self.end)),
        }
    }

    fn timeout(&self) -> Result<Duration> {
        let t = Duration::try_from_secs_f64(self.timeout)
            .with_context(|| format!("invalid --timeout {}", self.timeout))?;
        anyhow::ensure!(!t.is_zero(), "invalid --timeout {}: must be greater than zero", self.timeout);
        Ok(t)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let ports = cli.port_set()?;
    let mut config = ScanConfig::new(cli.target.clone(), ports);
    config.concurrency = cli.threads;
    config.timeout = cli.timeout()?;
    config.grab_banner = cli.banner;

    if config.effective_concurrency() < config.concurrency {
        warn!(
            requested = config.concurrency,
            max = scanner::MAX_CONCURRENCY,
            "thread count clamped"
        );
    }
    info!(
        target = %config.host,
        ports = %config.ports,
        threads = config.concurrency,
        timeout_s = cli.timeout,
        banner = config.grab_banner,
        "configuration"
    );

    // Ctrl-C stops dispatching; in-flight probes run to their own timeout.
    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted, waiting for in-flight probes...");
            cancel_ctrlc.cancel();
        }
    });

    let progress = ScanProgress::new();
    let ticker = cli.verbose.then(|| spawn_progress_ticker(progress.clone()));

    let report = scanner::run_with_progress(
        config,
        Arc::new(ServiceTable::well_known()),
        cancel,
        progress,
    )
    .await
    .with_context(|| format!("scan of {} failed", cli.target))?;

    if let Some(t) = ticker {
        t.abort();
    }

    output::print_report(&report, cli.all);

    if let Some(path) = cli.output.as_deref() {
        output::write_report(path, &report)?;
        println!("Report saved to {}", path.display());
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "port_probe_rs=debug" } else { "port_probe_rs=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn spawn_progress_ticker(progress: ScanProgress) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        interval.tick().await;
        loop {
            interval.tick().await;
            let (done, total, open) = progress.snapshot();
            eprintln!("Progress: {done}/{total} ports scanned, {open} open");
        }
    })
}
