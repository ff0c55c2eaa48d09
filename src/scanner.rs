use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::lookup_host;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::SetupError;
use crate::ports::PortSet;
use crate::probe::{self, ProbeOptions};
use crate::report::{self, ScanStart};
use crate::services::ServiceTable;
use crate::types::{PortResult, ScanReport};

/// Upper bound on simultaneous probes regardless of the requested concurrency.
pub const MAX_CONCURRENCY: usize = 512;

/// Everything one scan needs. Immutable for the scan's lifetime.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub host: String,
    pub ports: PortSet,
    pub concurrency: usize,
    /// Per-connection timeout, also used for the banner read.
    pub timeout: Duration,
    pub grab_banner: bool,
}

impl ScanConfig {
    pub fn new(host: impl Into<String>, ports: PortSet) -> Self {
        Self {
            host: host.into(),
            ports,
            concurrency: 100,
            timeout: Duration::from_millis(500),
            grab_banner: false,
        }
    }

    /// Worker count actually used: the requested value clamped to [`MAX_CONCURRENCY`].
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.min(MAX_CONCURRENCY)
    }

    fn probe_options(&self) -> ProbeOptions {
        ProbeOptions {
            connect_timeout: self.timeout,
            banner_timeout: self.timeout,
            grab_banner: self.grab_banner,
        }
    }
}

/// Live counters an outer layer can poll while a scan runs.
#[derive(Clone, Debug, Default)]
pub struct ScanProgress {
    pub total: Arc<AtomicU64>,
    pub scanned_done: Arc<AtomicU64>,
    pub open_count: Arc<AtomicU64>,
}

impl ScanProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.scanned_done.load(Ordering::Relaxed),
            self.total.load(Ordering::Relaxed),
            self.open_count.load(Ordering::Relaxed),
        )
    }

    fn record(&self, result: &PortResult) {
        self.scanned_done.fetch_add(1, Ordering::Relaxed);
        if result.is_open() {
            self.open_count.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Scan `config.ports` on `config.host` with the well-known service table.
pub async fn run(config: ScanConfig) -> Result<ScanReport, SetupError> {
    run_with_cancel(config, CancellationToken::new()).await
}

/// Variant that accepts a `CancellationToken` to allow external cancellation.
pub async fn run_with_cancel(
    config: ScanConfig,
    cancel: CancellationToken,
) -> Result<ScanReport, SetupError> {
    run_with_progress(
        config,
        Arc::new(ServiceTable::well_known()),
        cancel,
        ScanProgress::new(),
    )
    .await
}

/// Full form: injected service table, cancellation and shared progress counters.
///
/// - Limits in-flight probes using a `Semaphore`.
/// - Stops dispatching as soon as `cancel` fires; probes already running finish normally.
/// - Waits for every dispatched probe before building the report.
pub async fn run_with_progress(
    config: ScanConfig,
    services: Arc<ServiceTable>,
    cancel: CancellationToken,
    progress: ScanProgress,
) -> Result<ScanReport, SetupError> {
    if config.concurrency == 0 {
        return Err(SetupError::InvalidConcurrency);
    }
    if config.timeout.is_zero() {
        return Err(SetupError::InvalidTimeout);
    }
    let ip = resolve_host(&config.host).await?;

    let concurrency = config.effective_concurrency();
    let opts = config.probe_options();
    let total = config.ports.len();
    progress.total.store(total as u64, Ordering::Relaxed);

    info!(
        host = %config.host,
        %ip,
        ports = total,
        concurrency,
        timeout_ms = config.timeout.as_millis() as u64,
        banner = config.grab_banner,
        "scan started"
    );

    let started = ScanStart::now();
    let sem = Arc::new(Semaphore::new(concurrency));
    let mut set = JoinSet::new();
    let mut results: Vec<PortResult> = Vec::with_capacity(total);
    let mut dispatched = 0usize;

    for port in config.ports.iter() {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = sem.clone().acquire_owned() => match permit {
                Ok(p) => p,
                Err(_) => break,
            },
        };
        // A permit and the cancellation may become ready together.
        if cancel.is_cancelled() {
            break;
        }

        let services = services.clone();
        let addr = SocketAddr::new(ip, port);
        set.spawn(async move {
            let _permit = permit; // keep permit until the probe completes
            probe::probe(addr, &opts, &services).await
        });
        dispatched += 1;

        while let Some(joined) = set.try_join_next() {
            collect(joined, &mut results, &progress);
        }
    }

    while let Some(joined) = set.join_next().await {
        collect(joined, &mut results, &progress);
    }

    let cancelled = dispatched < total;
    if cancelled {
        info!(dispatched, total, "scan cancelled before all ports were dispatched");
    }

    let report = report::aggregate(results, &config.host, ip, started, cancelled);
    info!(
        open = report.open_count,
        scanned = report.results.len(),
        elapsed_ms = report.total_duration.as_millis() as u64,
        "scan finished"
    );
    Ok(report)
}

fn collect(
    joined: Result<PortResult, tokio::task::JoinError>,
    results: &mut Vec<PortResult>,
    progress: &ScanProgress,
) {
    match joined {
        Ok(result) => {
            progress.record(&result);
            results.push(result);
        }
        Err(e) => warn!(error = %e, "probe task failed"),
    }
}

/// Resolve `host` once, preferring an IPv4 address.
pub async fn resolve_host(host: &str) -> Result<IpAddr, SetupError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    let resolve_err = |reason: String| SetupError::Resolve {
        host: host.to_string(),
        reason,
    };
    let addrs: Vec<IpAddr> = lookup_host((host, 0))
        .await
        .map_err(|e| resolve_err(e.to_string()))?
        .map(|sa| sa.ip())
        .collect();
    debug!(host, ?addrs, "resolved target");

    addrs
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| resolve_err("no addresses found".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports;
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn zero_concurrency_is_rejected() {
        let mut config = ScanConfig::new("127.0.0.1", ports::normalize("80").unwrap());
        config.concurrency = 0;
        assert_eq!(run(config).await.unwrap_err(), SetupError::InvalidConcurrency);
    }

    #[test]
    fn concurrency_is_clamped() {
        let mut config = ScanConfig::new("127.0.0.1", ports::normalize("80").unwrap());
        assert_eq!(config.effective_concurrency(), 100);
        config.concurrency = 10_000;
        assert_eq!(config.effective_concurrency(), MAX_CONCURRENCY);
        config.concurrency = MAX_CONCURRENCY;
        assert_eq!(config.effective_concurrency(), MAX_CONCURRENCY);
    }

    #[tokio::test]
    async fn zero_timeout_is_rejected() {
        let mut config = ScanConfig::new("127.0.0.1", ports::normalize("80").unwrap());
        config.timeout = Duration::ZERO;
        assert_eq!(run(config).await.unwrap_err(), SetupError::InvalidTimeout);
    }

    #[tokio::test]
    async fn literal_addresses_skip_dns() {
        assert_eq!(
            resolve_host("127.0.0.1").await.unwrap(),
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        );
        assert!(resolve_host("::1").await.unwrap().is_ipv6());
    }

    #[tokio::test]
    async fn unresolvable_host_is_setup_error() {
        let err = resolve_host("no-such-host.invalid").await.unwrap_err();
        assert!(matches!(err, SetupError::Resolve { .. }));
    }

    #[tokio::test]
    async fn pre_cancelled_scan_dispatches_nothing() {
        let config = ScanConfig::new("127.0.0.1", ports::normalize("1-10").unwrap());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = run_with_cancel(config, cancel).await.unwrap();
        assert!(report.cancelled);
        assert!(report.results.is_empty());
    }
}
