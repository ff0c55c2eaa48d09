use std::net::IpAddr;
use std::time::Duration;

use ::time::{format_description::well_known, OffsetDateTime};
use tokio::time::Instant;

use crate::types::{PortResult, ScanReport};

/// When a scan started, on both the wall clock and the monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct ScanStart {
    pub wall: OffsetDateTime,
    pub instant: Instant,
}

impl ScanStart {
    pub fn now() -> Self {
        Self {
            wall: OffsetDateTime::now_utc(),
            instant: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.instant.elapsed()
    }
}

/// Merge per-port outcomes into the final report, ordered by port.
pub fn aggregate(
    mut results: Vec<PortResult>,
    host: &str,
    resolved_address: IpAddr,
    started: ScanStart,
    cancelled: bool,
) -> ScanReport {
    results.sort_unstable_by_key(|r| r.port);
    let open_count = results.iter().filter(|r| r.is_open()).count();

    ScanReport {
        host: host.to_string(),
        resolved_address,
        start_time: rfc3339(started.wall),
        total_duration: started.elapsed(),
        open_count,
        cancelled,
        results,
    }
}

fn rfc3339(t: OffsetDateTime) -> String {
    t.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PortState;
    use std::net::Ipv4Addr;

    fn result(port: u16, state: PortState) -> PortResult {
        PortResult {
            port,
            state,
            service: None,
            banner: None,
            error: None,
            probe_duration: Duration::from_millis(3),
        }
    }

    #[test]
    fn results_sorted_and_open_counted() {
        let shuffled = vec![
            result(443, PortState::Open),
            result(22, PortState::Closed),
            result(8080, PortState::Error),
            result(80, PortState::Open),
            result(21, PortState::TimedOut),
        ];
        let report = aggregate(
            shuffled,
            "localhost",
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            ScanStart::now(),
            false,
        );

        let ports: Vec<u16> = report.results.iter().map(|r| r.port).collect();
        assert_eq!(ports, vec![21, 22, 80, 443, 8080]);
        assert_eq!(report.open_count, 2);
        assert_eq!(report.open_ports().count(), 2);
        assert!(!report.cancelled);
        assert_eq!(report.host, "localhost");
    }

    #[test]
    fn start_time_is_rfc3339() {
        let started = ScanStart {
            wall: OffsetDateTime::UNIX_EPOCH,
            instant: Instant::now(),
        };
        let report = aggregate(Vec::new(), "h", IpAddr::V4(Ipv4Addr::LOCALHOST), started, true);
        assert_eq!(report.start_time, "1970-01-01T00:00:00Z");
        assert_eq!(report.open_count, 0);
        assert!(report.cancelled);
    }
}
