use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Outcome of a single connect attempt.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PortState {
    /// The connection was accepted.
    Open,
    /// The host actively refused the connection.
    Closed,
    /// The OS gave up on the handshake before our deadline; no reply was seen.
    Filtered,
    /// Our connect deadline expired without a connect or a refusal.
    TimedOut,
    /// Any other transport failure. The cause is in [`PortResult::error`].
    Error,
}

impl PortState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortState::Open => "open",
            PortState::Closed => "closed",
            PortState::Filtered => "filtered",
            PortState::TimedOut => "timed_out",
            PortState::Error => "error",
        }
    }
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One port's probe outcome.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PortResult {
    pub port: u16,
    pub state: PortState,
    pub service: Option<String>,
    pub banner: Option<String>,
    pub error: Option<String>,
    #[serde(rename = "probe_ms", with = "duration_ms")]
    pub probe_duration: Duration,
}

impl PortResult {
    pub fn is_open(&self) -> bool {
        self.state == PortState::Open
    }
}

/// Final, port-ordered report of one scan.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub host: String,
    pub resolved_address: IpAddr,
    /// RFC 3339 UTC timestamp of when the scan started.
    pub start_time: String,
    #[serde(rename = "total_ms", with = "duration_ms")]
    pub total_duration: Duration,
    pub open_count: usize,
    /// Set when cancellation stopped dispatch before every port was probed.
    pub cancelled: bool,
    pub results: Vec<PortResult>,
}

impl ScanReport {
    pub fn open_ports(&self) -> impl Iterator<Item = &PortResult> {
        self.results.iter().filter(|r| r.is_open())
    }
}

/// Serialize a `Duration` as whole milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis().min(u128::from(u64::MAX)) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
