use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{self, Instant};
use tracing::{debug, trace};

use crate::services::ServiceTable;
use crate::types::{PortResult, PortState};

/// Largest banner kept from a single read.
pub const MAX_BANNER_BYTES: usize = 1024;

/// Ports whose services wait for the client to speak first.
const HTTP_PORTS: &[u16] = &[80, 8000, 8080];
const HTTP_HEAD: &[u8] = b"HEAD / HTTP/1.0\r\nHost: localhost\r\n\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOptions {
    pub connect_timeout: Duration,
    pub banner_timeout: Duration,
    pub grab_banner: bool,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(500),
            banner_timeout: Duration::from_millis(500),
            grab_banner: false,
        }
    }
}

/// Probe one port: a single bounded connect, then an optional bounded banner read.
///
/// Never fails; every transport problem ends up as a [`PortState`] on the result.
/// The stream is dropped before returning on every path.
pub async fn probe(addr: SocketAddr, opts: &ProbeOptions, services: &ServiceTable) -> PortResult {
    let start = Instant::now();
    let port = addr.port();

    let (state, banner, error) = match time::timeout(opts.connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(mut stream)) => {
            let banner = if opts.grab_banner {
                grab_banner(&mut stream, banner_request(port), opts.banner_timeout).await
            } else {
                None
            };
            (PortState::Open, banner, None)
        }
        Ok(Err(e)) => {
            let (state, error) = classify_connect_error(&e);
            (state, None, error)
        }
        Err(_) => (PortState::TimedOut, None, None),
    };

    let probe_duration = start.elapsed();
    debug!(%addr, %state, elapsed_ms = probe_duration.as_millis() as u64, "probe finished");

    PortResult {
        port,
        state,
        service: services.lookup(port).map(str::to_string),
        banner,
        error,
        probe_duration,
    }
}

fn classify_connect_error(e: &io::Error) -> (PortState, Option<String>) {
    match e.kind() {
        io::ErrorKind::ConnectionRefused => (PortState::Closed, None),
        io::ErrorKind::TimedOut => (PortState::Filtered, None),
        _ => (PortState::Error, Some(e.to_string())),
    }
}

/// Request written before the banner read, for services that wait for the client.
fn banner_request(port: u16) -> Option<&'static [u8]> {
    HTTP_PORTS.contains(&port).then_some(HTTP_HEAD)
}

/// Optional request write, then one read of up to [`MAX_BANNER_BYTES`], lossily
/// decoded and trimmed. Both steps share a single deadline of `timeout`.
async fn grab_banner(stream: &mut TcpStream, request: Option<&[u8]>, timeout: Duration) -> Option<String> {
    let deadline = Instant::now() + timeout;

    if let Some(request) = request {
        match time::timeout_at(deadline, stream.write_all(request)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => trace!(error = %e, "banner request write failed"),
            Err(_) => return None,
        }
    }

    let mut buf = vec![0u8; MAX_BANNER_BYTES];
    match time::timeout_at(deadline, stream.read(&mut buf)).await {
        Ok(Ok(n)) if n > 0 => {
            buf.truncate(n);
            let text = String::from_utf8_lossy(&buf);
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        Ok(Err(e)) => {
            trace!(error = %e, "banner read failed");
            None
        }
        _ => None,
    }
}
