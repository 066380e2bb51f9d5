//! Scanner module: per-port probers and the coordinating engine

pub mod engine;
pub mod prober;

use crate::probe::{ProtocolLabel, Transport};
use serde::{Serialize, Serializer};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

pub use engine::{ResultStream, ScanEngine};
pub use prober::{Prober, TcpProber, UdpProber};

/// One `(host, port)` pair, consumed by exactly one prober invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanTarget {
    pub host: IpAddr,
    pub port: u16,
}

impl ScanTarget {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self { host, port }
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl std::fmt::Display for ScanTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// What a prober got out of one port: a label and the bytes behind it
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub label: ProtocolLabel,
    pub raw: Vec<u8>,
}

/// A classified port, as emitted on the result stream
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub port: u16,
    pub label: ProtocolLabel,
    pub transport: Transport,
    #[serde(serialize_with = "duration_ms")]
    pub response_time: Duration,
}

fn duration_ms<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// How a scan ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    /// Every target was dispatched and every worker finished
    Completed,
    /// The stream went quiet past the wait budget and the scan was cancelled
    Stalled,
    /// A fatal error aborted the scan
    Failed,
}

/// End-of-scan accounting for one transport
#[derive(Debug, Clone)]
pub struct ScanSummary {
    pub transport: Transport,
    pub results: Vec<ScanResult>,
    pub status: ScanStatus,
    pub duration: Duration,
}

impl ScanSummary {
    /// Ports that produced a classifiable response
    pub fn fingerprinted(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.label != ProtocolLabel::Unknown)
            .count()
    }
}
