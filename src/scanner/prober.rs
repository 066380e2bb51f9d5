//! Per-port probers
//!
//! One prober invocation walks the probe catalog for its transport against
//! a single `(host, port)` target. Every socket is opened fresh for one
//! probe and dropped before the next attempt, whatever the outcome.
//!
//! The two variants deliberately differ: TCP returns on the first
//! successful read even when the classification is the unknown sentinel;
//! UDP keeps probing through the whole catalog and reports the last
//! non-trivial label it saw.

use crate::error::ProbeFailure;
use crate::probe::classify::classify;
use crate::probe::{
    ProbeCatalog, ProtocolLabel, ProtocolProbe, Transport, TCP_READ_LIMIT, UDP_READ_LIMIT,
};
use crate::scanner::{ProbeOutcome, ScanTarget};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;

/// TCP prober: connect, send, short read, first answer wins
#[derive(Debug, Clone)]
pub struct TcpProber {
    catalog: Arc<ProbeCatalog>,
    timeout: Duration,
}

impl TcpProber {
    pub fn new(catalog: Arc<ProbeCatalog>, timeout: Duration) -> Self {
        Self { catalog, timeout }
    }

    /// Probe one port over TCP.
    ///
    /// Probes run in catalog order over fresh connections. Any transient
    /// failure falls through to the next probe; the first successful read
    /// classifies and returns immediately, remaining probes untried.
    pub async fn probe(&self, target: ScanTarget) -> crate::Result<Option<ProbeOutcome>> {
        for probe in self.catalog.probes_for(Transport::Tcp) {
            match self.attempt(target, probe).await {
                Ok(raw) => {
                    let label = classify(&raw, self.catalog.dns_id());
                    log::debug!("{} tcp probe '{}' answered: {}", target, probe.name, label);
                    return Ok(Some(ProbeOutcome { label, raw }));
                }
                Err(failure) if failure.is_fatal() => return Err(failure.into_fatal()),
                Err(failure) => {
                    log::debug!("{} tcp probe '{}' failed: {}", target, probe.name, failure);
                }
            }
        }
        Ok(None)
    }

    /// One connection, one payload, one short read
    async fn attempt(
        &self,
        target: ScanTarget,
        probe: &ProtocolProbe,
    ) -> Result<Vec<u8>, ProbeFailure> {
        let mut stream = timeout(self.timeout, TcpStream::connect(target.addr()))
            .await
            .map_err(|_| ProbeFailure::Timeout)?
            .map_err(ProbeFailure::from_io)?;

        stream
            .write_all(&probe.payload)
            .await
            .map_err(ProbeFailure::from_io)?;

        let mut buf = [0u8; TCP_READ_LIMIT];
        let n = timeout(self.timeout, stream.read(&mut buf))
            .await
            .map_err(|_| ProbeFailure::Timeout)?
            .map_err(ProbeFailure::from_io)?;

        Ok(buf[..n].to_vec())
    }
}

/// UDP prober: send to every probe, last non-trivial label wins
#[derive(Debug, Clone)]
pub struct UdpProber {
    catalog: Arc<ProbeCatalog>,
    timeout: Duration,
}

impl UdpProber {
    pub fn new(catalog: Arc<ProbeCatalog>, timeout: Duration) -> Self {
        Self { catalog, timeout }
    }

    /// Probe one port over UDP.
    ///
    /// Every probe in the catalog is sent regardless of earlier replies;
    /// each received datagram overwrites the recorded outcome. The port
    /// only counts when the final recorded label is not the unknown
    /// sentinel.
    pub async fn probe(&self, target: ScanTarget) -> crate::Result<Option<ProbeOutcome>> {
        let mut recorded: Option<ProbeOutcome> = None;

        for probe in self.catalog.probes_for(Transport::Udp) {
            match self.attempt(target, probe).await {
                Ok(raw) => {
                    let label = classify(&raw, self.catalog.dns_id());
                    log::debug!("{} udp probe '{}' answered: {}", target, probe.name, label);
                    recorded = Some(ProbeOutcome { label, raw });
                }
                Err(failure) if failure.is_fatal() => return Err(failure.into_fatal()),
                Err(failure) => {
                    log::debug!("{} udp probe '{}' failed: {}", target, probe.name, failure);
                }
            }
        }

        Ok(recorded.filter(|outcome| outcome.label != ProtocolLabel::Unknown))
    }

    /// One ephemeral socket, one datagram, one receive
    async fn attempt(
        &self,
        target: ScanTarget,
        probe: &ProtocolProbe,
    ) -> Result<Vec<u8>, ProbeFailure> {
        let socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))
            .await
            .map_err(ProbeFailure::from_io)?;

        socket
            .send_to(&probe.payload, target.addr())
            .await
            .map_err(ProbeFailure::from_io)?;

        let mut buf = [0u8; UDP_READ_LIMIT];
        let (n, _) = timeout(self.timeout, socket.recv_from(&mut buf))
            .await
            .map_err(|_| ProbeFailure::Timeout)?
            .map_err(ProbeFailure::from_io)?;

        Ok(buf[..n].to_vec())
    }
}

/// Transport-dispatching wrapper so the engine holds one prober type
#[derive(Debug, Clone)]
pub enum Prober {
    Tcp(TcpProber),
    Udp(UdpProber),
}

impl Prober {
    pub fn new(transport: Transport, catalog: Arc<ProbeCatalog>, timeout: Duration) -> Self {
        match transport {
            Transport::Tcp => Prober::Tcp(TcpProber::new(catalog, timeout)),
            Transport::Udp => Prober::Udp(UdpProber::new(catalog, timeout)),
        }
    }

    pub async fn probe(&self, target: ScanTarget) -> crate::Result<Option<ProbeOutcome>> {
        match self {
            Prober::Tcp(prober) => prober.probe(target).await,
            Prober::Udp(prober) => prober.probe(target).await,
        }
    }
}
