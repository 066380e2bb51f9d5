//! Probe payload catalog and protocol labels

pub mod classify;

use serde::{Deserialize, Serialize};

/// Delivery mode for a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Tcp,
    Udp,
}

impl Transport {
    /// Tag used on reported result lines
    pub fn name(&self) -> &'static str {
        match self {
            Transport::Tcp => "TCP",
            Transport::Udp => "UDP",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Tcp => "tcp",
            Transport::Udp => "udp",
        }
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Labels the classifier can assign to a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolLabel {
    Http,
    Smtp,
    Dns,
    Pop3,
    Ntp,
    Unknown,
}

impl ProtocolLabel {
    /// `Unknown` renders as the `...` sentinel on result lines
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolLabel::Http => "http",
            ProtocolLabel::Smtp => "smtp",
            ProtocolLabel::Dns => "dns",
            ProtocolLabel::Pop3 => "pop3",
            ProtocolLabel::Ntp => "ntp",
            ProtocolLabel::Unknown => "...",
        }
    }
}

impl std::fmt::Display for ProtocolLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A crafted payload tagged with the protocol it is meant to elicit
#[derive(Debug, Clone)]
pub struct ProtocolProbe {
    pub name: &'static str,
    pub transport: Transport,
    pub payload: Vec<u8>,
}

/// Size of an NTP v3 packet: four header bytes plus eleven 32-bit words
pub const NTP_PACKET_LEN: usize = 48;

/// Bytes a TCP prober reads back per probe
pub const TCP_READ_LIMIT: usize = 12;

/// Bytes a UDP prober receives per probe
pub const UDP_READ_LIMIT: usize = 48;

/// Ordered probe tables for both transports.
///
/// Built once per scan from the configured DNS transaction id and shared
/// read-only between workers. Attempt order is fixed: probers walk the
/// table front to back.
#[derive(Debug, Clone)]
pub struct ProbeCatalog {
    dns_id: u16,
    tcp: Vec<ProtocolProbe>,
    udp: Vec<ProtocolProbe>,
}

impl ProbeCatalog {
    pub fn new(dns_id: u16) -> Self {
        let dns_query = dns_query_packet(dns_id);

        // DNS over TCP carries a two-byte big-endian length prefix
        let mut framed = Vec::with_capacity(dns_query.len() + 2);
        framed.extend_from_slice(&(dns_query.len() as u16).to_be_bytes());
        framed.extend_from_slice(&dns_query);

        let tcp = vec![
            ProtocolProbe {
                name: "dns",
                transport: Transport::Tcp,
                payload: framed,
            },
            ProtocolProbe {
                name: "smtp",
                transport: Transport::Tcp,
                payload: b"HELO World".to_vec(),
            },
            ProtocolProbe {
                name: "http",
                transport: Transport::Tcp,
                payload: b"GET / HTTP/1.1\r\nHost: google.com\r\n\r\n".to_vec(),
            },
            ProtocolProbe {
                name: "pop3",
                transport: Transport::Tcp,
                payload: b"AUTH".to_vec(),
            },
        ];

        let udp = vec![
            ProtocolProbe {
                name: "dns",
                transport: Transport::Udp,
                payload: dns_query,
            },
            ProtocolProbe {
                name: "ntp",
                transport: Transport::Udp,
                payload: ntp_client_packet().to_vec(),
            },
        ];

        Self { dns_id, tcp, udp }
    }

    /// The scan's DNS transaction id, shared with the classifier
    pub fn dns_id(&self) -> u16 {
        self.dns_id
    }

    /// Probe-attempt order for one transport
    pub fn probes_for(&self, transport: Transport) -> &[ProtocolProbe] {
        match transport {
            Transport::Tcp => &self.tcp,
            Transport::Udp => &self.udp,
        }
    }
}

/// DNS A query for a sentinel name, recursion desired, one question.
fn dns_query_packet(id: u16) -> Vec<u8> {
    let mut packet = Vec::with_capacity(28);
    packet.extend_from_slice(&id.to_be_bytes());
    packet.extend_from_slice(&0x0100u16.to_be_bytes()); // flags: RD
    packet.extend_from_slice(&1u16.to_be_bytes()); // QDCOUNT
    packet.extend_from_slice(&0u16.to_be_bytes()); // ANCOUNT
    packet.extend_from_slice(&0u16.to_be_bytes()); // NSCOUNT
    packet.extend_from_slice(&0u16.to_be_bytes()); // ARCOUNT
    packet.extend_from_slice(b"\x06google\x03com\x00");
    packet.extend_from_slice(&1u16.to_be_bytes()); // QTYPE A
    packet.extend_from_slice(&1u16.to_be_bytes()); // QCLASS IN
    packet
}

/// NTP v3 client request: leap 0, version 3, mode 3, everything else zero.
fn ntp_client_packet() -> [u8; NTP_PACKET_LEN] {
    let mut packet = [0u8; NTP_PACKET_LEN];
    packet[0] = 0b00_011_011;
    packet
}
