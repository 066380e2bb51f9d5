//! Response classification
//!
//! Maps raw response bytes to a protocol label by shape alone. The match is
//! independent of which probe elicited the response: an answer that looks
//! like HTTP is labelled HTTP even if it came back from the DNS probe.

use super::{ProtocolLabel, NTP_PACKET_LEN};

/// Classify a raw response against the known signatures.
///
/// Total over all inputs. Precedence is fixed: HTTP, then a three-digit
/// status code, then the DNS transaction id, then a POP3 `+`, then the NTP
/// wire layout, then the unknown sentinel. A crafted payload matching more
/// than one rule always gets the earliest label.
pub fn classify(raw: &[u8], dns_id: u16) -> ProtocolLabel {
    if raw.len() >= 4 && &raw[..4] == b"HTTP" {
        ProtocolLabel::Http
    } else if raw.len() >= 3 && raw[..3].iter().all(u8::is_ascii_digit) {
        // any 3-digit reply code: SMTP, FTP, and friends all fold here
        ProtocolLabel::Smtp
    } else if contains_dns_id(raw, dns_id) {
        ProtocolLabel::Dns
    } else if raw.first() == Some(&b'+') {
        ProtocolLabel::Pop3
    } else if decode_ntp(raw).is_some() {
        ProtocolLabel::Ntp
    } else {
        ProtocolLabel::Unknown
    }
}

/// A reply echoes the query id wherever the transport put it: offset 0 for
/// UDP, behind the two-byte length prefix for TCP. Scanning for the id as a
/// substring covers both.
fn contains_dns_id(raw: &[u8], dns_id: u16) -> bool {
    let id = dns_id.to_be_bytes();
    raw.windows(2).any(|window| window == id)
}

/// Fixed NTP header: four single-byte fields, then eleven 32-bit words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NtpReply {
    pub leap_version_mode: u8,
    pub stratum: u8,
    pub poll: u8,
    pub precision: i8,
    pub words: [u32; 11],
}

/// Strict structural decode of an NTP packet.
///
/// Anything other than exactly 48 bytes fails; there is no partial parse.
pub fn decode_ntp(raw: &[u8]) -> Option<NtpReply> {
    if raw.len() != NTP_PACKET_LEN {
        return None;
    }

    let mut words = [0u32; 11];
    for (word, chunk) in words.iter_mut().zip(raw[4..].chunks_exact(4)) {
        *word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }

    Some(NtpReply {
        leap_version_mode: raw[0],
        stratum: raw[1],
        poll: raw[2],
        precision: raw[3] as i8,
        words,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DNS_ID: u16 = 0x4A3B;

    fn ntp_reply_bytes() -> Vec<u8> {
        // server reply: leap 0, version 3, mode 4
        let mut raw = vec![0u8; NTP_PACKET_LEN];
        raw[0] = 0b00_011_100;
        raw[1] = 2; // stratum
        raw
    }

    #[test]
    fn http_prefix_wins() {
        assert_eq!(classify(b"HTTP/1.1 404 Not Found", DNS_ID), ProtocolLabel::Http);
        assert_eq!(classify(b"HTTP", DNS_ID), ProtocolLabel::Http);
    }

    #[test]
    fn three_digit_prefix_is_smtp() {
        assert_eq!(classify(b"220 mail.example ESMTP", DNS_ID), ProtocolLabel::Smtp);
        assert_eq!(classify(b"550", DNS_ID), ProtocolLabel::Smtp);
    }

    #[test]
    fn two_digits_are_not_enough() {
        assert_ne!(classify(b"22\x00", DNS_ID), ProtocolLabel::Smtp);
    }

    #[test]
    fn digit_prefix_beats_embedded_dns_id() {
        // precedence is deterministic: SMTP check runs before the id scan
        let mut raw = b"123".to_vec();
        raw.extend_from_slice(&DNS_ID.to_be_bytes());
        assert_eq!(classify(&raw, DNS_ID), ProtocolLabel::Smtp);
    }

    #[test]
    fn embedded_id_is_dns_at_udp_offset() {
        let mut raw = DNS_ID.to_be_bytes().to_vec();
        raw.extend_from_slice(&[0x81, 0x80, 0, 1, 0, 1]);
        assert_eq!(classify(&raw, DNS_ID), ProtocolLabel::Dns);
    }

    #[test]
    fn embedded_id_is_dns_behind_tcp_length_prefix() {
        let mut raw = vec![0x00, 0x1c];
        raw.extend_from_slice(&DNS_ID.to_be_bytes());
        raw.extend_from_slice(&[0x81, 0x80]);
        assert_eq!(classify(&raw, DNS_ID), ProtocolLabel::Dns);
    }

    #[test]
    fn plus_prefix_is_pop3() {
        assert_eq!(classify(b"+OK dovecot ready", DNS_ID), ProtocolLabel::Pop3);
        assert_eq!(classify(b"+", DNS_ID), ProtocolLabel::Pop3);
    }

    #[test]
    fn ntp_layout_classifies_as_ntp() {
        assert_eq!(classify(&ntp_reply_bytes(), DNS_ID), ProtocolLabel::Ntp);
    }

    #[test]
    fn truncated_ntp_is_unknown() {
        let raw = ntp_reply_bytes();
        assert_eq!(classify(&raw[..47], DNS_ID), ProtocolLabel::Unknown);
        let mut long = raw.clone();
        long.push(0);
        assert_eq!(classify(&long, DNS_ID), ProtocolLabel::Unknown);
    }

    #[test]
    fn empty_and_noise_are_unknown() {
        assert_eq!(classify(b"", DNS_ID), ProtocolLabel::Unknown);
        assert_eq!(classify(b"\x00\x01\x02", DNS_ID), ProtocolLabel::Unknown);
        assert_eq!(classify(b"SSH-2.0-OpenSSH_9.6", DNS_ID), ProtocolLabel::Unknown);
    }

    #[test]
    fn ntp_decode_reads_header_fields() {
        let mut raw = ntp_reply_bytes();
        raw[3] = 0xEC; // precision -20
        let reply = decode_ntp(&raw).unwrap();
        assert_eq!(reply.leap_version_mode, 0b00_011_100);
        assert_eq!(reply.stratum, 2);
        assert_eq!(reply.precision, -20);
        assert_eq!(reply.words, [0u32; 11]);
    }
}
