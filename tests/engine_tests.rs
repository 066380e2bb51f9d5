//! Engine stream semantics over localhost

use deimos::config::ScanConfig;
use deimos::probe::{ProtocolLabel, Transport, NTP_PACKET_LEN};
use deimos::scanner::{ScanEngine, ScanStatus};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};

fn test_config(start: u16, end: u16) -> ScanConfig {
    let mut config = ScanConfig::new("127.0.0.1".to_string())
        .with_ports(start, end)
        .with_transports(true, false)
        .with_workers(8)
        .with_probe_timeout(200)
        .with_result_wait(2000)
        .with_startup_delay(0);
    config.dns_id = 0x5E21;
    config
}

#[tokio::test]
async fn empty_range_completes_immediately() {
    let mut config = test_config(1000, 1000);
    // the startup delay must not apply to an empty dispatch
    config.startup_delay = 2000;

    let engine = ScanEngine::new(Arc::new(config), Transport::Tcp).unwrap();
    let started = Instant::now();
    let summary = engine.start().await.unwrap().collect().await.unwrap();

    assert!(summary.results.is_empty());
    assert_eq!(summary.status, ScanStatus::Completed);
    assert!(started.elapsed() < Duration::from_millis(500));
}

#[tokio::test]
async fn all_refusing_range_yields_empty_stream() {
    let engine = ScanEngine::new(Arc::new(test_config(45991, 45999)), Transport::Tcp).unwrap();
    let summary = engine.start().await.unwrap().collect().await.unwrap();

    assert!(summary.results.is_empty());
    assert_eq!(summary.status, ScanStatus::Completed);
}

#[tokio::test]
async fn responding_port_is_fingerprinted() {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 64];
                let _ = stream.read(&mut buf).await;
                let _ = stream.write_all(b"220 deimos ready\r\n").await;
            });
        }
    });

    let engine = ScanEngine::new(Arc::new(test_config(port, port + 1)), Transport::Tcp).unwrap();
    let summary = engine.start().await.unwrap().collect().await.unwrap();

    assert_eq!(summary.status, ScanStatus::Completed);
    assert_eq!(summary.results.len(), 1);
    assert_eq!(summary.results[0].port, port);
    assert_eq!(summary.results[0].label, ProtocolLabel::Smtp);
    assert_eq!(summary.results[0].transport, Transport::Tcp);
    assert_eq!(summary.fingerprinted(), 1);
}

#[tokio::test]
async fn quiet_stream_stalls_and_cancels() {
    // a listener that accepts and never answers keeps the only worker busy
    // well past the wait budget
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 64];
                while matches!(stream.read(&mut buf).await, Ok(n) if n > 0) {}
            });
        }
    });

    let mut config = test_config(port, port + 1);
    config.probe_timeout = 1000;
    config.result_wait = 300;

    let engine = ScanEngine::new(Arc::new(config), Transport::Tcp).unwrap();
    let started = Instant::now();
    let summary = engine.start().await.unwrap().collect().await.unwrap();

    assert_eq!(summary.status, ScanStatus::Stalled);
    assert!(summary.results.is_empty());
    // the stall cancelled the scan instead of riding out all four probes
    assert!(started.elapsed() < Duration::from_millis(2500));
}

#[tokio::test]
async fn dual_transport_reports_same_port_independently() {
    // a TCP listener and a UDP responder sharing one port number
    let (listener, udp_socket, port) = loop {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        match UdpSocket::bind((Ipv4Addr::LOCALHOST, port)).await {
            Ok(socket) => break (listener, socket, port),
            Err(_) => continue,
        }
    };

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 64];
                let _ = stream.read(&mut buf).await;
                let _ = stream.write_all(b"+OK dovecot ready\r\n").await;
            });
        }
    });

    tokio::spawn(async move {
        let mut buf = [0u8; 128];
        let mut reply = vec![0u8; NTP_PACKET_LEN];
        reply[0] = 0b00_011_100;
        while let Ok((_, peer)) = udp_socket.recv_from(&mut buf).await {
            let _ = udp_socket.send_to(&reply, peer).await;
        }
    });

    let mut config = test_config(port, port + 1);
    config.udp = true;
    let config = Arc::new(config);

    let tcp_engine = ScanEngine::new(config.clone(), Transport::Tcp).unwrap();
    let udp_engine = ScanEngine::new(config.clone(), Transport::Udp).unwrap();

    let (tcp_summary, udp_summary) = tokio::join!(
        async { tcp_engine.start().await.unwrap().collect().await.unwrap() },
        async { udp_engine.start().await.unwrap().collect().await.unwrap() },
    );

    assert_eq!(tcp_summary.status, ScanStatus::Completed);
    assert_eq!(udp_summary.status, ScanStatus::Completed);

    assert_eq!(tcp_summary.results.len(), 1);
    assert_eq!(tcp_summary.results[0].port, port);
    assert_eq!(tcp_summary.results[0].label, ProtocolLabel::Pop3);
    assert_eq!(tcp_summary.results[0].transport, Transport::Tcp);

    assert_eq!(udp_summary.results.len(), 1);
    assert_eq!(udp_summary.results[0].port, port);
    assert_eq!(udp_summary.results[0].label, ProtocolLabel::Ntp);
    assert_eq!(udp_summary.results[0].transport, Transport::Udp);
}

#[tokio::test]
async fn engine_rejects_invalid_config() {
    let config = ScanConfig::new("127.0.0.1".to_string()).with_transports(false, false);
    assert!(ScanEngine::new(Arc::new(config), Transport::Tcp).is_err());
}
