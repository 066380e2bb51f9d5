//! Configuration module for the deimos prober

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for a scan.
///
/// Built once before a scan starts and never mutated afterwards; engines
/// receive it behind an `Arc`. The DNS transaction id lives here so every
/// probe and every classifier call across both transports sees the same
/// value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Target host to scan (name or IPv4 address)
    pub target: String,

    /// First port of the range (inclusive)
    pub port_start: u16,

    /// End of the range (exclusive)
    pub port_end: u16,

    /// Probe over TCP
    pub tcp: bool,

    /// Probe over UDP
    pub udp: bool,

    /// Number of concurrent workers per engine
    pub workers: usize,

    /// Timeout for each connect/send/recv in milliseconds
    pub probe_timeout: u64,

    /// Consumer-side wait budget per result in milliseconds
    pub result_wait: u64,

    /// Delay before dispatch begins, in milliseconds
    pub startup_delay: u64,

    /// Depth of the worker-to-consumer result channel
    pub channel_capacity: usize,

    /// DNS transaction id, chosen once per scan
    #[serde(default = "random_dns_id", skip_serializing)]
    pub dns_id: u16,
}

fn random_dns_id() -> u16 {
    rand::thread_rng().gen_range(1..=65535)
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            target: "127.0.0.1".to_string(),
            port_start: 1,
            port_end: 1001,
            tcp: true,
            udp: false,
            workers: num_cpus::get(),
            probe_timeout: 1000,
            result_wait: 6000,
            startup_delay: 2000,
            channel_capacity: 1024,
            dns_id: random_dns_id(),
        }
    }
}

impl ScanConfig {
    /// Create a new scan configuration for a target
    pub fn new(target: String) -> Self {
        Self {
            target,
            ..Default::default()
        }
    }

    /// Set the port range `[start, end)`
    pub fn with_ports(mut self, start: u16, end: u16) -> Self {
        self.port_start = start;
        self.port_end = end;
        self
    }

    /// Select transports
    pub fn with_transports(mut self, tcp: bool, udp: bool) -> Self {
        self.tcp = tcp;
        self.udp = udp;
        self
    }

    /// Set the worker pool size
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the per-call probe timeout in milliseconds
    pub fn with_probe_timeout(mut self, probe_timeout: u64) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    /// Set the consumer wait budget in milliseconds
    pub fn with_result_wait(mut self, result_wait: u64) -> Self {
        self.result_wait = result_wait;
        self
    }

    /// Set the pre-dispatch delay in milliseconds
    pub fn with_startup_delay(mut self, startup_delay: u64) -> Self {
        self.startup_delay = startup_delay;
        self
    }

    pub fn probe_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.probe_timeout)
    }

    pub fn result_wait_duration(&self) -> Duration {
        Duration::from_millis(self.result_wait)
    }

    pub fn startup_delay_duration(&self) -> Duration {
        Duration::from_millis(self.startup_delay)
    }

    /// Ports of the configured range, in dispatch order
    pub fn ports(&self) -> std::ops::Range<u16> {
        self.port_start..self.port_end
    }

    /// Transports selected for this scan
    pub fn transports(&self) -> Vec<crate::probe::Transport> {
        let mut transports = Vec::with_capacity(2);
        if self.tcp {
            transports.push(crate::probe::Transport::Tcp);
        }
        if self.udp {
            transports.push(crate::probe::Transport::Udp);
        }
        transports
    }

    /// Resolve the target to an IPv4 address. IPv6 is out of scope.
    pub fn resolve_target(&self) -> crate::Result<IpAddr> {
        let addrs = (self.target.as_str(), 0u16)
            .to_socket_addrs()
            .map_err(|e| crate::ScanError::InvalidTarget(format!("{}: {}", self.target, e)))?;

        addrs
            .map(|addr| addr.ip())
            .find(|ip| ip.is_ipv4())
            .ok_or_else(|| {
                crate::ScanError::InvalidTarget(format!("{}: no IPv4 address", self.target))
            })
    }

    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| crate::ScanError::Config(format!("failed to read config file: {}", e)))?;

        let config: ScanConfig = toml::from_str(&content)
            .map_err(|e| crate::ScanError::Config(format!("failed to parse TOML: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from `~/.deimos.toml` if present
    pub fn load_default_config() -> Self {
        let home_dir = dirs::home_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
        let deimos_config = home_dir.join(".deimos.toml");

        if deimos_config.exists() {
            if let Ok(config) = Self::from_toml_file(&deimos_config) {
                log::info!("loaded config from {}", deimos_config.display());
                return config;
            }
        }

        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.target.is_empty() {
            return Err(crate::ScanError::InvalidTarget(
                "target cannot be empty".to_string(),
            ));
        }

        if self.port_start == 0 {
            return Err(crate::ScanError::PortRange(
                "range starts at port 1".to_string(),
            ));
        }

        if self.port_start > self.port_end {
            return Err(crate::ScanError::PortRange(format!(
                "start {} exceeds end {}",
                self.port_start, self.port_end
            )));
        }

        if !self.tcp && !self.udp {
            return Err(crate::ScanError::Config(
                "select at least one transport".to_string(),
            ));
        }

        if self.workers == 0 {
            return Err(crate::ScanError::Config(
                "worker count must be greater than 0".to_string(),
            ));
        }

        if self.channel_capacity == 0 {
            return Err(crate::ScanError::Config(
                "channel capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
