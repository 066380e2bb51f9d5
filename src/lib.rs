//! Deimos - Phobos' younger brother
//!
//! Concurrent port probing with coarse protocol fingerprinting: send crafted
//! payloads over TCP and UDP, classify whatever answers.

pub mod config;
pub mod error;
pub mod output;
pub mod probe;
pub mod scanner;

// Re-export commonly used types
pub use config::ScanConfig;
pub use error::{ProbeFailure, ScanError};
pub use probe::{ProbeCatalog, ProtocolLabel, Transport};
pub use scanner::{ResultStream, ScanEngine, ScanResult, ScanSummary};

pub type Result<T> = std::result::Result<T, ScanError>;
