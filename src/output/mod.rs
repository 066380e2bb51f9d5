//! Output formatting for streamed scan results

use crate::probe::ProtocolLabel;
use crate::scanner::{ScanResult, ScanStatus, ScanSummary};
use colored::Colorize;
use serde::{Deserialize, Serialize};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Greppable,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "greppable" | "grep" => Ok(OutputFormat::Greppable),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub colored: bool,
    pub verbose: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            colored: true,
            verbose: false,
        }
    }
}

/// Renders result lines as they come off the stream
pub struct OutputManager {
    config: OutputConfig,
    target: String,
}

impl OutputManager {
    pub fn new(config: OutputConfig, target: String) -> Self {
        if !config.colored {
            colored::control::set_override(false);
        }
        Self { config, target }
    }

    /// Render one result line. Lines interleave across transports when two
    /// engines run at once; the transport tag keeps them apart.
    pub fn write_result(&self, result: &ScanResult) {
        match self.config.format {
            OutputFormat::Text => {
                let label = self.paint_label(result.label);
                if self.config.verbose {
                    println!(
                        "Port {} {} {} [{}ms]",
                        result.port,
                        label,
                        result.transport.name(),
                        result.response_time.as_millis()
                    );
                } else {
                    println!("Port {} {} {}", result.port, label, result.transport.name());
                }
            }
            OutputFormat::Greppable => {
                println!(
                    "{}:{}/{} {}",
                    self.target,
                    result.port,
                    result.transport.as_str(),
                    result.label
                );
            }
            OutputFormat::Json => {
                if let Ok(line) = serde_json::to_string(result) {
                    println!("{}", line);
                }
            }
        }
    }

    /// End-of-scan line for one transport; text mode only
    pub fn write_summary(&self, summary: &ScanSummary) {
        if self.config.format != OutputFormat::Text {
            return;
        }

        let tag = summary.transport.name();
        match summary.status {
            ScanStatus::Completed => {
                println!(
                    "{} {} scan finished in {:.2}s: {} responding, {} fingerprinted",
                    "[~]".bright_blue(),
                    tag,
                    summary.duration.as_secs_f64(),
                    summary.results.len(),
                    summary.fingerprinted()
                );
            }
            ScanStatus::Stalled => {
                println!(
                    "{} {} scan stalled after {:.2}s with {} results; remaining ports were not probed",
                    "[!]".bright_yellow(),
                    tag,
                    summary.duration.as_secs_f64(),
                    summary.results.len()
                );
            }
            ScanStatus::Failed => {
                println!(
                    "{} {} scan aborted after {:.2}s",
                    "[!]".bright_red(),
                    tag,
                    summary.duration.as_secs_f64()
                );
            }
        }
    }

    fn paint_label(&self, label: ProtocolLabel) -> colored::ColoredString {
        match label {
            ProtocolLabel::Unknown => label.as_str().bright_black(),
            _ => label.as_str().bright_green(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn format_parses_aliases() {
        assert_eq!(OutputFormat::from_str("text").unwrap(), OutputFormat::Text);
        assert_eq!(
            OutputFormat::from_str("grep").unwrap(),
            OutputFormat::Greppable
        );
        assert_eq!(OutputFormat::from_str("JSON").unwrap(), OutputFormat::Json);
        assert!(OutputFormat::from_str("xml").is_err());
    }
}
