use clap::{Arg, ArgAction, Command};
use colored::*;
use std::process;
use std::str::FromStr;
use std::sync::Arc;

use deimos::{
    config::ScanConfig,
    output::{OutputConfig, OutputFormat, OutputManager},
    probe::Transport,
    scanner::{ScanEngine, ScanSummary},
};

// Ulimit adjustment for Unix systems
#[cfg(unix)]
fn adjust_ulimit_size(ulimit: Option<u64>) -> u64 {
    use rlimit::Resource;

    if let Some(limit) = ulimit {
        if Resource::NOFILE.set(limit, limit).is_ok() {
            println!(
                "{} {}",
                "[~] raising open-file limit to".bright_blue(),
                limit.to_string().bright_cyan().bold()
            );
        } else {
            eprintln!("{}", "[!] failed to set ulimit value".bright_red());
        }
    }

    match Resource::NOFILE.get() {
        Ok((soft, _)) => soft,
        Err(_) => {
            eprintln!("{}", "[!] could not read file descriptor limit".bright_yellow());
            65535
        }
    }
}

#[cfg(not(unix))]
fn adjust_ulimit_size(_ulimit: Option<u64>) -> u64 {
    65535
}

fn print_banner() {
    println!("{}", " ___  ____ _ _  _ ____ ____ ".truecolor(142, 68, 173).bold());
    println!("{}", " |  \\ |___ | |\\/| |  | [__  ".truecolor(142, 68, 173).bold());
    println!("{}", " |__/ |___ | |  | |__| ___] ".truecolor(142, 68, 173).bold());
    println!();
    println!("{}", "Deimos - dread for your open ports".truecolor(255, 215, 0).bold());
    println!();
}

fn build_cli() -> Command {
    Command::new("deimos")
        .about("Probe a port range and fingerprint what answers")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("tcp")
                .short('t')
                .long("tcp")
                .help("Probe over TCP")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("udp")
                .short('u')
                .long("udp")
                .help("Probe over UDP")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("host")
                .help("Host to scan (name or IPv4 address)")
                .required(true),
        )
        .arg(
            Arg::new("start")
                .help("First port of the range")
                .required(true)
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("end")
                .help("End of the range (exclusive)")
                .required(true)
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("workers")
                .short('w')
                .long("workers")
                .help("Concurrent workers per transport (default: CPU count)")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .help("Per-probe connect/send/recv timeout in milliseconds")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("wait")
                .long("wait")
                .help("Per-result wait budget in milliseconds")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("delay")
                .long("delay")
                .help("Startup delay before dispatch in milliseconds")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .help("Output format: text, greppable, json")
                .default_value("text"),
        )
        .arg(
            Arg::new("no-color")
                .long("no-color")
                .help("Disable colored output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Show response times on result lines")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("ulimit")
                .long("ulimit")
                .help("Raise the open-file limit before scanning")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(e) = run().await {
        eprintln!("{} {}", "[!]".bright_red(), e);
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let matches = build_cli().get_matches();

    let mut config = ScanConfig::load_default_config();
    config.target = matches.get_one::<String>("host").cloned().unwrap_or_default();
    config.port_start = *matches.get_one::<u16>("start").unwrap_or(&1);
    config.port_end = *matches.get_one::<u16>("end").unwrap_or(&1);
    config.tcp = matches.get_flag("tcp");
    config.udp = matches.get_flag("udp");

    if let Some(&workers) = matches.get_one::<usize>("workers") {
        config.workers = workers;
    }
    if let Some(&timeout) = matches.get_one::<u64>("timeout") {
        config.probe_timeout = timeout;
    }
    if let Some(&wait) = matches.get_one::<u64>("wait") {
        config.result_wait = wait;
    }
    if let Some(&delay) = matches.get_one::<u64>("delay") {
        config.startup_delay = delay;
    }

    config.validate()?;

    let format = OutputFormat::from_str(
        matches
            .get_one::<String>("format")
            .map(String::as_str)
            .unwrap_or("text"),
    )
    .map_err(anyhow::Error::msg)?;

    let output_config = OutputConfig {
        format,
        colored: !matches.get_flag("no-color"),
        verbose: matches.get_flag("verbose"),
    };

    if format == OutputFormat::Text {
        print_banner();
    }

    let limit = adjust_ulimit_size(matches.get_one::<u64>("ulimit").copied());
    log::debug!("open file limit: {}", limit);

    let config = Arc::new(config);
    let output = Arc::new(OutputManager::new(output_config, config.target.clone()));

    // one engine per transport, fully independent, printing as results land
    let mut handles = Vec::new();
    for transport in config.transports() {
        let config = config.clone();
        let output = output.clone();
        handles.push(tokio::spawn(async move {
            run_transport(config, transport, output).await
        }));
    }

    for handle in handles {
        let summary = handle.await??;
        output.write_summary(&summary);
    }

    Ok(())
}

async fn run_transport(
    config: Arc<ScanConfig>,
    transport: Transport,
    output: Arc<OutputManager>,
) -> anyhow::Result<ScanSummary> {
    let engine = ScanEngine::new(config, transport)?;
    let mut stream = engine.start().await?;

    let mut results = Vec::new();
    while let Some(result) = stream.next_result().await? {
        output.write_result(&result);
        results.push(result);
    }

    Ok(stream.finish(results))
}
