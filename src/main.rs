//! cellular-cli - AT command client for GSM modems
//!
//! Opens the modem's serial port, runs the bring-up handshake and issues
//! commands. `run` keeps the link up with periodic liveness pings until
//! Ctrl+C or until the modem stops answering.

use anyhow::Context;
use cellular_core::cli::{format_exchange, print_exit_codes, CliResult, ExitCodes, OutputFormat};
use cellular_core::{AppConfig, LinkError, LinkHandle, LivenessMonitor, VirtualModem};
use clap::{Parser, Subcommand};
use crossbeam_channel::{bounded, select, unbounded};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

/// cellular-cli
#[derive(Parser, Debug)]
#[command(
    name = "cellular-cli",
    version,
    about = "AT command client for GSM/cellular modems",
    long_about = None
)]
struct Cli {
    /// Serial port name (e.g., /dev/ttyUSB0, COM3)
    #[arg(short, long, global = true, env = "CELLULAR_PORT")]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long, global = true)]
    baud: Option<u32>,

    /// Configuration file (defaults to the platform config directory)
    #[arg(short = 'C', long, global = true)]
    config: Option<PathBuf>,

    /// Exchange deadline in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Talk to a built-in virtual modem instead of a serial port
    #[arg(long, global = true)]
    simulate: bool,

    /// Output format
    #[arg(short, long, value_enum, global = true, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available serial ports
    ListPorts {
        /// Show detailed info
        #[arg(short, long)]
        detailed: bool,
    },

    /// Send one or more AT commands and print the responses
    Send {
        /// Commands, without line terminator (e.g. AT+CSQ)
        #[arg(required = true)]
        commands: Vec<String>,
    },

    /// Check that the modem answers AT
    Ping,

    /// Issue commands, then stay connected until Ctrl+C or a liveness failure
    Run {
        /// Commands to issue after the handshake
        commands: Vec<String>,

        /// Seconds between liveness pings
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Print the effective configuration
    Config,

    /// Print the exit code table
    ExitCodes,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let result = match run(&cli) {
        Ok(result) => result,
        Err(e) => CliResult::error(ExitCodes::INTERNAL_ERROR, format!("{e:#}")),
    };
    if let CliResult::Error(code, msg) = &result {
        if *code != ExitCodes::CANCELLED {
            error!("{msg}");
        }
    }
    result.to_exit_code()
}

fn init_logging(cli: &Cli) {
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else if cli.quiet {
        tracing::Level::ERROR
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<CliResult> {
    let config = match load_config(cli) {
        Ok(config) => config,
        Err(e) => return Ok(CliResult::config_error(e.to_string())),
    };

    match &cli.command {
        Commands::ListPorts { detailed } => list_ports(cli, *detailed),
        Commands::Send { commands } => Ok(send(cli, &config, commands)),
        Commands::Ping => Ok(ping(cli, &config)),
        Commands::Run { commands, interval } => run_link(cli, &config, commands, *interval),
        Commands::Config => {
            println!("{}", config.to_toml()?);
            Ok(CliResult::success())
        }
        Commands::ExitCodes => {
            print_exit_codes();
            Ok(CliResult::success())
        }
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig, cellular_core::ConfigError> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    if let Some(port) = &cli.port {
        config.serial.port.clone_from(port);
    }
    if let Some(baud) = cli.baud {
        config.serial.baud_rate = baud;
    }
    if let Some(timeout) = cli.timeout_ms {
        config.link.exchange_timeout_ms = timeout;
    }
    Ok(config)
}

fn open_link(cli: &Cli, config: &AppConfig) -> Result<LinkHandle, LinkError> {
    if cli.simulate {
        info!("using virtual modem");
        LinkHandle::new(Box::new(VirtualModem::new()), config.link.clone())
    } else {
        info!(port = %config.serial.port, framing = %config.serial.framing(), "opening modem");
        LinkHandle::open(config.serial.clone(), config.link.clone())
    }
}

/// Issue commands in order, printing each response. Returns the first failure.
fn issue(cli: &Cli, link: &LinkHandle, commands: &[String]) -> CliResult {
    let mut outcome = CliResult::success();
    for command in commands {
        let exchange = link.send_command(command);
        if !cli.quiet || !exchange.is_success() {
            println!("{}", format_exchange(&exchange, cli.format));
        }
        if let Err(e) = exchange.into_result() {
            warn!(error = %e, "command failed");
            if outcome.is_success() {
                outcome = CliResult::from(&e);
            }
        }
    }
    outcome
}

fn send(cli: &Cli, config: &AppConfig, commands: &[String]) -> CliResult {
    let link = match open_link(cli, config) {
        Ok(link) => link,
        Err(e) => return CliResult::from(&e),
    };
    let outcome = issue(cli, &link, commands);
    if let Err(e) = link.close() {
        warn!(error = %e, "close failed");
    }
    outcome
}

fn ping(cli: &Cli, config: &AppConfig) -> CliResult {
    let link = match open_link(cli, config) {
        Ok(link) => link,
        Err(e) => return CliResult::from(&e),
    };
    let result = match link.ping() {
        Ok(()) => {
            if !cli.quiet {
                println!("OK ({})", link.connection_info());
            }
            CliResult::success()
        }
        Err(e) => CliResult::from(&e),
    };
    if let Err(e) = link.close() {
        warn!(error = %e, "close failed");
    }
    result
}

fn run_link(
    cli: &Cli,
    config: &AppConfig,
    commands: &[String],
    interval: Option<u64>,
) -> anyhow::Result<CliResult> {
    let link = match open_link(cli, config) {
        Ok(link) => Arc::new(link),
        Err(e) => return Ok(CliResult::from(&e)),
    };

    let issued = issue(cli, &link, commands);
    if !issued.is_success() {
        warn!("continuing after failed command");
    }

    let (interrupt_tx, interrupt_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.try_send(());
    })
    .context("installing Ctrl+C handler")?;

    let (failure_tx, failure_rx) = unbounded::<LinkError>();
    let monitor = if config.liveness.enabled {
        let every = interval.map_or_else(|| config.liveness.interval(), std::time::Duration::from_secs);
        Some(
            LivenessMonitor::spawn(Arc::clone(&link), every, failure_tx)
                .context("starting liveness monitor")?,
        )
    } else {
        drop(failure_tx);
        None
    };

    if !cli.quiet {
        eprintln!("Connected to {}. Press Ctrl+C to exit.", link.connection_info());
    }

    let result = select! {
        recv(interrupt_rx) -> _ => interrupted(),
        recv(failure_rx) -> failure => match failure {
            Ok(e) => CliResult::from(&e),
            Err(_) => {
                // Monitor disabled: the sender is gone, wait for Ctrl+C only.
                let _ = interrupt_rx.recv();
                interrupted()
            }
        },
    };

    if let Some(monitor) = monitor {
        monitor.stop();
    }
    if let Err(e) = link.close() {
        warn!(error = %e, "close failed");
    }
    let stats = link.stats();
    info!(
        exchanges = stats.exchanges,
        successes = stats.successes,
        device_errors = stats.device_errors,
        timeouts = stats.timeouts,
        "link closed"
    );
    Ok(result)
}

fn interrupted() -> CliResult {
    info!("interrupted, shutting down");
    CliResult::cancelled()
}

fn list_ports(cli: &Cli, detailed: bool) -> anyhow::Result<CliResult> {
    let ports = cellular_core::core::transport::list_ports()?;

    if ports.is_empty() {
        if !cli.quiet {
            println!("No serial ports found.");
        }
        return Ok(CliResult::success());
    }

    match cli.format {
        OutputFormat::Json => {
            let json: Vec<serde_json::Value> = ports
                .iter()
                .map(|p| {
                    serde_json::json!({
                        "name": p.port_name,
                        "type": format!("{:?}", p.port_type)
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        _ => {
            if detailed {
                println!("Available Serial Ports:");
                println!("{:-<60}", "");
                for port in &ports {
                    println!("  {} [{:?}]", port.port_name, port.port_type);
                }
            } else {
                for port in &ports {
                    println!("{}", port.port_name);
                }
            }
        }
    }

    Ok(CliResult::success())
}
