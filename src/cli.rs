//! Command-line interface for immuctl.
use std::{path::PathBuf, str::FromStr};

use clap::{Args, Parser, Subcommand};
use tracing::level_filters::LevelFilter;

use crate::service::ServiceRequest;

/// Wrapper around `LevelFilter` so clap can parse log levels from either
/// string names ("info", "debug", etc.) or numeric shorthands (0-5).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogLevelArg(LevelFilter);

impl LogLevelArg {
    /// String representation suitable for `RUST_LOG`.
    pub fn as_str(&self) -> &'static str {
        match self.0 {
            LevelFilter::OFF => "off",
            LevelFilter::ERROR => "error",
            LevelFilter::WARN => "warn",
            LevelFilter::INFO => "info",
            LevelFilter::DEBUG => "debug",
            LevelFilter::TRACE => "trace",
        }
    }
}

impl FromStr for LogLevelArg {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("log level cannot be empty".into());
        }

        if let Ok(number) = trimmed.parse::<u8>() {
            let level = match number {
                0 => LevelFilter::OFF,
                1 => LevelFilter::ERROR,
                2 => LevelFilter::WARN,
                3 => LevelFilter::INFO,
                4 => LevelFilter::DEBUG,
                5 => LevelFilter::TRACE,
                _ => {
                    return Err(format!(
                        "unsupported log level number '{number}' (expected 0-5)"
                    ));
                }
            };

            return Ok(LogLevelArg(level));
        }

        let level = match trimmed.to_ascii_lowercase().as_str() {
            "off" => Some(LevelFilter::OFF),
            "error" | "err" => Some(LevelFilter::ERROR),
            "warn" | "warning" => Some(LevelFilter::WARN),
            "info" | "information" => Some(LevelFilter::INFO),
            "debug" => Some(LevelFilter::DEBUG),
            "trace" => Some(LevelFilter::TRACE),
            _ => None,
        }
        .ok_or_else(|| format!("invalid log level '{trimmed}'"))?;

        Ok(LogLevelArg(level))
    }
}

const SERVICE_ABOUT: &str = "Manage immudb related services.
Available services: immudb and immugw.
Available commands: install, uninstall, start, stop, restart, status.
Root permissions are required in order to make administrator operations.";

const SERVICE_EXAMPLES: &str = "Examples:
  sudo immuctl service immudb install --local-file /usr/local/bin/immudb
  sudo immuctl service immudb restart --time 20
  sudo immuctl service immugw status
  sudo immuctl service immudb uninstall";

/// Command-line interface for immuctl.
#[derive(Parser)]
#[command(name = "immuctl", version, author)]
#[command(about = "Install and manage immudb services", long_about = None)]
pub struct Cli {
    /// Override the logging verbosity for this invocation only.
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Path to the immuctl configuration file.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Arguments of the `service` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ServiceArgs {
    /// Service name (immudb, immugw).
    pub service: String,

    /// Lifecycle action (install, uninstall, start, stop, restart, status).
    pub action: Option<String>,

    /// Number of seconds to wait before running the action.
    #[arg(short, long, default_value_t = 0, value_name = "SECS")]
    pub time: u64,

    /// Number of seconds a relaunched instance waits before running.
    #[arg(long, default_value_t = 0, hide = true)]
    pub delayed: u64,

    /// Clean up the installed service files.
    #[arg(long)]
    pub remove_files: bool,

    /// Local executable file (or http(s) URL) to install.
    #[arg(long, value_name = "PATH|URL")]
    pub local_file: Option<String>,

    /// Expected SHA-256 of the executable to install.
    #[arg(long, value_name = "SHA256")]
    pub checksum: Option<String>,
}

impl ServiceArgs {
    /// The parsed arguments as an unvalidated request.
    pub fn request(&self) -> ServiceRequest {
        ServiceRequest {
            service: self.service.clone(),
            action: self.action.clone(),
            time: self.time,
            delayed: self.delayed,
            remove_files: self.remove_files,
            local_file: self.local_file.clone(),
            checksum: self.checksum.clone(),
        }
    }
}

/// Available commands for immuctl.
#[derive(Subcommand)]
pub enum Commands {
    /// Manage immu services.
    #[command(long_about = SERVICE_ABOUT, after_help = SERVICE_EXAMPLES)]
    Service(ServiceArgs),

    /// Run an installed service in the foreground or in the background.
    Run {
        /// Service name (immudb, immugw).
        service: String,

        /// Launch in the background and print the new PID.
        #[arg(short, long)]
        detached: bool,

        /// Extra arguments passed to the service executable.
        #[arg(last = true)]
        args: Vec<String>,
    },
}

impl Cli {
    /// Global options rendered back into arguments for relaunched instances.
    /// Values are attached with `=` so they survive re-parsing verbatim.
    pub fn global_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(level) = self.log_level {
            args.push(format!("--log-level={}", level.as_str()));
        }
        if let Some(config) = &self.config {
            args.push(format!("--config={}", config.display()));
        }
        args
    }
}

/// Parses command-line arguments and returns a `Cli` struct.
pub fn parse_args() -> Cli {
    Cli::parse()
}
