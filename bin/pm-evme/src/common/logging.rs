//! Logging configuration for the pm-evme CLI tool.
//!
//! Provides CLI arguments for configuring tracing output with support for:
//! - Verbosity levels via `-v/-vv/-vvv` flags
//! - Custom log filters via `RUST_LOG` environment variable
//! - Log file output via `--log.file` flag

use std::path::PathBuf;

use clap::Parser;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use super::{PmEvmeError, Result};

/// Log targets emitted by this tool and the libraries it drives.
const TARGETS: &[&str] = &["pm_evme", "paymaster", "state_transition", "block_executor"];

/// Logging configuration arguments.
#[derive(Debug, Clone, Default, Parser)]
pub struct LogArgs {
    /// Increase logging verbosity (-v = error, -vv = warn, -vvv = info, -vvvv = debug, -vvvvv =
    /// trace)
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log file path. If specified, logs are written to this file instead of stderr.
    #[arg(long = "log.file", visible_aliases = ["log-file"], global = true)]
    pub log_file: Option<PathBuf>,

    /// Disable colorful console logging. Only applies when logging to stderr (no --log.file).
    #[arg(long = "log.no-color", visible_aliases = ["log-no-color"], global = true)]
    pub log_no_color: bool,
}

impl LogArgs {
    /// Initialize the tracing subscriber.
    ///
    /// `RUST_LOG` takes precedence over the `-v` flags. Without either, logging is off. The log
    /// target is only shown at DEBUG and above.
    pub fn init(&self) -> Result<()> {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(self.directives())
        };
        let show_target = self.verbose >= 4;

        let result = if let Some(ref log_file) = self.log_file {
            let file = std::fs::File::create(log_file)?;
            fmt()
                .with_env_filter(filter)
                .with_target(show_target)
                .with_writer(file)
                .with_ansi(false)
                .try_init()
        } else {
            fmt()
                .with_env_filter(filter)
                .with_target(show_target)
                .with_writer(std::io::stderr)
                .with_ansi(!self.log_no_color)
                .try_init()
        };
        result.map_err(|err| PmEvmeError::Logging(err.to_string()))
    }

    /// Returns the filter directives selected by the verbosity flags.
    pub fn directives(&self) -> String {
        let level = match self.verbose {
            0 => return "off".to_owned(),
            1 => Level::ERROR,
            2 => Level::WARN,
            3 => Level::INFO,
            4 => Level::DEBUG,
            _ => Level::TRACE,
        };
        TARGETS.iter().map(|target| format!("{target}={level}")).collect::<Vec<_>>().join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directives() {
        assert_eq!(LogArgs::default().directives(), "off");
        let args = LogArgs { verbose: 2, ..Default::default() };
        assert_eq!(
            args.directives(),
            "pm_evme=WARN,paymaster=WARN,state_transition=WARN,block_executor=WARN"
        );
        let args = LogArgs { verbose: 9, ..Default::default() };
        assert!(args.directives().starts_with("pm_evme=TRACE"));
    }
}
