use clap::Parser;

use crate::common::{LogArgs, PmEvmeError};

/// Main command enumeration for the pm-evme CLI tool
#[derive(Parser, Debug)]
#[command(infer_subcommands = true, version)]
pub enum MainCmd {
    /// Decode a sponsored transaction envelope
    Decode(crate::decode::Cmd),
    /// Encode the calldata sent to a paymaster
    Calldata(crate::calldata::Cmd),
    /// Print the effective chain configuration
    Config(crate::config::Cmd),
}

/// Error types for the main command system
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Command failed
    #[error("{0}")]
    PmEvme(#[from] PmEvmeError),
}

impl MainCmd {
    /// Execute the main command
    pub fn run(&self) -> Result<(), Error> {
        self.log_args().init()?;
        let output = match self {
            Self::Decode(cmd) => cmd.run()?,
            Self::Calldata(cmd) => cmd.run()?,
            Self::Config(cmd) => cmd.run()?,
        };
        println!("{output}");
        Ok(())
    }

    const fn log_args(&self) -> &LogArgs {
        match self {
            Self::Decode(cmd) => &cmd.log,
            Self::Calldata(cmd) => &cmd.log,
            Self::Config(cmd) => &cmd.log,
        }
    }
}
