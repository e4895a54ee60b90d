//! Pieces shared by every subcommand.

mod chain;
mod error;
mod hex;
mod logging;

pub use chain::*;
pub use error::*;
pub use hex::*;
pub use logging::*;
