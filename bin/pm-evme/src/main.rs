//! `pm-evme`: inspect sponsored transactions and the calls made to their paymasters.

use clap::Parser;
use pm_evme::{Error, MainCmd};

fn main() -> Result<(), Error> {
    MainCmd::parse().run().inspect_err(|e| eprintln!("{e}"))
}
