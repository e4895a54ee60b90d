//! Test utilities for the sponsored state transition.

mod database;
mod evm;
mod paymaster;

pub use database::*;
pub use evm::*;
pub use paymaster::*;
