//! Command-line tooling over the sponsored state transition.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod cmd;
pub use cmd::*;

pub mod calldata;
pub mod common;
pub mod config;
pub mod decode;
