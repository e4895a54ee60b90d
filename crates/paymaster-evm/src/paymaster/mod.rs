//! Paymaster sponsorship: the fixed contract interface and the sub-calls made through it.

mod abi;
pub use abi::*;

mod bridge;
pub use bridge::*;
