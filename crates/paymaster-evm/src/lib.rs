//! State transition for paymaster-sponsored transactions.
//!
//! A sponsored transaction names a paymaster contract in its payload. Before gas is bought the
//! paymaster is asked to validate and pay for the transaction; after execution it is told about
//! the outcome. Everything else follows the usual account-based transition: nonce and EOA
//! checks, gas purchase from a block gas pool, intrinsic gas, execution, refund and fee payout.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod constants;

mod block;
pub use block::*;

mod config;
pub use config::*;

mod evm;
pub use evm::*;

mod gas;
pub use gas::*;

mod message;
pub use message::*;

mod metrics;
pub use self::metrics::Metrics;

pub mod paymaster;

mod state;
pub use state::*;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

mod transaction;
pub use transaction::*;

mod transition;
pub use transition::*;
