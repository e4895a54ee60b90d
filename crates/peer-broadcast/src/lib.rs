//! Relay of sponsored transactions and mined blocks to connected peers.
//!
//! Every connected peer is tracked in a [`PeerSet`] together with bounded caches of the
//! transaction and block hashes it is known to have. A [`Broadcaster`] drains two bounded
//! channels, one per event kind, and fans every event out to the peers that have not seen it.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod broadcaster;
pub use broadcaster::*;

mod config;
pub use config::*;

mod known;
pub use known::*;

mod metrics;
pub use self::metrics::Metrics;

mod peer;
pub use peer::*;
