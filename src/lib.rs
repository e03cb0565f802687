//! Proxyvote - proxy-rotating timed request runner
//!
//! Repeats a GET request against a fixed endpoint, routing every attempt
//! through the next proxy in a stable rotation.
//!
//! ## Features
//!
//! - Proxy catalog filtered by anonymity level and HTTPS support
//! - Timezone enrichment through IP geolocation
//! - Local-hour vote windows per proxy
//! - Success delay, failure backoff and failure-count termination
//! - Graceful cancellation between and during sleeps

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod rotation;
pub mod schedule;

pub use catalog::ProxyCatalog;
pub use config::Config;
pub use engine::{RequestLoop, RunCounters, RunSummary, TerminationReason};
pub use error::{ProxyVoteError, Result};
pub use rotation::ProxyRotor;
pub use schedule::TimeWindowGate;
