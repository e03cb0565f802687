//! Timed request engine
//!
//! This module provides the request loop and its collaborators:
//! - The sequential request loop state machine
//! - Proxied outbound transport
//! - User-Agent selection
//! - Injectable clock

pub mod clock;
mod request_loop;
pub mod transport;
pub mod user_agent;

pub use clock::{Clock, SystemClock};
pub use request_loop::{
    LoopConfig, LoopState, Observation, RequestLoop, RunCounters, RunSummary, StepReport,
    TerminationReason,
};
pub use transport::{AttemptOutcome, ProxyRoute, ReqwestTransport, VoteTransport};
pub use user_agent::{UserAgentSource, WeightedUserAgents};
