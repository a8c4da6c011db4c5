//! Fluent builders over the client configuration types
//!
//! Each builder collects settings with chained calls and validates them once
//! in `build()`.

pub mod agent;
pub mod negotiator;
pub mod tunnel;

pub use agent::AgentBuilder;
pub use negotiator::NegotiatorBuilder;
pub use tunnel::TunnelBuilder;
