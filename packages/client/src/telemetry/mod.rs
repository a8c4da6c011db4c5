//! Pool telemetry
//!
//! Lock-free counters describing pool activity.

pub mod pool_stats;

pub use pool_stats::{PoolStats, PoolStatsSnapshot};
