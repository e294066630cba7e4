//! Node configuration.

use time::Duration;

/// Tuning parameters shared by the routing table, the lookups and the maintenance tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// The maximum number of peers in a bucket, also the width of a closest-nodes result.
    pub k: usize,
    /// The maximum number of concurrently outstanding requests per lookup.
    pub alpha: usize,
    /// The incumbent of a full bucket is only pinged if it hasn't been seen for this long.
    pub max_ping_interval: Duration,
    /// Buckets untouched for this long are refreshed with a lookup.
    pub bucket_refresh_age: Duration,
    /// The deadline for any single outgoing request.
    pub rpc_timeout: std::time::Duration,
    /// How often the maintenance task checks for stale buckets.
    pub maintenance_interval: std::time::Duration,
}

impl Config {
    pub const DEFAULT_K: usize = 20;
    pub const DEFAULT_ALPHA: usize = 3;
}

impl Default for Config {
    fn default() -> Self {
        Self {
            k: Self::DEFAULT_K,
            alpha: Self::DEFAULT_ALPHA,
            max_ping_interval: Duration::minutes(15),
            bucket_refresh_age: Duration::hours(1),
            rpc_timeout: std::time::Duration::from_secs(15),
            maintenance_interval: std::time::Duration::from_secs(60),
        }
    }
}
