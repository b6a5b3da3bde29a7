use std::time::Duration;

/// Deadline for each individual request of a query.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// How long discovered peer addresses stay in the endpoint's peerstore.
pub const DEFAULT_PEERSTORE_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone)]
/// Per-query configuration.
pub struct QueryConfig {
    /// Maximum number of requests in flight or scheduled at once (α).
    ///
    /// Defaults to 3.
    pub concurrency: usize,
    /// Deadline for each individual request.
    ///
    /// The longer this duration is, the longer a query waits on busy
    /// nodes before moving on; the shorter it is, the more responses
    /// from slow nodes are dropped, which hurts how close to the target
    /// a lookup converges.
    ///
    /// Defaults to [DEFAULT_REQUEST_TIMEOUT].
    pub request_timeout: Duration,
    /// How long addresses discovered during the query stay in the
    /// endpoint's peerstore.
    ///
    /// Defaults to [DEFAULT_PEERSTORE_TTL].
    pub peerstore_ttl: Duration,
    /// How many peers to seed the frontier with from the routing table
    /// when the query starts.
    ///
    /// Defaults to 20.
    pub number_useful_closer_peers: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            peerstore_ttl: DEFAULT_PEERSTORE_TTL,
            number_useful_closer_peers: 20,
        }
    }
}
