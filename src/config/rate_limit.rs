use tower_governor::governor::{GovernorConfig, GovernorConfigBuilder};
use tower_governor::key_extractor::PeerIpKeyExtractor;

/// Rate limit configuration for the anonymous identity endpoints
/// (self-register, forgot-password, confirmations, token issuance).
///
/// Disabled by default so local development and the in-process test suite
/// are unaffected; enable via `RATE_LIMIT_ENABLED` in deployments.
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Requests per second for anonymous endpoints
    pub anonymous_per_second: u64,
    /// Burst size for anonymous endpoints
    pub anonymous_burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            anonymous_per_second: 2,
            anonymous_burst_size: 5,
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        Self {
            enabled: std::env::var("RATE_LIMIT_ENABLED")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false),
            anonymous_per_second: std::env::var("RATE_LIMIT_ANONYMOUS_PER_SECOND")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2),
            anonymous_burst_size: std::env::var("RATE_LIMIT_ANONYMOUS_BURST_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
        }
    }

    /// Create GovernorConfig for the anonymous endpoints
    pub fn anonymous_governor_config(
        &self,
    ) -> GovernorConfig<PeerIpKeyExtractor, ::governor::middleware::NoOpMiddleware> {
        GovernorConfigBuilder::default()
            .per_second(self.anonymous_per_second)
            .burst_size(self.anonymous_burst_size)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .expect("Failed to build anonymous rate limiter config")
    }
}
