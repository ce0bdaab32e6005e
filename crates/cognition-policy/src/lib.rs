//! Admission policy: per-key rate limiting and scope-based visibility.

mod ratelimit;
mod scope;

pub use ratelimit::{RateLimitConfig, RateLimiter};
pub use scope::{header_name_for_key, ScopeConfig, ScopeHarness};
