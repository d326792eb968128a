//! Rate Limiting
//!
//! Quota awareness for the platforms that publish one. A
//! [`RateLimitMonitor`] probes a platform's live quota; the
//! [`RateLimitService`] gates every fetch round on the result, treating
//! disabled config, missing credentials, unmonitored platforms, and failed
//! probes all as reasons to proceed rather than block.

pub mod monitor;
pub mod service;
pub mod types;

pub use monitor::RateLimitMonitor;
pub use service::RateLimitService;
pub use types::{RateLimitConfig, RateLimitStatus};
