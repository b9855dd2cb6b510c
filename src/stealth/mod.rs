//! Stealth transport pipeline.
//!
//! Disguises, paces, and routes outbound HTTP calls: fingerprint rotation,
//! robots.txt policy checks, shared rate limiting, human-like delays, and
//! proxy rotation, composed by [`StealthTransport`].

mod delay;
mod fingerprint;
mod proxy;
mod rate_limit;
mod robots;
mod transport;

pub use delay::{DelayProfile, HumanDelay};
pub use fingerprint::{Fingerprint, FingerprintPool};
pub use proxy::{
    DirectProxy, GenericProxy, ProxyProvider, ProxyRotator, ResidentialProxy, StickySession,
};
pub use rate_limit::RateLimiter;
pub use robots::{HttpRobotsFetcher, RobotsChecker, RobotsFetchError, RobotsFetcher, RobotsRules};
pub use transport::{StealthTransport, StealthTransportBuilder};

use thiserror::Error;

/// Errors surfaced by the stealth pipeline.
#[derive(Debug, Error)]
pub enum StealthError {
    /// robots.txt disallowed the path. Terminal; the request never leaves.
    #[error("blocked by robots.txt: {0}")]
    PolicyBlocked(String),
    /// The call's cancellation signal fired while waiting for a rate-limit
    /// token or a pacing delay.
    #[error("canceled")]
    Canceled,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    /// The caller handed over a request with a streaming body, which cannot
    /// be duplicated for the pipeline.
    #[error("request cannot be cloned for dispatch")]
    UncloneableRequest,
}
