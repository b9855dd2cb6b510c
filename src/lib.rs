//! # marketscrape
//!
//! Marketplace product scraping under adversarial conditions.
//!
//! Every outbound request goes through a stealth pipeline (fingerprint
//! rotation, robots.txt policy, shared rate limiting, human-like pacing,
//! proxy rotation), and every scrape runs a multi-strategy chain: fast
//! acquisition methods are raced concurrently, a headless browser picks up
//! the pieces when they all lose, and a failure carries the name and cause
//! of every strategy that was tried.
//!
//! ## Features
//!
//! - Fast async HTTP transport with browser fingerprint rotation
//! - robots.txt compliance with per-domain caching (fail-open)
//! - Shared token-bucket rate limiting and human-like delays
//! - Direct, residential-gateway, and custom proxy rotation
//! - Strategy racing with window timeout and ordered fallback
//! - Bounded-concurrency multi-page fan-out
//!
//! ## Example
//!
//! ```no_run
//! use marketscrape::config::Config;
//! use marketscrape::platform::{CallContext, SearchOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let scraper = Config::from_env().build_scraper();
//!     let ctx = CallContext::new();
//!     let products = scraper
//!         .search(&ctx, "sepatu anak", SearchOptions::default())
//!         .await?;
//!     println!("found {} products", products.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod httputil;
pub mod models;
pub mod platform;
pub mod stealth;
pub mod tokopedia;

pub use crate::models::{Label, Product, Shop};

pub use crate::platform::{
    CallContext,
    ProgressFn,
    Registry,
    RequestKind,
    ScrapeError,
    ScrapeRequest,
    Scraper,
    SearchOptions,
    Strategy,
    StrategyFailure,
    StrategyFailures,
    StrategyOutcome,
    TrendingOptions,
};

pub use crate::stealth::{
    DelayProfile,
    Fingerprint,
    FingerprintPool,
    HumanDelay,
    ProxyProvider,
    ProxyRotator,
    RateLimiter,
    RobotsChecker,
    StealthError,
    StealthTransport,
    StealthTransportBuilder,
};

pub use crate::tokopedia::TokopediaScraper;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
