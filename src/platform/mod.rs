//! Platform abstraction: strategies, scrapers, and the error taxonomy.
//!
//! A [`Strategy`] is one independent way of acquiring product data (static
//! HTML, internal GraphQL API, headless browser). A [`Scraper`] is the
//! platform-facing surface that coordinates strategies. Both are async trait
//! objects so orchestrators and tests can mix real and fake implementations.

mod context;
mod registry;

pub use context::{CallContext, ProgressFn};
pub use registry::Registry;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::models::Product;
use crate::stealth::StealthError;

/// The operations a strategy may be asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Search,
    Trending,
    ProductDetail,
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestKind::Search => write!(f, "search"),
            RequestKind::Trending => write!(f, "trending"),
            RequestKind::ProductDetail => write!(f, "product-detail"),
        }
    }
}

/// A single acquisition request. Immutable once constructed for a call.
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub kind: RequestKind,
    pub keyword: String,
    pub url: String,
    pub page: u32,
    pub limit: u32,
}

impl ScrapeRequest {
    pub fn search(keyword: impl Into<String>, page: u32, limit: u32) -> Self {
        Self {
            kind: RequestKind::Search,
            keyword: keyword.into(),
            url: String::new(),
            page,
            limit,
        }
    }

    pub fn trending(keyword: impl Into<String>, limit: u32) -> Self {
        Self {
            kind: RequestKind::Trending,
            keyword: keyword.into(),
            url: String::new(),
            page: 1,
            limit,
        }
    }

    pub fn product_detail(url: impl Into<String>) -> Self {
        Self {
            kind: RequestKind::ProductDetail,
            keyword: String::new(),
            url: url.into(),
            page: 1,
            limit: 1,
        }
    }
}

/// What a strategy hands back on success.
#[derive(Debug, Clone, Default)]
pub struct StrategyOutcome {
    pub products: Vec<Product>,
    pub total_data: u32,
    pub strategy: String,
    /// Raw upstream payload, kept for debugging and downstream inspection.
    pub raw: Option<Value>,
}

/// One recorded strategy failure, used for exhaustion attribution.
#[derive(Debug, Clone)]
pub struct StrategyFailure {
    pub strategy: String,
    pub cause: String,
}

impl std::fmt::Display for StrategyFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.strategy, self.cause)
    }
}

/// Every failure collected during a race + fallback run.
#[derive(Debug, Clone, Default)]
pub struct StrategyFailures(pub Vec<StrategyFailure>);

impl StrategyFailures {
    pub fn record(&mut self, strategy: impl Into<String>, cause: impl Into<String>) {
        self.0.push(StrategyFailure {
            strategy: strategy.into(),
            cause: cause.into(),
        });
    }
}

impl std::fmt::Display for StrategyFailures {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return write!(f, "no strategies configured");
        }
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

/// Error taxonomy shared across strategies and orchestrators.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// robots.txt disallowed the target path. Terminal, never retried.
    #[error("blocked by robots.txt: {0}")]
    PolicyBlocked(String),
    /// Caller or race-internal cancellation fired.
    #[error("operation canceled")]
    Canceled,
    /// Underlying transport failure (network/DNS/TLS).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
    /// Strategy asked to perform an operation it does not implement.
    #[error("{strategy} strategy does not support {kind} requests")]
    Unsupported {
        strategy: &'static str,
        kind: RequestKind,
    },
    /// Strategy completed without error but produced nothing usable.
    /// Treated as a soft failure for racing/fallback, never surfaced alone.
    #[error("{strategy}: no product data found")]
    NoData { strategy: String },
    /// Upstream API rejected the call (non-2xx or an in-band error code).
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("headless browser error: {0}")]
    Headless(String),
    #[error("platform {0:?} not registered")]
    NotRegistered(String),
    #[error("no product found for: {0}")]
    NotFound(String),
    /// Every fast and slow strategy failed. Carries full attribution.
    #[error("all strategies exhausted: {0}")]
    Exhausted(StrategyFailures),
}

impl From<StealthError> for ScrapeError {
    fn from(err: StealthError) -> Self {
        match err {
            StealthError::PolicyBlocked(path) => ScrapeError::PolicyBlocked(path),
            StealthError::Canceled => ScrapeError::Canceled,
            StealthError::Http(e) => ScrapeError::Http(e),
            StealthError::Url(e) => ScrapeError::Url(e),
            err @ StealthError::UncloneableRequest => ScrapeError::Upstream(err.to_string()),
        }
    }
}

impl ScrapeError {
    /// True when retrying the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ScrapeError::Http(_))
    }
}

/// One independent method of acquiring product data.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Execute the request. Must reject unsupported [`RequestKind`]s with
    /// [`ScrapeError::Unsupported`] rather than guessing.
    async fn execute(
        &self,
        ctx: &CallContext,
        req: &ScrapeRequest,
    ) -> Result<StrategyOutcome, ScrapeError>;
}

/// Options for a single-page search.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchOptions {
    pub page: u32,
    pub limit: u32,
}

/// Options for a trending lookup.
#[derive(Debug, Clone, Default)]
pub struct TrendingOptions {
    pub category: Option<String>,
    pub limit: u32,
}

/// Platform-facing scraping surface.
#[async_trait]
pub trait Scraper: Send + Sync {
    async fn search(
        &self,
        ctx: &CallContext,
        keyword: &str,
        opts: SearchOptions,
    ) -> Result<Vec<Product>, ScrapeError>;

    async fn trending(
        &self,
        ctx: &CallContext,
        opts: TrendingOptions,
    ) -> Result<Vec<Product>, ScrapeError>;

    /// Fails with [`ScrapeError::NotFound`] when no product could be
    /// extracted from the page.
    async fn product_detail(&self, ctx: &CallContext, url: &str)
        -> Result<Product, ScrapeError>;
}

impl std::fmt::Debug for dyn Scraper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Scraper")
    }
}
