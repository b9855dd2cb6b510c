//! Tokopedia scraper: races fast acquisition strategies, falls back to the
//! headless browser, and attributes every failure when everything loses.

mod graphql;
mod headless;
mod queries;
mod static_page;

pub use graphql::GraphQLStrategy;
pub use headless::HeadlessBrowserStrategy;
pub use queries::{
    build_search_params, search_page_url, SORT_BEST_MATCH, SORT_BEST_SELLER, SORT_NEWEST,
    SORT_PRICE_ASC, SORT_PRICE_DESC,
};
pub use static_page::StaticPageStrategy;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Semaphore};

use crate::models::Product;
use crate::platform::{
    CallContext, ScrapeError, ScrapeRequest, Scraper, SearchOptions, Strategy, StrategyFailures,
    StrategyOutcome, TrendingOptions,
};
use crate::stealth::{RateLimiter, StealthTransport};

const DEFAULT_RACE_WINDOW: Duration = Duration::from_secs(10);
const DEFAULT_LIMIT: u32 = 20;

/// Multi-strategy orchestrator for Tokopedia.
///
/// Fast strategies (static HTML, GraphQL) are raced concurrently; the first
/// non-empty success wins and cancels the rest. When all of them fail, or
/// the race window elapses, slow strategies (headless browser) run
/// sequentially in order. Strategy lists are fixed at construction.
#[derive(Clone)]
pub struct TokopediaScraper {
    fast: Vec<Arc<dyn Strategy>>,
    slow: Vec<Arc<dyn Strategy>>,
    limiter: Option<Arc<RateLimiter>>,
    max_concurrent: usize,
    race_window: Duration,
}

impl TokopediaScraper {
    /// Scraper with the full default strategy chain.
    pub fn new(
        transport: Arc<StealthTransport>,
        limiter: Option<Arc<RateLimiter>>,
        max_concurrent: usize,
    ) -> Self {
        Self::with_strategies(
            vec![
                Arc::new(StaticPageStrategy::new(transport.clone())),
                Arc::new(GraphQLStrategy::new(transport)),
            ],
            vec![Arc::new(HeadlessBrowserStrategy::new())],
            limiter,
            max_concurrent,
        )
    }

    /// Scraper with explicit strategy lists, mainly for tests and custom
    /// chains.
    pub fn with_strategies(
        fast: Vec<Arc<dyn Strategy>>,
        slow: Vec<Arc<dyn Strategy>>,
        limiter: Option<Arc<RateLimiter>>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            fast,
            slow,
            limiter,
            max_concurrent: max_concurrent.max(1),
            race_window: DEFAULT_RACE_WINDOW,
        }
    }

    pub fn with_race_window(mut self, window: Duration) -> Self {
        self.race_window = window;
        self
    }

    pub async fn search(
        &self,
        ctx: &CallContext,
        keyword: &str,
        opts: SearchOptions,
    ) -> Result<Vec<Product>, ScrapeError> {
        let req = ScrapeRequest::search(
            keyword,
            opts.page.max(1),
            if opts.limit == 0 { DEFAULT_LIMIT } else { opts.limit },
        );
        self.execute_with_fallback(ctx, &req).await
    }

    pub async fn trending(
        &self,
        ctx: &CallContext,
        opts: TrendingOptions,
    ) -> Result<Vec<Product>, ScrapeError> {
        let keyword = opts.category.as_deref().unwrap_or("trending");
        let req = ScrapeRequest::trending(
            keyword,
            if opts.limit == 0 { DEFAULT_LIMIT } else { opts.limit },
        );
        self.execute_with_fallback(ctx, &req).await
    }

    pub async fn product_detail(
        &self,
        ctx: &CallContext,
        url: &str,
    ) -> Result<Product, ScrapeError> {
        let req = ScrapeRequest::product_detail(url);
        let products = self.execute_with_fallback(ctx, &req).await?;
        products
            .into_iter()
            .next()
            .ok_or_else(|| ScrapeError::NotFound(url.to_string()))
    }

    /// Fetch `pages` result pages concurrently, at most `max_concurrent` in
    /// flight, and concatenate them in page order. The first page failure
    /// cancels the remaining work and is returned.
    pub async fn search_all(
        &self,
        ctx: &CallContext,
        keyword: &str,
        pages: u32,
        per_page: u32,
    ) -> Result<Vec<Product>, ScrapeError> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let fan_ctx = ctx.child();

        let mut handles = Vec::with_capacity(pages as usize);
        for page in 1..=pages {
            let semaphore = semaphore.clone();
            let scraper = self.clone();
            let fan_ctx = fan_ctx.clone();
            let keyword = keyword.to_string();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| ScrapeError::Canceled)?;
                if fan_ctx.is_cancelled() {
                    return Err(ScrapeError::Canceled);
                }
                if let Some(ref limiter) = scraper.limiter {
                    limiter.wait(fan_ctx.cancel_token()).await?;
                }
                scraper
                    .search(
                        &fan_ctx,
                        &keyword,
                        SearchOptions {
                            page,
                            limit: per_page,
                        },
                    )
                    .await
            }));
        }

        // Awaiting in spawn order keeps the concatenation page-ordered.
        let mut results = Vec::with_capacity(pages as usize);
        let mut first_error = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(products)) => results.push(products),
                Ok(Err(err)) => {
                    if first_error.is_none() {
                        fan_ctx.cancel_token().cancel();
                        first_error = Some(err);
                    }
                }
                Err(join_err) => {
                    if first_error.is_none() {
                        fan_ctx.cancel_token().cancel();
                        first_error = Some(ScrapeError::Upstream(format!(
                            "search task failed: {join_err}"
                        )));
                    }
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(results.into_iter().flatten().collect()),
        }
    }

    async fn execute_with_fallback(
        &self,
        ctx: &CallContext,
        req: &ScrapeRequest,
    ) -> Result<Vec<Product>, ScrapeError> {
        let mut failures = StrategyFailures::default();

        if !self.fast.is_empty() {
            if let Some(outcome) = self.race_fast(ctx, req, &mut failures).await? {
                return Ok(outcome.products);
            }
        }

        ctx.report("falling back to slow strategies");
        for strategy in &self.slow {
            if ctx.is_cancelled() {
                return Err(ScrapeError::Canceled);
            }
            ctx.report(format!("trying slow strategy: {}", strategy.name()));
            match strategy.execute(ctx, req).await {
                Ok(outcome) if !outcome.products.is_empty() => {
                    log::debug!(
                        "strategy {} succeeded with {} products",
                        strategy.name(),
                        outcome.products.len()
                    );
                    ctx.report(format!("strategy {} succeeded", strategy.name()));
                    return Ok(outcome.products);
                }
                Ok(_) => failures.record(strategy.name(), "no product data"),
                Err(ScrapeError::Canceled) => return Err(ScrapeError::Canceled),
                Err(err) => {
                    log::warn!("strategy {} failed: {err}", strategy.name());
                    failures.record(strategy.name(), err.to_string());
                }
            }
        }

        Err(ScrapeError::Exhausted(failures))
    }

    /// Race every fast strategy. Returns the first non-empty success, or
    /// `None` once all have soft-failed or the race window elapsed, with
    /// each failure recorded. Caller cancellation surfaces immediately.
    async fn race_fast(
        &self,
        ctx: &CallContext,
        req: &ScrapeRequest,
        failures: &mut StrategyFailures,
    ) -> Result<Option<StrategyOutcome>, ScrapeError> {
        ctx.report(format!("racing {} fast strategies", self.fast.len()));
        let race_ctx = ctx.child();

        // Capacity equals the racer count, so losers deposit without ever
        // blocking and simply vanish when the receiver is dropped.
        let (tx, mut rx) = mpsc::channel(self.fast.len());
        for strategy in &self.fast {
            let strategy = strategy.clone();
            let race_ctx = race_ctx.clone();
            let limiter = self.limiter.clone();
            let req = req.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = async {
                    if let Some(limiter) = limiter {
                        limiter.wait(race_ctx.cancel_token()).await?;
                    }
                    strategy.execute(&race_ctx, &req).await
                }
                .await;
                let _ = tx.try_send((strategy.name(), result));
            });
        }
        drop(tx);

        let window = tokio::time::sleep(self.race_window);
        tokio::pin!(window);
        let mut pending = self.fast.len();

        let winner = loop {
            tokio::select! {
                biased;
                _ = ctx.cancel_token().cancelled() => {
                    race_ctx.cancel_token().cancel();
                    return Err(ScrapeError::Canceled);
                }
                _ = &mut window => {
                    failures.record(
                        "race",
                        format!(
                            "fast strategies timed out after {}s",
                            self.race_window.as_secs()
                        ),
                    );
                    break None;
                }
                msg = rx.recv() => match msg {
                    Some((name, Ok(outcome))) if !outcome.products.is_empty() => {
                        break Some((name, outcome));
                    }
                    Some((name, Ok(_))) => {
                        // Empty result counts as a failure for racing.
                        failures.record(name, "no product data");
                        ctx.report(format!("strategy {name} returned nothing"));
                        pending -= 1;
                        if pending == 0 {
                            break None;
                        }
                    }
                    Some((name, Err(err))) => {
                        log::debug!("strategy {name} failed: {err}");
                        failures.record(name, err.to_string());
                        ctx.report(format!("strategy {name} failed"));
                        pending -= 1;
                        if pending == 0 {
                            break None;
                        }
                    }
                    None => break None,
                },
            }
        };

        race_ctx.cancel_token().cancel();
        Ok(winner.map(|(name, outcome)| {
            log::debug!(
                "strategy {name} won the race with {} products",
                outcome.products.len()
            );
            ctx.report(format!("strategy {name} succeeded"));
            outcome
        }))
    }
}

#[async_trait]
impl Scraper for TokopediaScraper {
    async fn search(
        &self,
        ctx: &CallContext,
        keyword: &str,
        opts: SearchOptions,
    ) -> Result<Vec<Product>, ScrapeError> {
        TokopediaScraper::search(self, ctx, keyword, opts).await
    }

    async fn trending(
        &self,
        ctx: &CallContext,
        opts: TrendingOptions,
    ) -> Result<Vec<Product>, ScrapeError> {
        TokopediaScraper::trending(self, ctx, opts).await
    }

    async fn product_detail(
        &self,
        ctx: &CallContext,
        url: &str,
    ) -> Result<Product, ScrapeError> {
        TokopediaScraper::product_detail(self, ctx, url).await
    }
}
