//! End-to-end tests of the public API: strategy chain, registry wiring, and
//! progress reporting, using scripted strategies in place of the network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use marketscrape::config::Config;
use marketscrape::{
    CallContext, Product, ScrapeError, ScrapeRequest, Scraper, SearchOptions, Strategy,
    StrategyOutcome, TokopediaScraper, TrendingOptions,
};

struct Scripted {
    name: &'static str,
    delay: Duration,
    products: usize,
    fail_with: Option<&'static str>,
    calls: AtomicUsize,
}

impl Scripted {
    fn ok(name: &'static str, delay: Duration, products: usize) -> Arc<Self> {
        Arc::new(Self {
            name,
            delay,
            products,
            fail_with: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(name: &'static str, delay: Duration, cause: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            delay,
            products: 0,
            fail_with: Some(cause),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Strategy for Scripted {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn execute(
        &self,
        _ctx: &CallContext,
        _req: &ScrapeRequest,
    ) -> Result<StrategyOutcome, ScrapeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if let Some(cause) = self.fail_with {
            return Err(ScrapeError::Upstream(cause.to_string()));
        }
        Ok(StrategyOutcome {
            products: (0..self.products)
                .map(|i| Product {
                    id: format!("{}-{i}", self.name),
                    name: format!("product {i}"),
                    strategy: self.name.to_string(),
                    ..Product::default()
                })
                .collect(),
            total_data: self.products as u32,
            strategy: self.name.to_string(),
            raw: None,
        })
    }
}

#[tokio::test(start_paused = true)]
async fn race_winner_preempts_slower_strategies_and_the_fallback() {
    let quick = Scripted::ok("quick", Duration::from_millis(20), 3);
    let laggard = Scripted::ok("laggard", Duration::from_secs(9), 8);
    let fallback = Scripted::ok("fallback", Duration::from_millis(1), 1);

    let scraper = TokopediaScraper::with_strategies(
        vec![quick, laggard],
        vec![fallback.clone()],
        None,
        4,
    );

    let products = scraper
        .search(&CallContext::new(), "sepatu", SearchOptions::default())
        .await
        .unwrap();

    assert_eq!(products.len(), 3);
    assert!(products.iter().all(|p| p.strategy == "quick"));
    assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn exhausted_chain_reports_every_attempt() {
    let a = Scripted::failing("static", Duration::from_millis(1), "http error");
    let b = Scripted::failing("graphql", Duration::from_millis(1), "responseCode 1");
    let c = Scripted::failing("headless", Duration::from_millis(1), "browser missing");

    let scraper = TokopediaScraper::with_strategies(vec![a, b], vec![c], None, 4);
    let err = scraper
        .trending(&CallContext::new(), TrendingOptions::default())
        .await
        .unwrap_err();

    match err {
        ScrapeError::Exhausted(ref failures) => {
            let names: Vec<&str> = failures.0.iter().map(|f| f.strategy.as_str()).collect();
            assert!(names.contains(&"static"));
            assert!(names.contains(&"graphql"));
            assert!(names.contains(&"headless"));
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn progress_callback_observes_phase_transitions() {
    let broken = Scripted::failing("broken", Duration::from_millis(1), "down");
    let rescue = Scripted::ok("rescue", Duration::from_millis(1), 1);
    let scraper = TokopediaScraper::with_strategies(vec![broken], vec![rescue], None, 4);

    let seen: Arc<Mutex<Vec<String>>> = Arc::default();
    let sink = seen.clone();
    let ctx = CallContext::new().with_progress(move |msg| sink.lock().unwrap().push(msg.into()));

    scraper
        .search(&ctx, "sepatu", SearchOptions::default())
        .await
        .unwrap();

    let messages = seen.lock().unwrap().join("\n");
    assert!(messages.contains("racing 1 fast strategies"), "{messages}");
    assert!(messages.contains("broken"), "{messages}");
    assert!(messages.contains("falling back"), "{messages}");
    assert!(messages.contains("rescue"), "{messages}");
}

#[tokio::test(start_paused = true)]
async fn registry_round_trip_through_the_scraper_trait() {
    let fast = Scripted::ok("quick", Duration::from_millis(1), 2);
    let scraper = TokopediaScraper::with_strategies(vec![fast], vec![], None, 4);

    let registry = marketscrape::Registry::new();
    registry.register("tokopedia", Arc::new(scraper));

    let fetched = registry.get("tokopedia").unwrap();
    let products = fetched
        .search(&CallContext::new(), "sepatu", SearchOptions::default())
        .await
        .unwrap();
    assert_eq!(products.len(), 2);

    assert!(matches!(
        registry.get("shopee"),
        Err(ScrapeError::NotRegistered(_))
    ));
}

#[test]
fn config_builds_a_fully_wired_scraper() {
    let registry = Config::default().build_registry();
    assert!(registry.get("tokopedia").is_ok());
}
