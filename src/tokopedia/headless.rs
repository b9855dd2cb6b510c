//! Headless browser strategy: full JS rendering via Chromium.
//!
//! Slow fallback for when the server withholds structured data from plain
//! HTTP clients. Launches a fresh headless Chromium per call, renders the
//! page, and extracts JSON-LD, falling back to scanning embedded script
//! product arrays.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;

use crate::models::Product;
use crate::platform::{
    CallContext, RequestKind, ScrapeError, ScrapeRequest, Strategy, StrategyOutcome,
};

use super::graphql::RawProduct;
use super::queries::search_page_url;
use super::static_page::extract_json_ld;

const STRATEGY_NAME: &str = "headless";
const RENDER_TIMEOUT: Duration = Duration::from_secs(15);

const SCRIPT_SCAN_JS: &str = r#"() => {
    const scripts = document.querySelectorAll('script');
    for (const script of scripts) {
        const text = script.textContent;
        if (text.includes('"products"') || text.includes('"product_name"')) {
            return text;
        }
    }
    return '';
}"#;

#[derive(Debug, Default)]
pub struct HeadlessBrowserStrategy {
    executable: Option<PathBuf>,
}

impl HeadlessBrowserStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific Chromium binary instead of autodetection.
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    async fn render(&self, url: &str) -> Result<RenderedPage, ScrapeError> {
        let mut builder = BrowserConfig::builder()
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .window_size(1920, 1080);
        if let Some(ref bin) = self.executable {
            builder = builder.chrome_executable(bin);
        }
        let config = builder.build().map_err(ScrapeError::Headless)?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScrapeError::Headless(format!("launch browser: {e}")))?;
        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let rendered = tokio::time::timeout(RENDER_TIMEOUT, async {
            let page = browser
                .new_page(url)
                .await
                .map_err(|e| ScrapeError::Headless(format!("open page: {e}")))?;
            let _ = page.wait_for_navigation().await;

            let html: String = page
                .evaluate("document.documentElement.outerHTML")
                .await
                .map_err(|e| ScrapeError::Headless(format!("get page HTML: {e}")))?
                .into_value()
                .map_err(|e| ScrapeError::Headless(format!("decode page HTML: {e:?}")))?;

            // Grab any embedded product blob while the page is still open,
            // so the caller can fall back without re-rendering.
            let script_blob: String = match page.evaluate(SCRIPT_SCAN_JS).await {
                Ok(result) => result.into_value().unwrap_or_default(),
                Err(_) => String::new(),
            };

            Ok::<_, ScrapeError>(RenderedPage { html, script_blob })
        })
        .await;

        let _ = browser.close().await;
        events.abort();

        match rendered {
            Ok(result) => result,
            Err(_) => Err(ScrapeError::Headless(format!(
                "render of {url} timed out after {}s",
                RENDER_TIMEOUT.as_secs()
            ))),
        }
    }

    async fn scrape(&self, ctx: &CallContext, url: &str) -> Result<Vec<Product>, ScrapeError> {
        let page = tokio::select! {
            biased;
            _ = ctx.cancel_token().cancelled() => return Err(ScrapeError::Canceled),
            page = self.render(url) => page?,
        };

        let products = extract_json_ld(&page.html, STRATEGY_NAME);
        if !products.is_empty() {
            return Ok(products);
        }

        log::debug!("no JSON-LD in rendered {url}, scanning embedded scripts");
        products_from_script(&page.script_blob)
    }
}

struct RenderedPage {
    html: String,
    script_blob: String,
}

#[async_trait]
impl Strategy for HeadlessBrowserStrategy {
    fn name(&self) -> &'static str {
        STRATEGY_NAME
    }

    async fn execute(
        &self,
        ctx: &CallContext,
        req: &ScrapeRequest,
    ) -> Result<StrategyOutcome, ScrapeError> {
        let url = match req.kind {
            RequestKind::Search | RequestKind::Trending => {
                search_page_url(&req.keyword, req.page.max(1))
            }
            RequestKind::ProductDetail => req.url.clone(),
        };

        let products = self.scrape(ctx, &url).await?;
        if products.is_empty() {
            return Err(ScrapeError::NoData {
                strategy: STRATEGY_NAME.to_string(),
            });
        }

        Ok(StrategyOutcome {
            products,
            total_data: 0,
            strategy: STRATEGY_NAME.to_string(),
            raw: None,
        })
    }
}

/// Parse the first `"products":[...]` array embedded in a script blob.
fn products_from_script(content: &str) -> Result<Vec<Product>, ScrapeError> {
    let anchor = content.find(r#""products":["#).ok_or_else(|| ScrapeError::NoData {
        strategy: STRATEGY_NAME.to_string(),
    })?;
    let start = anchor + r#""products":"#.len();

    let bytes = content.as_bytes();
    let mut depth = 0usize;
    let mut end = start;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        match b {
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    end = i + 1;
                    break;
                }
            }
            _ => {}
        }
    }
    if end <= start {
        return Err(ScrapeError::Headless("malformed products array".into()));
    }

    let raw_products: Vec<serde_json::Value> = serde_json::from_str(&content[start..end])?;
    let products: Vec<Product> = raw_products
        .into_iter()
        .filter_map(|v| serde_json::from_value::<RawProduct>(v).ok())
        .filter(|rp| !rp.name.is_empty())
        .map(|rp| rp.into_product(STRATEGY_NAME))
        .collect();

    if products.is_empty() {
        return Err(ScrapeError::NoData {
            strategy: STRATEGY_NAME.to_string(),
        });
    }
    Ok(products)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_products_from_an_embedded_script_blob() {
        let blob = r#"window.__cache={"search":{"products":[
            {"id":1,"name":"Sepatu","price":"Rp10.000","imageUrl":"https://i/1.jpg",
             "url":"https://t/p/1","shop":{"id":7,"name":"Toko","city":"Jakarta"}},
            {"id":2,"name":"","price":"Rp5.000"},
            {"id":3,"name":"Sandal","price":"Rp20.000"}
        ],"count":3}};"#;

        let products = products_from_script(blob).unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].name, "Sepatu");
        assert_eq!(products[0].price, 10_000);
        assert_eq!(products[0].shop.city, "Jakarta");
        assert_eq!(products[0].strategy, "headless");
        assert_eq!(products[1].name, "Sandal");
    }

    #[test]
    fn blob_without_a_products_array_is_no_data() {
        assert!(matches!(
            products_from_script("window.__cache={}"),
            Err(ScrapeError::NoData { .. })
        ));
    }

    #[test]
    fn nested_arrays_inside_products_do_not_truncate_the_scan() {
        let blob = r#"{"products":[{"id":1,"name":"A","labelGroups":[{"title":"x"}]}]}"#;
        let products = products_from_script(blob).unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].labels.len(), 1);
    }

    #[tokio::test]
    async fn cancellation_preempts_the_render() {
        let strategy = HeadlessBrowserStrategy::new();
        let ctx = CallContext::new();
        ctx.cancel_token().cancel();
        let req = ScrapeRequest::search("sepatu", 1, 20);
        match strategy.execute(&ctx, &req).await {
            Err(ScrapeError::Canceled) => {}
            other => panic!("expected Canceled, got {other:?}"),
        }
    }
}
