//! Static page strategy: plain GET plus JSON-LD structured data.
//!
//! Fast path that works whenever the server still embeds
//! `application/ld+json` blocks in the initial HTML. No JS execution.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;

use crate::httputil::{browser_headers, send_with_retry};
use crate::models::Product;
use crate::platform::{
    CallContext, RequestKind, ScrapeError, ScrapeRequest, Strategy, StrategyOutcome,
};
use crate::stealth::StealthTransport;

use super::graphql::{de_flex_i64, de_flex_u32};
use super::queries::search_page_url;

const STRATEGY_NAME: &str = "static";
const MAX_RETRIES: u32 = 2;

pub struct StaticPageStrategy {
    transport: Arc<StealthTransport>,
    http: reqwest::Client,
}

impl StaticPageStrategy {
    pub fn new(transport: Arc<StealthTransport>) -> Self {
        Self {
            transport,
            http: reqwest::Client::new(),
        }
    }

    async fn fetch_and_extract(
        &self,
        ctx: &CallContext,
        url: &str,
    ) -> Result<StrategyOutcome, ScrapeError> {
        let request = self
            .http
            .get(url)
            .headers(browser_headers())
            .build()?;
        let resp = send_with_retry(&self.transport, &request, MAX_RETRIES, ctx.cancel_token())
            .await?;
        let body = resp.text().await?;

        let products = extract_json_ld(&body, STRATEGY_NAME);
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

#[async_trait]
impl Strategy for StaticPageStrategy {
    fn name(&self) -> &'static str {
        STRATEGY_NAME
    }

    async fn execute(
        &self,
        ctx: &CallContext,
        req: &ScrapeRequest,
    ) -> Result<StrategyOutcome, ScrapeError> {
        match req.kind {
            RequestKind::Search => {
                let url = search_page_url(&req.keyword, req.page.max(1));
                self.fetch_and_extract(ctx, &url).await
            }
            RequestKind::ProductDetail => self.fetch_and_extract(ctx, &req.url).await,
            kind => Err(ScrapeError::Unsupported {
                strategy: STRATEGY_NAME,
                kind,
            }),
        }
    }
}

/// Pull every `Product` (and `ItemList` of products) out of the page's
/// JSON-LD script blocks. Malformed blocks are skipped, not fatal.
pub(super) fn extract_json_ld(html: &str, strategy: &str) -> Vec<Product> {
    let doc = Html::parse_document(html);
    let selector =
        Selector::parse(r#"script[type="application/ld+json"]"#).expect("static selector");

    let mut products = Vec::new();
    for script in doc.select(&selector) {
        let text: String = script.text().collect();
        products.extend(parse_json_ld_block(text.trim(), strategy));
    }
    products
}

fn parse_json_ld_block(data: &str, strategy: &str) -> Vec<Product> {
    if let Ok(item) = serde_json::from_str::<LdItem>(data) {
        if let Some(p) = item.to_product(strategy) {
            return vec![p];
        }
        if item.kind == "ItemList" {
            return item
                .item_list_element
                .into_iter()
                .filter_map(|e| e.item.and_then(|i| i.to_product(strategy)))
                .collect();
        }
    }
    if let Ok(items) = serde_json::from_str::<Vec<LdItem>>(data) {
        return items
            .into_iter()
            .filter_map(|i| i.to_product(strategy))
            .collect();
    }
    Vec::new()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LdItem {
    #[serde(rename = "@type")]
    kind: String,
    name: String,
    url: String,
    image: Value,
    offers: Option<LdOffer>,
    #[serde(rename = "aggregateRating")]
    aggregate_rating: Option<LdRating>,
    #[serde(rename = "itemListElement")]
    item_list_element: Vec<LdListElement>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LdOffer {
    #[serde(deserialize_with = "de_flex_i64")]
    price: i64,
    seller: Option<LdSeller>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LdSeller {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LdRating {
    #[serde(rename = "ratingValue", deserialize_with = "de_flex_f64")]
    rating_value: f64,
    #[serde(rename = "reviewCount", deserialize_with = "de_flex_u32")]
    review_count: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LdListElement {
    item: Option<LdItem>,
}

fn de_flex_f64<'de, D>(d: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

impl LdItem {
    fn to_product(&self, strategy: &str) -> Option<Product> {
        if self.kind != "Product" {
            return None;
        }

        let mut p = Product {
            name: self.name.clone(),
            url: self.url.clone(),
            platform: "tokopedia".to_string(),
            scraped_at: Utc::now(),
            strategy: strategy.to_string(),
            ..Product::default()
        };

        if let Some(ref offer) = self.offers {
            p.price = offer.price;
            if let Some(ref seller) = offer.seller {
                p.shop.name = seller.name.clone();
            }
        }
        if let Some(ref rating) = self.aggregate_rating {
            p.rating = rating.rating_value;
            p.review_count = rating.review_count;
        }
        p.image_url = match &self.image {
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .first()
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            _ => String::new(),
        };

        Some(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRODUCT_PAGE: &str = r#"<html><head>
        <script type="application/ld+json">
        {
            "@type": "Product",
            "name": "Sepatu Anak Premium",
            "url": "https://www.tokopedia.com/toko/sepatu-anak",
            "image": ["https://images.tokopedia.net/p/1.jpg"],
            "offers": {"@type": "Offer", "price": 1234567, "priceCurrency": "IDR",
                       "seller": {"@type": "Organization", "name": "Toko Sepatu"}},
            "aggregateRating": {"ratingValue": "4.8", "reviewCount": 87}
        }
        </script>
        <script type="application/ld+json">{"@type": "BreadcrumbList"}</script>
        </head><body></body></html>"#;

    const LIST_PAGE: &str = r#"<html><head>
        <script type="application/ld+json">
        {
            "@type": "ItemList",
            "itemListElement": [
                {"@type": "ListItem", "item": {"@type": "Product", "name": "A",
                    "url": "https://t/p/a", "offers": {"price": "10000"}}},
                {"@type": "ListItem", "item": {"@type": "Product", "name": "B",
                    "url": "https://t/p/b", "offers": {"price": 20000}}}
            ]
        }
        </script>
        </head><body></body></html>"#;

    #[test]
    fn extracts_a_single_product_block() {
        let products = extract_json_ld(PRODUCT_PAGE, "static");
        assert_eq!(products.len(), 1);
        let p = &products[0];
        assert_eq!(p.name, "Sepatu Anak Premium");
        assert_eq!(p.price, 1_234_567);
        assert_eq!(p.shop.name, "Toko Sepatu");
        assert_eq!(p.rating, 4.8);
        assert_eq!(p.review_count, 87);
        assert_eq!(p.image_url, "https://images.tokopedia.net/p/1.jpg");
        assert_eq!(p.strategy, "static");
    }

    #[test]
    fn extracts_every_product_from_an_item_list() {
        let products = extract_json_ld(LIST_PAGE, "static");
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].name, "A");
        assert_eq!(products[0].price, 10_000);
        assert_eq!(products[1].price, 20_000);
    }

    #[test]
    fn pages_without_structured_data_yield_nothing() {
        assert!(extract_json_ld("<html><body>plain</body></html>", "static").is_empty());
        assert!(extract_json_ld(
            r#"<script type="application/ld+json">not json</script>"#,
            "static"
        )
        .is_empty());
    }

    #[tokio::test]
    async fn trending_is_unsupported() {
        let strategy = StaticPageStrategy::new(Arc::new(StealthTransport::builder().build()));
        let ctx = CallContext::new();
        let req = ScrapeRequest::trending("toys", 10);
        match strategy.execute(&ctx, &req).await {
            Err(ScrapeError::Unsupported { strategy, kind }) => {
                assert_eq!(strategy, "static");
                assert_eq!(kind, RequestKind::Trending);
            }
            other => panic!("expected Unsupported, got {other:?}"),
        }
    }
}
