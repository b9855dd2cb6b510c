//! GraphQL strategy: Tokopedia's internal search API.
//!
//! Fast path. One POST to the GraphQL gateway returns a full result page
//! with prices, labels, and shop data, no HTML parsing involved.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::httputil::{graphql_headers, send_with_retry};
use crate::models::{Label, Product, Shop};
use crate::platform::{
    CallContext, RequestKind, ScrapeError, ScrapeRequest, Strategy, StrategyOutcome,
};
use crate::stealth::StealthTransport;

use super::queries::{
    build_search_params, GRAPHQL_ENDPOINT, SEARCH_PRODUCT_QUERY, SORT_BEST_MATCH,
    SORT_BEST_SELLER,
};

const STRATEGY_NAME: &str = "graphql";
const MAX_RETRIES: u32 = 2;

pub struct GraphQLStrategy {
    transport: Arc<StealthTransport>,
    // Used only to assemble requests; dispatch goes through the transport.
    http: reqwest::Client,
}

impl GraphQLStrategy {
    pub fn new(transport: Arc<StealthTransport>) -> Self {
        Self {
            transport,
            http: reqwest::Client::new(),
        }
    }

    async fn run_search(
        &self,
        ctx: &CallContext,
        keyword: &str,
        page: u32,
        limit: u32,
        sort: u32,
    ) -> Result<StrategyOutcome, ScrapeError> {
        let params = build_search_params(keyword, page, limit, sort);
        let payload = serde_json::json!([{
            "operationName": "SearchProductQueryV4",
            "query": SEARCH_PRODUCT_QUERY,
            "variables": { "params": params },
        }]);

        let referer = super::queries::search_page_url(keyword, page);
        let request = self
            .http
            .post(GRAPHQL_ENDPOINT)
            .headers(graphql_headers(&referer))
            .json(&payload)
            .build()?;

        let resp = send_with_retry(&self.transport, &request, MAX_RETRIES, ctx.cancel_token())
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ScrapeError::Upstream(format!(
                "graphql response status {status}: {body}"
            )));
        }

        decode_search_response(&body)
    }
}

#[async_trait]
impl Strategy for GraphQLStrategy {
    fn name(&self) -> &'static str {
        STRATEGY_NAME
    }

    async fn execute(
        &self,
        ctx: &CallContext,
        req: &ScrapeRequest,
    ) -> Result<StrategyOutcome, ScrapeError> {
        let page = req.page.max(1);
        let limit = if req.limit == 0 { 20 } else { req.limit };
        match req.kind {
            RequestKind::Search => {
                self.run_search(ctx, &req.keyword, page, limit, SORT_BEST_MATCH)
                    .await
            }
            // Trending = best-seller ordering on the first page.
            RequestKind::Trending => {
                self.run_search(ctx, &req.keyword, 1, limit, SORT_BEST_SELLER)
                    .await
            }
            kind => Err(ScrapeError::Unsupported {
                strategy: STRATEGY_NAME,
                kind,
            }),
        }
    }
}

fn decode_search_response(body: &str) -> Result<StrategyOutcome, ScrapeError> {
    let raw: Value = serde_json::from_str(body)?;
    let envelopes: Vec<Envelope> = serde_json::from_str(body)?;
    let first = envelopes
        .into_iter()
        .next()
        .ok_or_else(|| ScrapeError::Upstream("empty graphql response".into()))?;

    let ace = first.data.ace_search_product_v4;
    if ace.header.response_code != 0 {
        return Err(ScrapeError::Upstream(format!(
            "graphql error responseCode {}: {}",
            ace.header.response_code, ace.header.error_message
        )));
    }

    let products = ace
        .data
        .products
        .into_iter()
        .map(|p| p.into_product(STRATEGY_NAME))
        .collect();

    Ok(StrategyOutcome {
        products,
        total_data: ace.header.total_data,
        strategy: STRATEGY_NAME.to_string(),
        raw: Some(raw),
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Envelope {
    data: EnvelopeData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EnvelopeData {
    ace_search_product_v4: AceSearch,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AceSearch {
    header: AceHeader,
    data: AceData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AceHeader {
    #[serde(rename = "totalData", deserialize_with = "de_flex_u32")]
    total_data: u32,
    #[serde(rename = "responseCode", deserialize_with = "de_flex_i64")]
    response_code: i64,
    #[serde(rename = "errorMessage")]
    error_message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AceData {
    products: Vec<RawProduct>,
}

/// Product shape used both by the GraphQL response and by the product
/// arrays embedded in rendered pages.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct RawProduct {
    #[serde(deserialize_with = "de_flex_string")]
    pub id: String,
    pub name: String,
    pub price: String,
    #[serde(rename = "originalPrice")]
    pub original_price: String,
    #[serde(rename = "priceRange")]
    pub price_range: String,
    #[serde(rename = "discountPercentage", deserialize_with = "de_flex_u32")]
    pub discount_percentage: u32,
    #[serde(rename = "categoryBreadcrumb")]
    pub category_breadcrumb: String,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
    pub url: String,
    #[serde(rename = "countReview", deserialize_with = "de_flex_u32")]
    pub count_review: u32,
    pub wishlist: bool,
    pub ads: RawAds,
    #[serde(rename = "labelGroups")]
    pub label_groups: Vec<RawLabelGroup>,
    pub shop: RawShop,
}

impl RawProduct {
    pub(super) fn into_product(self, strategy: &str) -> Product {
        let is_ad = !self.ads.id.is_empty() && self.ads.id != "0";
        let labels = self
            .label_groups
            .into_iter()
            .filter(|lg| !lg.title.is_empty())
            .map(|lg| Label {
                title: lg.title,
                position: lg.position,
                label_type: lg.label_type,
            })
            .collect();

        Product {
            id: self.id,
            name: self.name,
            price: parse_price(&self.price),
            original_price: parse_price(&self.original_price),
            price_range: self.price_range,
            discount_percent: self.discount_percentage,
            category: self.category_breadcrumb,
            image_url: self.image_url,
            url: self.url,
            review_count: self.count_review,
            is_ad,
            wishlist: self.wishlist,
            labels,
            platform: "tokopedia".to_string(),
            scraped_at: Utc::now(),
            strategy: strategy.to_string(),
            shop: Shop {
                id: self.shop.id,
                name: self.shop.name,
                city: self.shop.city,
                is_official: self.shop.is_official,
            },
            ..Product::default()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct RawAds {
    #[serde(deserialize_with = "de_flex_string")]
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct RawLabelGroup {
    pub position: String,
    pub title: String,
    #[serde(rename = "type")]
    pub label_type: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct RawShop {
    #[serde(deserialize_with = "de_flex_string")]
    pub id: String,
    pub name: String,
    pub city: String,
    #[serde(rename = "isOfficial")]
    pub is_official: bool,
}

/// Numeric price from display strings like "Rp100.000" or "Rp 1.234.567".
pub(super) fn parse_price(s: &str) -> i64 {
    s.bytes()
        .filter(u8::is_ascii_digit)
        .fold(0i64, |n, d| n * 10 + i64::from(d - b'0'))
}

// Tokopedia sends id/count fields sometimes as JSON numbers, sometimes as
// strings. These accept both.

pub(super) fn de_flex_string<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

pub(super) fn de_flex_u32<'de, D>(d: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_u64().unwrap_or(0) as u32,
        Value::String(s) => s.parse().unwrap_or(0),
        _ => 0,
    })
}

pub(super) fn de_flex_i64<'de, D>(d: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_i64().unwrap_or(0),
        Value::String(s) => s.parse().unwrap_or(0),
        _ => 0,
    })
}
