//! Product data model shared by every scraping strategy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Marketing label attached to a listing (e.g. "Terlaris", cashback badges).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub position: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label_type: String,
}

/// A single scraped product listing.
///
/// No identity uniqueness is enforced here; deduplication is the caller's
/// concern. `strategy` records which acquisition path produced the entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub original_price: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub price_range: String,
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub discount_percent: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image_url: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub category: String,
    pub shop: Shop,
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub rating: f64,
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub review_count: u32,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_ad: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub wishlist: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
    pub platform: String,
    pub scraped_at: DateTime<Utc>,
    pub strategy: String,
}

impl Default for Product {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            price: 0,
            original_price: 0,
            price_range: String::new(),
            discount_percent: 0,
            image_url: String::new(),
            url: String::new(),
            category: String::new(),
            shop: Shop::default(),
            rating: 0.0,
            review_count: 0,
            is_ad: false,
            wishlist: false,
            labels: Vec::new(),
            platform: String::new(),
            scraped_at: Utc::now(),
            strategy: String::new(),
        }
    }
}

/// Seller information attached to a product.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Shop {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub city: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_official: bool,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

fn is_zero_f64(v: &f64) -> bool {
    *v == 0.0
}
