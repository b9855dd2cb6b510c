//! Registry mapping platform names to scraper instances.
//!
//! Built once at startup and passed by reference to whatever entry point
//! needs it (CLI, MCP server, tests). Deliberately not global state.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{Scraper, ScrapeError};

/// Name → scraper mapping. Last registration for a name wins; there is no
/// removal operation.
#[derive(Default)]
pub struct Registry {
    entries: RwLock<HashMap<String, Arc<dyn Scraper>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, scraper: Arc<dyn Scraper>) {
        let name = name.into();
        log::debug!("registering platform {name:?}");
        self.entries
            .write()
            .expect("registry lock poisoned")
            .insert(name, scraper);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Scraper>, ScrapeError> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| ScrapeError::NotRegistered(name.to_string()))
    }

    /// Registered platform names, in no guaranteed order.
    pub fn list(&self) -> Vec<String> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Product;
    use crate::platform::{CallContext, SearchOptions, TrendingOptions};
    use async_trait::async_trait;

    struct NullScraper;

    #[async_trait]
    impl Scraper for NullScraper {
        async fn search(
            &self,
            _ctx: &CallContext,
            _keyword: &str,
            _opts: SearchOptions,
        ) -> Result<Vec<Product>, ScrapeError> {
            Ok(Vec::new())
        }

        async fn trending(
            &self,
            _ctx: &CallContext,
            _opts: TrendingOptions,
        ) -> Result<Vec<Product>, ScrapeError> {
            Ok(Vec::new())
        }

        async fn product_detail(
            &self,
            _ctx: &CallContext,
            url: &str,
        ) -> Result<Product, ScrapeError> {
            Err(ScrapeError::NotFound(url.to_string()))
        }
    }

    #[test]
    fn get_returns_registered_instance() {
        let registry = Registry::new();
        let scraper: Arc<dyn Scraper> = Arc::new(NullScraper);
        registry.register("x", scraper.clone());

        let fetched = registry.get("x").unwrap();
        assert!(Arc::ptr_eq(&scraper, &fetched));
    }

    #[test]
    fn get_unknown_fails_with_not_registered() {
        let registry = Registry::new();
        match registry.get("y") {
            Err(ScrapeError::NotRegistered(name)) => assert_eq!(name, "y"),
            other => panic!("expected NotRegistered, got {other:?}"),
        }
    }

    #[test]
    fn last_registration_wins_and_list_contains_names() {
        let registry = Registry::new();
        registry.register("x", Arc::new(NullScraper));
        registry.register("x", Arc::new(NullScraper));
        registry.register("z", Arc::new(NullScraper));

        let mut names = registry.list();
        names.sort();
        assert_eq!(names, ["x", "z"]);
    }
}
