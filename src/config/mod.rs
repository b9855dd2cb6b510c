//! Runtime configuration: env-driven settings plus wiring for the stealth
//! stack and the scraper chain.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::platform::Registry;
use crate::stealth::{
    DelayProfile, FingerprintPool, GenericProxy, HttpRobotsFetcher, HumanDelay, ProxyProvider,
    ProxyRotator, RateLimiter, ResidentialProxy, RobotsChecker, StealthTransport,
};
use crate::tokopedia::{GraphQLStrategy, HeadlessBrowserStrategy, StaticPageStrategy, TokopediaScraper};

/// How outbound requests are routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProxyMode {
    #[default]
    Direct,
    /// Decodo residential gateway, credentials from config.
    Residential,
    /// User-supplied proxy URL list.
    Custom,
}

impl FromStr for ProxyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" => Ok(ProxyMode::Direct),
            "residential" | "decodo" => Ok(ProxyMode::Residential),
            "custom" => Ok(ProxyMode::Custom),
            other => Err(format!("unknown proxy mode {other:?}")),
        }
    }
}

/// Application configuration with env-var overrides.
#[derive(Debug, Clone)]
pub struct Config {
    pub default_platform: String,
    pub respect_robots: bool,
    pub delay_profile: DelayProfile,

    pub rate_per_second: f64,
    pub rate_burst: u32,
    pub max_concurrent: usize,

    pub proxy_mode: ProxyMode,
    pub decodo_username: String,
    pub decodo_password: String,
    pub decodo_country: String,
    pub decodo_city: Option<String>,
    /// Proxy URLs for [`ProxyMode::Custom`].
    pub proxy_urls: Vec<String>,

    pub browser_bin: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_platform: "tokopedia".to_string(),
            respect_robots: true,
            delay_profile: DelayProfile::Normal,
            rate_per_second: 2.0,
            rate_burst: 3,
            max_concurrent: 5,
            proxy_mode: ProxyMode::Direct,
            decodo_username: String::new(),
            decodo_password: String::new(),
            decodo_country: "id".to_string(),
            decodo_city: None,
            proxy_urls: Vec::new(),
            browser_bin: None,
        }
    }
}

impl Config {
    /// Defaults overridden by `MARKETSCRAPE_*` / `DECODO_*` environment
    /// variables. Unparseable values keep the default and log a warning.
    pub fn from_env() -> Self {
        let mut c = Self::default();

        if let Ok(v) = env::var("MARKETSCRAPE_PLATFORM") {
            c.default_platform = v;
        }
        if let Ok(v) = env::var("MARKETSCRAPE_DELAY_PROFILE") {
            match v.parse() {
                Ok(profile) => c.delay_profile = profile,
                Err(err) => log::warn!("MARKETSCRAPE_DELAY_PROFILE: {err}"),
            }
        }
        if let Ok(v) = env::var("MARKETSCRAPE_RATE_PER_SECOND") {
            match v.parse() {
                Ok(rate) => c.rate_per_second = rate,
                Err(_) => log::warn!("MARKETSCRAPE_RATE_PER_SECOND: not a number: {v}"),
            }
        }
        if let Ok(v) = env::var("MARKETSCRAPE_RATE_BURST") {
            match v.parse() {
                Ok(burst) => c.rate_burst = burst,
                Err(_) => log::warn!("MARKETSCRAPE_RATE_BURST: not a number: {v}"),
            }
        }
        if let Ok(v) = env::var("MARKETSCRAPE_MAX_CONCURRENT") {
            match v.parse() {
                Ok(n) => c.max_concurrent = n,
                Err(_) => log::warn!("MARKETSCRAPE_MAX_CONCURRENT: not a number: {v}"),
            }
        }
        if let Ok(v) = env::var("MARKETSCRAPE_PROXY_MODE") {
            match v.parse() {
                Ok(mode) => c.proxy_mode = mode,
                Err(err) => log::warn!("MARKETSCRAPE_PROXY_MODE: {err}"),
            }
        }
        if let Ok(v) = env::var("MARKETSCRAPE_PROXIES") {
            c.proxy_urls = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if matches!(env::var("MARKETSCRAPE_RESPECT_ROBOTS").as_deref(), Ok("false")) {
            c.respect_robots = false;
        }
        if let Ok(v) = env::var("MARKETSCRAPE_BROWSER_BIN") {
            c.browser_bin = Some(PathBuf::from(v));
        }

        if let Ok(v) = env::var("DECODO_USERNAME") {
            c.decodo_username = v;
        }
        if let Ok(v) = env::var("DECODO_PASSWORD") {
            c.decodo_password = v;
        }
        if let Ok(v) = env::var("DECODO_COUNTRY") {
            c.decodo_country = v;
        }
        if let Ok(v) = env::var("DECODO_CITY") {
            c.decodo_city = Some(v);
        }

        c
    }

    /// The shared rate limiter for every outbound call.
    pub fn build_rate_limiter(&self) -> Arc<RateLimiter> {
        Arc::new(RateLimiter::new(self.rate_per_second, self.rate_burst))
    }

    fn proxy_providers(&self) -> Vec<ProxyProvider> {
        match self.proxy_mode {
            ProxyMode::Direct => Vec::new(),
            ProxyMode::Residential => {
                let mut proxy = ResidentialProxy::new(
                    self.decodo_username.clone(),
                    self.decodo_password.clone(),
                    self.decodo_country.clone(),
                );
                if let Some(ref city) = self.decodo_city {
                    proxy = proxy.with_city(city.clone());
                }
                vec![proxy.into()]
            }
            ProxyMode::Custom => self
                .proxy_urls
                .iter()
                .enumerate()
                .map(|(i, url)| GenericProxy::new(url.clone(), format!("proxy-{i}")).into())
                .collect(),
        }
    }

    /// Assemble the full stealth pipeline from this configuration.
    pub fn build_transport(&self, limiter: Arc<RateLimiter>) -> StealthTransport {
        let robots = Arc::new(RobotsChecker::new(
            Arc::new(HttpRobotsFetcher::default()),
            self.respect_robots,
        ));
        StealthTransport::builder()
            .with_fingerprints(FingerprintPool::new())
            .with_robots(robots)
            .with_delay(HumanDelay::new(self.delay_profile))
            .with_rate_limiter(limiter)
            .with_proxies(ProxyRotator::new(self.proxy_providers()))
            .build()
    }

    /// Build the Tokopedia scraper with its default strategy chain.
    pub fn build_scraper(&self) -> TokopediaScraper {
        let limiter = self.build_rate_limiter();
        let transport = Arc::new(self.build_transport(limiter.clone()));

        let mut headless = HeadlessBrowserStrategy::new();
        if let Some(ref bin) = self.browser_bin {
            headless = headless.with_executable(bin.clone());
        }

        TokopediaScraper::with_strategies(
            vec![
                Arc::new(StaticPageStrategy::new(transport.clone())),
                Arc::new(GraphQLStrategy::new(transport)),
            ],
            vec![Arc::new(headless)],
            Some(limiter),
            self.max_concurrent,
        )
    }

    /// Registry with every supported platform registered.
    pub fn build_registry(&self) -> Registry {
        let registry = Registry::new();
        registry.register("tokopedia", Arc::new(self.build_scraper()));
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_profile() {
        let c = Config::default();
        assert_eq!(c.default_platform, "tokopedia");
        assert!(c.respect_robots);
        assert_eq!(c.delay_profile, DelayProfile::Normal);
        assert_eq!(c.rate_per_second, 2.0);
        assert_eq!(c.rate_burst, 3);
        assert_eq!(c.max_concurrent, 5);
        assert_eq!(c.proxy_mode, ProxyMode::Direct);
        assert_eq!(c.decodo_country, "id");
    }

    #[test]
    fn proxy_mode_parses_aliases() {
        assert_eq!("decodo".parse::<ProxyMode>().unwrap(), ProxyMode::Residential);
        assert_eq!("DIRECT".parse::<ProxyMode>().unwrap(), ProxyMode::Direct);
        assert!("wireguard".parse::<ProxyMode>().is_err());
    }

    #[test]
    fn custom_mode_yields_one_provider_per_url() {
        let c = Config {
            proxy_mode: ProxyMode::Custom,
            proxy_urls: vec![
                "http://10.0.0.1:8080".to_string(),
                "socks5://10.0.0.2:1080".to_string(),
            ],
            ..Config::default()
        };
        let providers = c.proxy_providers();
        assert_eq!(providers.len(), 2);
        assert_eq!(providers[0].name(), "proxy-0");
        assert_eq!(providers[1].name(), "proxy-1");
    }

    #[test]
    fn direct_mode_has_no_rotator() {
        assert!(Config::default().proxy_providers().is_empty());
    }

    #[test]
    fn registry_wires_the_default_platform() {
        let registry = Config::default().build_registry();
        assert!(registry.get("tokopedia").is_ok());
        assert_eq!(registry.list(), ["tokopedia"]);
    }
}
