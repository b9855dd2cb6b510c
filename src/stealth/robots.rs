//! robots.txt policy checks with a per-domain TTL cache.
//!
//! Rulesets are fetched once per domain per TTL window. Fetch failures fail
//! open: an unreachable robots.txt never blocks scraping.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::StealthError;

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Error raised by a robots.txt fetch collaborator.
#[derive(Debug, Error)]
#[error("fetch robots.txt: {0}")]
pub struct RobotsFetchError(pub String);

/// Minimal HTTP GET capability used only to retrieve `<domain>/robots.txt`.
#[async_trait]
pub trait RobotsFetcher: Send + Sync {
    async fn fetch(&self, robots_url: &str) -> Result<String, RobotsFetchError>;
}

/// Default fetcher backed by a plain reqwest client.
#[derive(Debug, Clone, Default)]
pub struct HttpRobotsFetcher {
    client: reqwest::Client,
}

impl HttpRobotsFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RobotsFetcher for HttpRobotsFetcher {
    async fn fetch(&self, robots_url: &str) -> Result<String, RobotsFetchError> {
        let resp = self
            .client
            .get(robots_url)
            .send()
            .await
            .map_err(|e| RobotsFetchError(e.to_string()))?;
        resp.text()
            .await
            .map_err(|e| RobotsFetchError(e.to_string()))
    }
}

#[derive(Debug, Clone)]
struct Rule {
    allow: bool,
    pattern: String,
}

/// Rules for one `User-agent:` group.
#[derive(Debug, Clone, Default)]
struct RuleGroup {
    agents: Vec<String>,
    rules: Vec<Rule>,
    crawl_delay: Option<Duration>,
}

impl RuleGroup {
    fn matches_agent(&self, user_agent: &str) -> Option<usize> {
        let ua = user_agent.to_ascii_lowercase();
        self.agents
            .iter()
            .filter_map(|agent| {
                if agent == "*" {
                    Some(0)
                } else if ua.contains(agent.as_str()) {
                    Some(agent.len())
                } else {
                    None
                }
            })
            .max()
    }

    fn is_allowed(&self, path: &str) -> bool {
        // Longest matching pattern wins; Allow wins a tie.
        let mut best: Option<(usize, bool)> = None;
        for rule in &self.rules {
            if pattern_matches(&rule.pattern, path) {
                let len = rule.pattern.len();
                match best {
                    Some((best_len, allowed)) if best_len > len || (best_len == len && allowed) => {}
                    _ => best = Some((len, rule.allow)),
                }
            }
        }
        best.map(|(_, allowed)| allowed).unwrap_or(true)
    }
}

/// A parsed robots.txt ruleset. Immutable once built; the cache replaces
/// entries wholesale on refetch.
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    groups: Vec<RuleGroup>,
}

impl RobotsRules {
    pub fn parse(body: &str) -> Self {
        let mut groups: Vec<RuleGroup> = Vec::new();
        let mut current: Option<RuleGroup> = None;
        let mut accepting_agents = false;

        for raw_line in body.lines() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    if !accepting_agents {
                        if let Some(group) = current.take() {
                            groups.push(group);
                        }
                        current = Some(RuleGroup::default());
                    }
                    accepting_agents = true;
                    if let Some(ref mut group) = current {
                        group.agents.push(value.to_ascii_lowercase());
                    }
                }
                "allow" | "disallow" => {
                    accepting_agents = false;
                    // "Disallow:" with an empty value means allow everything.
                    if value.is_empty() {
                        continue;
                    }
                    if let Some(ref mut group) = current {
                        group.rules.push(Rule {
                            allow: key == "allow",
                            pattern: value.to_string(),
                        });
                    }
                }
                "crawl-delay" => {
                    accepting_agents = false;
                    if let (Some(ref mut group), Ok(secs)) = (&mut current, value.parse::<f64>()) {
                        if secs >= 0.0 {
                            group.crawl_delay = Some(Duration::from_secs_f64(secs));
                        }
                    }
                }
                _ => accepting_agents = false,
            }
        }
        if let Some(group) = current.take() {
            groups.push(group);
        }

        Self { groups }
    }

    fn find_group(&self, user_agent: &str) -> Option<&RuleGroup> {
        self.groups
            .iter()
            .filter_map(|g| g.matches_agent(user_agent).map(|score| (score, g)))
            .max_by_key(|(score, _)| *score)
            .map(|(_, g)| g)
    }

    pub fn is_allowed(&self, user_agent: &str, path: &str) -> bool {
        self.find_group(user_agent)
            .map(|g| g.is_allowed(path))
            .unwrap_or(true)
    }

    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        self.find_group(user_agent).and_then(|g| g.crawl_delay)
    }
}

/// `*` matches any run of characters, a trailing `$` anchors to end-of-path,
/// anything else is a literal prefix.
fn pattern_matches(pattern: &str, path: &str) -> bool {
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(p) => (p, true),
        None => (pattern, false),
    };

    let mut pos = 0;
    let parts: Vec<&str> = pattern.split('*').collect();
    for (i, part) in parts.iter().enumerate() {
        if i == 0 {
            if !path[pos..].starts_with(part) {
                return false;
            }
            pos += part.len();
        } else {
            match path[pos..].find(part) {
                Some(offset) => pos += offset + part.len(),
                None => return false,
            }
        }
    }

    if anchored {
        // A trailing wildcard can absorb the remainder.
        pos == path.len() || parts.last() == Some(&"")
    } else {
        true
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    rules: Arc<RobotsRules>,
    expires: Instant,
}

/// Caches and evaluates per-domain crawl permission.
pub struct RobotsChecker {
    cache: RwLock<HashMap<String, CacheEntry>>,
    fetcher: Arc<dyn RobotsFetcher>,
    cache_ttl: Duration,
    enabled: bool,
}

impl RobotsChecker {
    pub fn new(fetcher: Arc<dyn RobotsFetcher>, enabled: bool) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            fetcher,
            cache_ttl: DEFAULT_CACHE_TTL,
            enabled,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Whether `raw_url` may be crawled by `user_agent`. Always allowed when
    /// the checker is disabled or the ruleset cannot be fetched.
    pub async fn is_allowed(
        &self,
        user_agent: &str,
        raw_url: &str,
    ) -> Result<bool, StealthError> {
        if !self.enabled {
            return Ok(true);
        }

        let url = url::Url::parse(raw_url)?;
        let domain = domain_of(&url);
        let rules = match self.rules_for(&domain).await {
            Ok(rules) => rules,
            Err(err) => {
                // Fail open: robots fetch trouble never blocks scraping.
                log::debug!("{err}; allowing {raw_url}");
                return Ok(true);
            }
        };

        Ok(rules.is_allowed(user_agent, url.path()))
    }

    /// Declared crawl delay for the agent, zero if disabled, absent, or the
    /// ruleset could not be fetched.
    pub async fn crawl_delay(&self, user_agent: &str, domain: &str) -> Duration {
        if !self.enabled {
            return Duration::ZERO;
        }
        match self.rules_for(domain).await {
            Ok(rules) => rules.crawl_delay(user_agent).unwrap_or(Duration::ZERO),
            Err(_) => Duration::ZERO,
        }
    }

    async fn rules_for(&self, domain: &str) -> Result<Arc<RobotsRules>, RobotsFetchError> {
        // Optimistic shared read for the common warm-cache path.
        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(domain) {
                if entry.expires > Instant::now() {
                    return Ok(entry.rules.clone());
                }
            }
        }

        let mut cache = self.cache.write().await;
        // Re-check under the exclusive lock so concurrent misses for the
        // same domain fetch only once.
        if let Some(entry) = cache.get(domain) {
            if entry.expires > Instant::now() {
                return Ok(entry.rules.clone());
            }
        }

        let robots_url = format!("{domain}/robots.txt");
        log::debug!("refreshing robots ruleset from {robots_url}");
        let body = self.fetcher.fetch(&robots_url).await?;
        let rules = Arc::new(RobotsRules::parse(&body));
        cache.insert(
            domain.to_string(),
            CacheEntry {
                rules: rules.clone(),
                expires: Instant::now() + self.cache_ttl,
            },
        );
        Ok(rules)
    }
}

fn domain_of(url: &url::Url) -> String {
    format!("{}://{}", url.scheme(), url.authority())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFetcher {
        body: String,
        fetches: AtomicUsize,
        fail: bool,
    }

    impl CountingFetcher {
        fn new(body: &str) -> Arc<Self> {
            Arc::new(Self {
                body: body.to_string(),
                fetches: AtomicUsize::new(0),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                body: String::new(),
                fetches: AtomicUsize::new(0),
                fail: true,
            })
        }

        fn count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RobotsFetcher for CountingFetcher {
        async fn fetch(&self, _robots_url: &str) -> Result<String, RobotsFetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RobotsFetchError("connection refused".into()));
            }
            Ok(self.body.clone())
        }
    }

    const RULES: &str = "\
User-agent: *
Disallow: /private
Allow: /private/ok
Crawl-delay: 2

User-agent: badbot
Disallow: /
";

    #[tokio::test]
    async fn evaluates_rule_groups_per_agent() {
        let checker = RobotsChecker::new(CountingFetcher::new(RULES), true);
        assert!(checker.is_allowed("Mozilla/5.0", "https://shop.example/products").await.unwrap());
        assert!(!checker.is_allowed("Mozilla/5.0", "https://shop.example/private/x").await.unwrap());
        assert!(checker.is_allowed("Mozilla/5.0", "https://shop.example/private/ok").await.unwrap());
        assert!(!checker.is_allowed("badbot/1.0", "https://shop.example/products").await.unwrap());
    }

    #[tokio::test]
    async fn caches_within_ttl_and_refetches_after_expiry() {
        tokio::time::pause();
        let fetcher = CountingFetcher::new(RULES);
        let checker =
            RobotsChecker::new(fetcher.clone(), true).with_ttl(Duration::from_secs(60));

        checker.is_allowed("agent", "https://shop.example/a").await.unwrap();
        checker.is_allowed("agent", "https://shop.example/b").await.unwrap();
        assert_eq!(fetcher.count(), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        checker.is_allowed("agent", "https://shop.example/c").await.unwrap();
        assert_eq!(fetcher.count(), 2);
    }

    #[tokio::test]
    async fn disabled_checker_always_allows() {
        let fetcher = CountingFetcher::new("User-agent: *\nDisallow: /");
        let checker = RobotsChecker::new(fetcher.clone(), false);
        assert!(checker.is_allowed("agent", "https://shop.example/x").await.unwrap());
        assert_eq!(fetcher.count(), 0);
        assert_eq!(checker.crawl_delay("agent", "https://shop.example").await, Duration::ZERO);
    }

    #[tokio::test]
    async fn fetch_failure_fails_open() {
        let checker = RobotsChecker::new(CountingFetcher::failing(), true);
        assert!(checker.is_allowed("agent", "https://shop.example/x").await.unwrap());
        assert_eq!(checker.crawl_delay("agent", "https://shop.example").await, Duration::ZERO);
    }

    #[tokio::test]
    async fn crawl_delay_comes_from_the_matching_group() {
        let checker = RobotsChecker::new(CountingFetcher::new(RULES), true);
        assert_eq!(
            checker.crawl_delay("agent", "https://shop.example").await,
            Duration::from_secs(2)
        );
    }

    #[test]
    fn wildcard_and_anchor_patterns() {
        assert!(pattern_matches("/search", "/search?q=x"));
        assert!(pattern_matches("/*.json$", "/api/items.json"));
        assert!(!pattern_matches("/*.json$", "/api/items.json?page=2"));
        assert!(pattern_matches("/a/*/c", "/a/b/c/d"));
        assert!(!pattern_matches("/a/*/c", "/a/b"));
    }
}
