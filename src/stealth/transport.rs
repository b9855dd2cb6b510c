//! The composed request-interception pipeline.
//!
//! Every outbound call goes through, in fixed order: request duplication →
//! fingerprint headers → robots.txt policy check → shared rate limiter →
//! human delay → proxy selection → dispatch.

use std::sync::Arc;

use http::header::USER_AGENT;
use tokio_util::sync::CancellationToken;

use super::{
    Fingerprint, FingerprintPool, HumanDelay, ProxyRotator, RateLimiter, RobotsChecker,
    StealthError,
};

/// Request-interception chain wrapping an underlying `reqwest` transport.
///
/// Optional stages (robots, limiter, delay, proxies) are simply skipped when
/// not configured. The caller's request object is never mutated.
pub struct StealthTransport {
    fingerprints: FingerprintPool,
    robots: Option<Arc<RobotsChecker>>,
    proxies: Option<ProxyRotator>,
    delay: Option<HumanDelay>,
    limiter: Option<Arc<RateLimiter>>,
    base: reqwest::Client,
}

impl StealthTransport {
    pub fn builder() -> StealthTransportBuilder {
        StealthTransportBuilder::default()
    }

    /// Run the full pipeline for one request.
    ///
    /// The fingerprint counter advances exactly once per call; the proxy
    /// counter advances exactly once per call that reaches the routing step.
    pub async fn execute(
        &self,
        request: &reqwest::Request,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, StealthError> {
        let mut request = request
            .try_clone()
            .ok_or(StealthError::UncloneableRequest)?;

        let fp = self.fingerprints.next();
        apply_fingerprint(&mut request, &fp);

        if let Some(ref robots) = self.robots {
            let allowed = robots
                .is_allowed(&fp.user_agent, request.url().as_str())
                .await
                .unwrap_or(true);
            if !allowed {
                return Err(StealthError::PolicyBlocked(
                    request.url().path().to_string(),
                ));
            }
        }

        if let Some(ref limiter) = self.limiter {
            limiter.wait(cancel).await?;
        }

        if let Some(ref delay) = self.delay {
            delay.wait(cancel).await?;
        }

        let client = match self.proxies {
            Some(ref rotator) => {
                let provider = rotator.next();
                log::debug!("routing {} via {}", request.url(), provider.name());
                provider.client().clone()
            }
            None => self.base.clone(),
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StealthError::Canceled),
            resp = client.execute(request) => Ok(resp?),
        }
    }

}

/// Attach the fingerprint's user-agent and header set, leaving any header
/// the caller already set untouched.
fn apply_fingerprint(request: &mut reqwest::Request, fp: &Fingerprint) {
    let headers = request.headers_mut();
    if !headers.contains_key(USER_AGENT) {
        if let Ok(value) = http::HeaderValue::from_str(&fp.user_agent) {
            headers.insert(USER_AGENT, value);
        }
    }
    for (name, value) in fp.headers.iter() {
        if !headers.contains_key(name) {
            headers.insert(name.clone(), value.clone());
        }
    }
}

/// Builder assembling the pipeline stages.
#[derive(Default)]
pub struct StealthTransportBuilder {
    fingerprints: Option<FingerprintPool>,
    robots: Option<Arc<RobotsChecker>>,
    proxies: Option<ProxyRotator>,
    delay: Option<HumanDelay>,
    limiter: Option<Arc<RateLimiter>>,
    base: Option<reqwest::Client>,
}

impl StealthTransportBuilder {
    pub fn with_fingerprints(mut self, pool: FingerprintPool) -> Self {
        self.fingerprints = Some(pool);
        self
    }

    pub fn with_robots(mut self, robots: Arc<RobotsChecker>) -> Self {
        self.robots = Some(robots);
        self
    }

    /// `None` (an absent rotator) bypasses the proxy stage entirely.
    pub fn with_proxies(mut self, rotator: Option<ProxyRotator>) -> Self {
        self.proxies = rotator;
        self
    }

    pub fn with_delay(mut self, delay: HumanDelay) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn with_base_client(mut self, client: reqwest::Client) -> Self {
        self.base = Some(client);
        self
    }

    pub fn build(self) -> StealthTransport {
        StealthTransport {
            fingerprints: self.fingerprints.unwrap_or_default(),
            robots: self.robots,
            proxies: self.proxies,
            delay: self.delay,
            limiter: self.limiter,
            base: self.base.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stealth::{RobotsFetchError, RobotsFetcher};
    use async_trait::async_trait;
    use reqwest::{Method, Request, Url};

    struct StaticFetcher(&'static str);

    #[async_trait]
    impl RobotsFetcher for StaticFetcher {
        async fn fetch(&self, _robots_url: &str) -> Result<String, RobotsFetchError> {
            Ok(self.0.to_string())
        }
    }

    fn request(url: &str) -> Request {
        Request::new(Method::GET, Url::parse(url).unwrap())
    }

    #[test]
    fn fingerprint_fills_only_missing_headers() {
        let pool = FingerprintPool::new();
        let fp = pool.next();

        let mut req = request("https://shop.example/search");
        req.headers_mut()
            .insert("accept-language", "fr-FR".parse().unwrap());

        apply_fingerprint(&mut req, &fp);

        // Caller's explicit header survives; everything else is filled in.
        assert_eq!(req.headers()["accept-language"], "fr-FR");
        assert_eq!(req.headers()[USER_AGENT], fp.user_agent.as_str());
        assert!(req.headers().contains_key("accept"));
    }

    #[tokio::test]
    async fn disallowed_path_fails_with_policy_block_before_dispatch() {
        let robots = Arc::new(RobotsChecker::new(
            Arc::new(StaticFetcher("User-agent: *\nDisallow: /")),
            true,
        ));
        let transport = StealthTransport::builder().with_robots(robots).build();

        let original = request("https://shop.example/search?q=x");
        let cancel = CancellationToken::new();
        match transport.execute(&original, &cancel).await {
            Err(StealthError::PolicyBlocked(path)) => assert_eq!(path, "/search"),
            other => panic!("expected PolicyBlocked, got {other:?}"),
        }

        // The caller-owned request was never touched.
        assert!(original.headers().is_empty());
    }

    #[tokio::test]
    async fn cancellation_short_circuits_the_pipeline() {
        let transport = StealthTransport::builder()
            .with_delay(HumanDelay::new(crate::stealth::DelayProfile::Cautious))
            .build();

        let cancel = CancellationToken::new();
        cancel.cancel();
        match transport.execute(&request("https://shop.example/x"), &cancel).await {
            Err(StealthError::Canceled) => {}
            other => panic!("expected Canceled, got {other:?}"),
        }
    }
}
