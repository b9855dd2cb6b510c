//! Proxy providers and round-robin rotation.
//!
//! Each provider lazily builds its `reqwest::Client` exactly once. The
//! generic provider degrades to a direct client when its URL cannot be
//! parsed, recording the error for later inspection.

use std::sync::Mutex;

use once_cell::sync::OnceCell;
use url::Url;

/// Memoized client plus any error hit while building it.
#[derive(Debug)]
struct ClientSlot {
    client: reqwest::Client,
    error: Option<String>,
}

impl ClientSlot {
    fn ok(client: reqwest::Client) -> Self {
        Self {
            client,
            error: None,
        }
    }

    fn degraded(error: String) -> Self {
        log::warn!("proxy client degraded to direct transport: {error}");
        Self {
            client: reqwest::Client::default(),
            error: Some(error),
        }
    }
}

fn proxied_client(proxy_url: Url) -> ClientSlot {
    let proxy = match reqwest::Proxy::all(proxy_url) {
        Ok(proxy) => proxy,
        Err(err) => return ClientSlot::degraded(err.to_string()),
    };
    // No connection reuse: rotating egress should get a fresh IP per request.
    let built = reqwest::Client::builder()
        .proxy(proxy)
        .pool_max_idle_per_host(0)
        .build();
    match built {
        Ok(client) => ClientSlot::ok(client),
        Err(err) => ClientSlot::degraded(err.to_string()),
    }
}

/// Sticky-session routing: pin requests to one egress identity for a bounded
/// number of minutes.
#[derive(Debug, Clone)]
pub struct StickySession {
    pub id: String,
    pub duration_min: u32,
}

/// Residential rotating proxy (Decodo-style gateway). The egress country,
/// city, and session affinity are encoded into the proxy credentials.
#[derive(Debug)]
pub struct ResidentialProxy {
    pub username: String,
    pub password: String,
    /// ISO country code, e.g. "id".
    pub country: String,
    /// Optional city targeting, e.g. "jakarta".
    pub city: Option<String>,
    pub sticky: Option<StickySession>,
    pub use_unblocker: bool,
    slot: OnceCell<ClientSlot>,
}

impl ResidentialProxy {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            country: country.into(),
            city: None,
            sticky: None,
            use_unblocker: false,
            slot: OnceCell::new(),
        }
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    pub fn with_sticky_session(mut self, id: impl Into<String>, duration_min: u32) -> Self {
        self.sticky = Some(StickySession {
            id: id.into(),
            duration_min,
        });
        self
    }

    pub fn with_unblocker(mut self) -> Self {
        self.use_unblocker = true;
        self
    }

    fn proxy_url(&self) -> Result<Url, url::ParseError> {
        let (host, user) = if self.use_unblocker {
            ("unblock.decodo.com:60000", self.username.clone())
        } else {
            let mut user = format!("user-{}-country-{}", self.username, self.country);
            if let Some(ref city) = self.city {
                user.push_str(&format!("-city-{city}"));
            }
            if let Some(ref sticky) = self.sticky {
                user.push_str(&format!(
                    "-session-{}-sessionduration-{}",
                    sticky.id, sticky.duration_min
                ));
            }
            ("gate.decodo.com:7000", user)
        };
        Url::parse(&format!("http://{user}:{}@{host}", self.password))
    }

    fn slot(&self) -> &ClientSlot {
        self.slot.get_or_init(|| match self.proxy_url() {
            Ok(url) => proxied_client(url),
            Err(err) => ClientSlot::degraded(err.to_string()),
        })
    }
}

/// Generic HTTP/SOCKS5 proxy described by a user-supplied URL.
#[derive(Debug)]
pub struct GenericProxy {
    pub raw_url: String,
    pub label: String,
    slot: OnceCell<ClientSlot>,
}

impl GenericProxy {
    pub fn new(raw_url: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            raw_url: raw_url.into(),
            label: label.into(),
            slot: OnceCell::new(),
        }
    }

    fn slot(&self) -> &ClientSlot {
        self.slot.get_or_init(|| match Url::parse(&self.raw_url) {
            Ok(url) => proxied_client(url),
            Err(err) => ClientSlot::degraded(err.to_string()),
        })
    }
}

/// Direct routing, no proxy.
#[derive(Debug, Default)]
pub struct DirectProxy {
    slot: OnceCell<ClientSlot>,
}

impl DirectProxy {
    fn slot(&self) -> &ClientSlot {
        self.slot
            .get_or_init(|| ClientSlot::ok(reqwest::Client::default()))
    }
}

/// An egress routing backend.
#[derive(Debug)]
pub enum ProxyProvider {
    Direct(DirectProxy),
    Residential(ResidentialProxy),
    Generic(GenericProxy),
}

impl ProxyProvider {
    pub fn direct() -> Self {
        ProxyProvider::Direct(DirectProxy::default())
    }

    pub fn name(&self) -> &str {
        match self {
            ProxyProvider::Direct(_) => "direct",
            ProxyProvider::Residential(p) if p.use_unblocker => "residential-unblocker",
            ProxyProvider::Residential(_) => "residential-rotating",
            ProxyProvider::Generic(p) => &p.label,
        }
    }

    /// The provider's transport, built at most once.
    pub fn client(&self) -> &reqwest::Client {
        &self.slot().client
    }

    /// Error recorded while building the transport, if any. Forces
    /// initialization so the answer is definitive.
    pub fn parse_error(&self) -> Option<&str> {
        self.slot().error.as_deref()
    }

    fn slot(&self) -> &ClientSlot {
        match self {
            ProxyProvider::Direct(p) => p.slot(),
            ProxyProvider::Residential(p) => p.slot(),
            ProxyProvider::Generic(p) => p.slot(),
        }
    }
}

impl From<ResidentialProxy> for ProxyProvider {
    fn from(p: ResidentialProxy) -> Self {
        ProxyProvider::Residential(p)
    }
}

impl From<GenericProxy> for ProxyProvider {
    fn from(p: GenericProxy) -> Self {
        ProxyProvider::Generic(p)
    }
}

/// Cycles through providers in strict round-robin order.
#[derive(Debug)]
pub struct ProxyRotator {
    providers: Vec<ProxyProvider>,
    idx: Mutex<usize>,
}

impl ProxyRotator {
    /// Returns `None` for an empty provider list so callers can treat "no
    /// rotator" as "bypass this stage".
    pub fn new(providers: Vec<ProxyProvider>) -> Option<Self> {
        if providers.is_empty() {
            return None;
        }
        Some(Self {
            providers,
            idx: Mutex::new(0),
        })
    }

    pub fn next(&self) -> &ProxyProvider {
        let mut idx = self.idx.lock().expect("proxy lock poisoned");
        let provider = &self.providers[*idx % self.providers.len()];
        *idx = idx.wrapping_add(1);
        provider
    }
}
