//! Browser fingerprint rotation.

use std::sync::Mutex;

use http::header::{HeaderMap, HeaderName, HeaderValue};

/// A synthetic browser identity: user-agent plus the header set a real
/// browser of that family would send.
#[derive(Debug, Clone)]
pub struct Fingerprint {
    pub user_agent: String,
    pub headers: HeaderMap,
}

/// Rotates through a fixed catalog of fingerprints in strict round-robin
/// order. No randomness, so tests can assert the exact sequence.
#[derive(Debug)]
pub struct FingerprintPool {
    fingerprints: Vec<Fingerprint>,
    idx: Mutex<usize>,
}

impl FingerprintPool {
    /// Pool with the default catalog of realistic desktop identities.
    pub fn new() -> Self {
        Self::with_catalog(default_fingerprints())
    }

    pub fn with_catalog(fingerprints: Vec<Fingerprint>) -> Self {
        assert!(!fingerprints.is_empty(), "fingerprint catalog is empty");
        Self {
            fingerprints,
            idx: Mutex::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }

    /// Next fingerprint in cyclic order. The counter advances exactly once
    /// per call, even under concurrency.
    pub fn next(&self) -> Fingerprint {
        let mut idx = self.idx.lock().expect("fingerprint lock poisoned");
        let fp = self.fingerprints[*idx % self.fingerprints.len()].clone();
        *idx = idx.wrapping_add(1);
        fp
    }
}

impl Default for FingerprintPool {
    fn default() -> Self {
        Self::new()
    }
}

fn default_fingerprints() -> Vec<Fingerprint> {
    vec![
        // Chrome 133 — Windows
        Fingerprint {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36"
                .into(),
            headers: chrome_headers("133"),
        },
        // Chrome 133 — macOS
        Fingerprint {
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36"
                .into(),
            headers: chrome_headers("133"),
        },
        // Chrome 133 — Linux
        Fingerprint {
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36"
                .into(),
            headers: chrome_headers("133"),
        },
        // Firefox 135 — Windows
        Fingerprint {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:135.0) \
                         Gecko/20100101 Firefox/135.0"
                .into(),
            headers: firefox_headers(),
        },
        // Firefox 135 — macOS
        Fingerprint {
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:135.0) \
                         Gecko/20100101 Firefox/135.0"
                .into(),
            headers: firefox_headers(),
        },
        // Edge 133 — Windows
        Fingerprint {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36 Edg/133.0.0.0"
                .into(),
            headers: chrome_headers("133"),
        },
    ]
}

fn header(map: &mut HeaderMap, name: &'static str, value: &str) {
    map.insert(
        HeaderName::from_static(name),
        HeaderValue::from_str(value).expect("static header value"),
    );
}

fn chrome_headers(version: &str) -> HeaderMap {
    let mut h = HeaderMap::new();
    header(
        &mut h,
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
    );
    header(&mut h, "accept-language", "en-US,en;q=0.9");
    header(&mut h, "accept-encoding", "gzip, deflate, br");
    header(
        &mut h,
        "sec-ch-ua",
        &format!(
            "\"Chromium\";v=\"{version}\", \"Not(A:Brand\";v=\"99\", \"Google Chrome\";v=\"{version}\""
        ),
    );
    header(&mut h, "sec-ch-ua-mobile", "?0");
    header(&mut h, "sec-ch-ua-platform", "\"Windows\"");
    header(&mut h, "sec-fetch-dest", "document");
    header(&mut h, "sec-fetch-mode", "navigate");
    header(&mut h, "sec-fetch-site", "none");
    header(&mut h, "sec-fetch-user", "?1");
    header(&mut h, "upgrade-insecure-requests", "1");
    h
}

fn firefox_headers() -> HeaderMap {
    let mut h = HeaderMap::new();
    header(
        &mut h,
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
    );
    header(&mut h, "accept-language", "en-US,en;q=0.5");
    header(&mut h, "accept-encoding", "gzip, deflate, br");
    header(&mut h, "sec-fetch-dest", "document");
    header(&mut h, "sec-fetch-mode", "navigate");
    header(&mut h, "sec-fetch-site", "none");
    header(&mut h, "sec-fetch-user", "?1");
    header(&mut h, "upgrade-insecure-requests", "1");
    h
}
