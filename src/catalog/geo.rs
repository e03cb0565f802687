//! IP geolocation lookups
//!
//! Resolves a proxy's IP address to an IANA timezone identifier.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::error::Result;

/// Resolves an IP address to a timezone id
///
/// Implementations return `None` on any miss; the catalog treats that as an
/// unknown timezone and drops the record.
#[async_trait]
pub trait GeoLookup: Send + Sync {
    async fn lookup(&self, ip: IpAddr) -> Option<String>;
}

/// Body returned by ip-api.com style endpoints
#[derive(Debug, Deserialize)]
struct GeoResponse {
    status: String,
    #[serde(default)]
    timezone: Option<String>,
}

impl GeoResponse {
    fn into_timezone(self) -> Option<String> {
        if self.status != "success" {
            return None;
        }
        self.timezone.filter(|tz| !tz.trim().is_empty())
    }
}

/// Geo lookup backed by an HTTP JSON endpoint
///
/// Issues `GET {base_url}/{ip}?fields=status,timezone`. Free ip-api tiers
/// answer HTTP 429 past roughly 45 requests a minute; those answers are
/// counted and logged at warn level since they silently shrink the catalog.
pub struct HttpGeoLookup {
    client: reqwest::Client,
    base_url: String,
    rate_limited: AtomicUsize,
}

impl HttpGeoLookup {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            rate_limited: AtomicUsize::new(0),
        })
    }

    /// Number of lookups refused with HTTP 429 so far
    pub fn rate_limited(&self) -> usize {
        self.rate_limited.load(Ordering::Relaxed)
    }

    fn lookup_url(&self, ip: IpAddr) -> String {
        format!("{}/{}?fields=status,timezone", self.base_url, ip)
    }
}

#[async_trait]
impl GeoLookup for HttpGeoLookup {
    #[instrument(skip(self))]
    async fn lookup(&self, ip: IpAddr) -> Option<String> {
        let response = match self.client.get(self.lookup_url(ip)).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!("Geo lookup request for {} failed: {}", ip, e);
                return None;
            }
        };

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            self.rate_limited.fetch_add(1, Ordering::Relaxed);
            warn!("Geo lookup for {} was rate limited (HTTP 429), dropping proxy", ip);
            return None;
        }

        if !response.status().is_success() {
            debug!("Geo lookup for {} returned HTTP {}", ip, response.status());
            return None;
        }

        match response.json::<GeoResponse>().await {
            Ok(body) => body.into_timezone(),
            Err(e) => {
                debug!("Geo lookup for {} returned an unreadable body: {}", ip, e);
                None
            }
        }
    }
}

/// Fixed IP to timezone table
#[derive(Debug, Clone, Default)]
pub struct StaticGeoLookup {
    zones: HashMap<IpAddr, String>,
}

impl StaticGeoLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, ip: IpAddr, timezone: &str) -> Self {
        self.zones.insert(ip, timezone.to_string());
        self
    }
}

impl FromIterator<(IpAddr, String)> for StaticGeoLookup {
    fn from_iter<I: IntoIterator<Item = (IpAddr, String)>>(iter: I) -> Self {
        Self {
            zones: iter.into_iter().collect(),
        }
    }
}

#[async_trait]
impl GeoLookup for StaticGeoLookup {
    async fn lookup(&self, ip: IpAddr) -> Option<String> {
        self.zones.get(&ip).cloned()
    }
}
