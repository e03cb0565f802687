//! Outbound request transport
//!
//! One attempt is exactly one GET through the chosen proxy. There is no
//! transport-level retry; the request loop owns retry policy.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Proxy};
use tracing::{debug, instrument};
use url::Url;

use crate::models::ProxyRecord;

/// Scheme to `host:port` proxy mapping for a single attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRoute {
    /// Plain-HTTP leg, always routed through the proxy
    pub http: String,
    /// HTTPS leg; `None` means HTTPS traffic is not proxied
    pub https: Option<String>,
}

impl ProxyRoute {
    /// Route the HTTP leg through `proxy`, and the HTTPS leg only when the
    /// target needs it, the proxy supports it, and the run asks for it.
    pub fn for_proxy(proxy: &ProxyRecord, target_is_https: bool, route_https: bool) -> Self {
        let id = proxy.id();
        let https = (target_is_https && proxy.supports_https && route_https).then(|| id.clone());
        Self { http: id, https }
    }

    /// Scheme to `host:port` mapping handed to the HTTP client
    pub fn as_map(&self) -> HashMap<&'static str, String> {
        let mut map = HashMap::new();
        map.insert("http", self.http.clone());
        if let Some(https) = &self.https {
            map.insert("https", https.clone());
        }
        map
    }
}

/// Result of one network attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// A response arrived with this status code
    Status(u16),
    /// The per-attempt timeout elapsed
    TimedOut,
    /// Connection, proxy or protocol error
    Transport(String),
}

impl AttemptOutcome {
    /// Only an exact `200` counts as success
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Status(200))
    }
}

impl std::fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptOutcome::Status(code) => write!(f, "HTTP {}", code),
            AttemptOutcome::TimedOut => write!(f, "timed out"),
            AttemptOutcome::Transport(msg) => write!(f, "transport error: {}", msg),
        }
    }
}

/// Issues the target request through a proxy route
#[async_trait]
pub trait VoteTransport: Send + Sync {
    async fn send(&self, target: &Url, route: &ProxyRoute, user_agent: &str) -> AttemptOutcome;
}

/// reqwest-backed transport
///
/// Builds a fresh client per attempt so no connection or proxy state is
/// shared between proxies.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn build_client(&self, route: &ProxyRoute, user_agent: &str) -> reqwest::Result<Client> {
        // no_proxy() drops proxies picked up from the environment.
        let mut builder = Client::builder()
            .no_proxy()
            .timeout(self.timeout)
            .connect_timeout(self.timeout)
            .pool_max_idle_per_host(0)
            .user_agent(user_agent);

        for (scheme, endpoint) in route.as_map() {
            let proxy_url = format!("http://{}", endpoint);
            let proxy = match scheme {
                "https" => Proxy::https(proxy_url)?,
                _ => Proxy::http(proxy_url)?,
            };
            builder = builder.proxy(proxy);
        }

        builder.build()
    }
}

#[async_trait]
impl VoteTransport for ReqwestTransport {
    #[instrument(skip_all, fields(target = %target, proxy = %route.http))]
    async fn send(&self, target: &Url, route: &ProxyRoute, user_agent: &str) -> AttemptOutcome {
        let client = match self.build_client(route, user_agent) {
            Ok(c) => c,
            Err(e) => return AttemptOutcome::Transport(format!("client setup failed: {}", e)),
        };

        match client.get(target.clone()).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                debug!("Target answered with HTTP {}", status);
                AttemptOutcome::Status(status)
            }
            Err(e) if e.is_timeout() => AttemptOutcome::TimedOut,
            Err(e) => AttemptOutcome::Transport(e.to_string()),
        }
    }
}
