use std::net::{IpAddr, SocketAddr};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{ProxyVoteError, Result};

/// Proxy anonymity level
///
/// Ordered from least to most private: `Transparent < Anonymous < Elite`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnonymityLevel {
    Transparent,
    Anonymous,
    Elite,
}

impl AnonymityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnonymityLevel::Transparent => "transparent",
            AnonymityLevel::Anonymous => "anonymous",
            AnonymityLevel::Elite => "elite",
        }
    }

    /// Parse a level, accepting the labels public proxy listings use
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "transparent" | "transparent proxy" | "noa" => Some(AnonymityLevel::Transparent),
            "anonymous" | "anonymous proxy" | "anm" => Some(AnonymityLevel::Anonymous),
            "elite" | "elite proxy" | "high anonymous" | "hia" => Some(AnonymityLevel::Elite),
            _ => None,
        }
    }
}

impl std::fmt::Display for AnonymityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unvalidated proxy entry as produced by the acquisition step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawProxy {
    pub address: String,
    pub port: i64,
    #[serde(default, alias = "supports_https")]
    pub https: bool,
    pub anonymity: String,
}

impl RawProxy {
    pub fn new(address: &str, port: i64, https: bool, anonymity: &str) -> Self {
        Self {
            address: address.to_string(),
            port,
            https,
            anonymity: anonymity.to_string(),
        }
    }
}

/// Normalized proxy metadata
///
/// Created once while the catalog is built and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRecord {
    pub address: IpAddr,
    pub port: u16,
    pub supports_https: bool,
    pub anonymity: AnonymityLevel,
    /// `None` until a geo lookup resolved a valid IANA zone
    pub timezone: Option<Tz>,
}

impl ProxyRecord {
    /// Validate a raw entry. The timezone is left unknown.
    pub fn from_raw(raw: &RawProxy) -> Result<Self> {
        let address: IpAddr = raw.address.trim().parse().map_err(|_| {
            ProxyVoteError::InvalidProxyAddress(format!("{}:{}", raw.address, raw.port))
        })?;

        let port = u16::try_from(raw.port)
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| {
                ProxyVoteError::InvalidProxyAddress(format!("{}:{}", raw.address, raw.port))
            })?;

        let anonymity = AnonymityLevel::from_str(&raw.anonymity)
            .ok_or_else(|| ProxyVoteError::UnknownAnonymityLevel(raw.anonymity.clone()))?;

        Ok(Self {
            address,
            port,
            supports_https: raw.https,
            anonymity,
            timezone: None,
        })
    }

    /// Unique endpoint identifier
    pub fn endpoint(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    /// `host:port` form used in proxy mappings (IPv6 hosts are bracketed)
    pub fn id(&self) -> String {
        self.endpoint().to_string()
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = Some(timezone);
        self
    }
}

impl std::fmt::Display for ProxyRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.endpoint())
    }
}
