use serde::{Deserialize, Serialize};

use crate::error::{ProxyVoteError, Result};
use crate::models::{AnonymityLevel, ProxyRecord};

/// Capability filter applied while building the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    /// Records strictly below this level are dropped
    pub min_anonymity: AnonymityLevel,
    /// Drop records without HTTPS support
    pub require_https: bool,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            min_anonymity: AnonymityLevel::Elite,
            require_https: false,
        }
    }
}

impl FilterCriteria {
    /// Check if a proxy satisfies the capability criteria
    pub fn accepts(&self, proxy: &ProxyRecord) -> bool {
        if proxy.anonymity < self.min_anonymity {
            return false;
        }

        if self.require_https && !proxy.supports_https {
            return false;
        }

        true
    }
}

/// Inclusive range of local hours during which a proxy may be used
///
/// Deserialization goes through [`VoteWindow::new`], so a decoded window is
/// always valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawWindow", into = "RawWindow")]
pub struct VoteWindow {
    start_hour: u32,
    end_hour: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawWindow {
    start_hour: u32,
    end_hour: u32,
}

impl TryFrom<RawWindow> for VoteWindow {
    type Error = ProxyVoteError;

    fn try_from(raw: RawWindow) -> Result<Self> {
        Self::new(raw.start_hour, raw.end_hour)
    }
}

impl From<VoteWindow> for RawWindow {
    fn from(window: VoteWindow) -> Self {
        Self {
            start_hour: window.start_hour,
            end_hour: window.end_hour,
        }
    }
}

impl VoteWindow {
    pub fn new(start_hour: u32, end_hour: u32) -> Result<Self> {
        if start_hour > 23 || end_hour > 23 {
            return Err(ProxyVoteError::InvalidConfig(format!(
                "vote window hours must be within 0..=23 (got {}..={})",
                start_hour, end_hour
            )));
        }
        if start_hour > end_hour {
            return Err(ProxyVoteError::InvalidConfig(format!(
                "vote window start {} is after end {}",
                start_hour, end_hour
            )));
        }

        Ok(Self {
            start_hour,
            end_hour,
        })
    }

    pub fn start_hour(&self) -> u32 {
        self.start_hour
    }

    pub fn end_hour(&self) -> u32 {
        self.end_hour
    }

    pub fn contains(&self, hour: u32) -> bool {
        self.start_hour <= hour && hour <= self.end_hour
    }
}

impl Default for VoteWindow {
    fn default() -> Self {
        Self {
            start_hour: 8,
            end_hour: 22,
        }
    }
}

impl std::fmt::Display for VoteWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:00-{:02}:59", self.start_hour, self.end_hour)
    }
}
