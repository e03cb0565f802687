//! Round-robin rotation over a fixed proxy list

use crate::error::{ProxyVoteError, Result};
use crate::models::ProxyRecord;

/// Cycles through proxies in catalog order, forever
///
/// The Nth call to [`ProxyRotor::next`] (1-indexed) returns
/// `proxies[(N - 1) % len]`.
#[derive(Debug, Clone)]
pub struct ProxyRotor {
    proxies: Vec<ProxyRecord>,
    index: usize,
}

impl ProxyRotor {
    pub fn new(proxies: Vec<ProxyRecord>) -> Result<Self> {
        if proxies.is_empty() {
            return Err(ProxyVoteError::EmptyRotor);
        }

        Ok(Self { proxies, index: 0 })
    }

    /// Return the next proxy in the cycle
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> &ProxyRecord {
        let idx = self.index;
        self.index = (self.index + 1) % self.proxies.len();
        &self.proxies[idx]
    }

    /// Number of proxies in one full cycle
    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    /// Always false; a rotor cannot be built empty
    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }
}
