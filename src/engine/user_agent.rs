//! User-Agent selection
//!
//! Every attempt draws a fresh string; nothing is cached between attempts.

use rand::distributions::{Distribution, WeightedIndex};

use crate::error::{ProxyVoteError, Result};

/// Source of User-Agent header values
pub trait UserAgentSource: Send + Sync {
    fn random(&self) -> String;
}

/// Built-in desktop and mobile agents weighted by approximate browser share
const DEFAULT_AGENTS: &[(&str, f64)] = &[
    (
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        40.0,
    ),
    (
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        10.0,
    ),
    (
        "Mozilla/5.0 (Linux; Android 10; K) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Mobile Safari/537.36",
        14.0,
    ),
    (
        "Mozilla/5.0 (iPhone; CPU iPhone OS 17_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.6 Mobile/15E148 Safari/604.1",
        13.0,
    ),
    (
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.6 Safari/605.1.15",
        7.0,
    ),
    (
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
        8.0,
    ),
    (
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
        6.0,
    ),
    (
        "Mozilla/5.0 (X11; Linux x86_64; rv:133.0) Gecko/20100101 Firefox/133.0",
        2.0,
    ),
];

/// Draws agents from a weighted table
#[derive(Debug, Clone)]
pub struct WeightedUserAgents {
    agents: Vec<String>,
    index: WeightedIndex<f64>,
}

impl WeightedUserAgents {
    pub fn new<S: Into<String>>(entries: impl IntoIterator<Item = (S, f64)>) -> Result<Self> {
        let (agents, weights): (Vec<String>, Vec<f64>) = entries
            .into_iter()
            .map(|(agent, weight)| (agent.into(), weight))
            .unzip();

        let index = WeightedIndex::new(&weights).map_err(|e| {
            ProxyVoteError::InvalidConfig(format!("invalid user agent weights: {}", e))
        })?;

        Ok(Self { agents, index })
    }

    /// The built-in browser-share table
    pub fn builtin() -> Result<Self> {
        Self::new(DEFAULT_AGENTS.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl UserAgentSource for WeightedUserAgents {
    fn random(&self) -> String {
        let idx = self.index.sample(&mut rand::thread_rng());
        self.agents[idx].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_draws_known_agents() {
        let agents = WeightedUserAgents::builtin().unwrap();
        assert_eq!(agents.len(), DEFAULT_AGENTS.len());

        for _ in 0..50 {
            let ua = agents.random();
            assert!(ua.starts_with("Mozilla/5.0"));
            assert!(DEFAULT_AGENTS.iter().any(|(a, _)| *a == ua));
        }
    }

    #[test]
    fn test_zero_weight_entries_are_never_drawn() {
        let agents = WeightedUserAgents::new(vec![("never", 0.0), ("always", 1.0)]).unwrap();
        for _ in 0..50 {
            assert_eq!(agents.random(), "always");
        }
    }

    #[test]
    fn test_invalid_tables_are_rejected() {
        let empty: Vec<(String, f64)> = Vec::new();
        assert!(matches!(
            WeightedUserAgents::new(empty),
            Err(ProxyVoteError::InvalidConfig(_))
        ));
        assert!(matches!(
            WeightedUserAgents::new(vec![("a", 0.0)]),
            Err(ProxyVoteError::InvalidConfig(_))
        ));
    }
}
