//! Proxy list acquisition

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{info, instrument};

use crate::error::Result;
use crate::models::RawProxy;

/// Produces the raw proxy records a catalog is built from
#[async_trait]
pub trait ProxySource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<RawProxy>>;
}

/// Reads a JSON array of raw proxy records from disk
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl ProxySource for JsonFileSource {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn fetch(&self) -> Result<Vec<RawProxy>> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let proxies: Vec<RawProxy> = serde_json::from_str(&content)?;
        info!("Read {} raw proxies from {}", proxies.len(), self.path.display());
        Ok(proxies)
    }
}
