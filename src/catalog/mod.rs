//! Proxy catalog
//!
//! Turns raw acquisition records into the validated, enriched and filtered
//! proxy list that rotation runs over. The output keeps the input's relative
//! order, which becomes the rotation order.

pub mod geo;
pub mod source;

pub use geo::{GeoLookup, HttpGeoLookup, StaticGeoLookup};
pub use source::{JsonFileSource, ProxySource};

use std::collections::HashSet;

use chrono_tz::Tz;
use futures::StreamExt;
use tracing::{debug, info, instrument, warn};

use crate::error::{ProxyVoteError, Result};
use crate::models::{FilterCriteria, ProxyRecord, RawProxy};
use crate::rotation::ProxyRotor;

/// Default number of geo lookups in flight while building
pub const DEFAULT_GEO_CONCURRENCY: usize = 4;

/// Filtered, deduplicated and timezone-enriched proxy set
#[derive(Debug, Clone)]
pub struct ProxyCatalog {
    proxies: Vec<ProxyRecord>,
}

impl ProxyCatalog {
    /// Build a catalog with the default lookup concurrency
    pub async fn build(
        raw: Vec<RawProxy>,
        geo: &dyn GeoLookup,
        criteria: &FilterCriteria,
    ) -> Result<Self> {
        Self::build_with_concurrency(raw, geo, criteria, DEFAULT_GEO_CONCURRENCY).await
    }

    /// Build a catalog from raw records
    ///
    /// Malformed records and records failing the capability criteria are
    /// dropped, then duplicate endpoints, then each survivor is geolocated.
    /// Records whose timezone cannot be resolved are dropped.
    ///
    /// Fails with [`ProxyVoteError::NoEligibleProxies`] when nothing is left.
    #[instrument(skip_all, fields(raw = raw.len()))]
    pub async fn build_with_concurrency(
        raw: Vec<RawProxy>,
        geo: &dyn GeoLookup,
        criteria: &FilterCriteria,
        concurrency: usize,
    ) -> Result<Self> {
        let total = raw.len();
        let mut seen = HashSet::new();
        let mut candidates = Vec::with_capacity(total);
        let mut rejected = 0usize;
        let mut duplicates = 0usize;
        let mut filtered = 0usize;

        for entry in &raw {
            let record = match ProxyRecord::from_raw(entry) {
                Ok(r) => r,
                Err(e) => {
                    warn!("Rejecting proxy record: {}", e);
                    rejected += 1;
                    continue;
                }
            };

            if !criteria.accepts(&record) {
                filtered += 1;
                continue;
            }

            // First eligible copy of an endpoint wins.
            if !seen.insert(record.endpoint()) {
                duplicates += 1;
                continue;
            }

            candidates.push(record);
        }

        // `buffered` yields in input order, so rotation order stays stable.
        let enriched: Vec<Option<ProxyRecord>> = futures::stream::iter(candidates)
            .map(|record| async move {
                let zone = geo.lookup(record.address).await;
                match zone.as_deref().and_then(parse_timezone) {
                    Some(tz) => Some(record.with_timezone(tz)),
                    None => {
                        debug!(proxy = %record, zone = ?zone, "Timezone unknown, dropping proxy");
                        None
                    }
                }
            })
            .buffered(concurrency.max(1))
            .collect()
            .await;

        let lookup_misses = enriched.iter().filter(|r| r.is_none()).count();
        let proxies: Vec<ProxyRecord> = enriched.into_iter().flatten().collect();

        info!(
            total,
            rejected,
            duplicates,
            filtered,
            lookup_misses,
            eligible = proxies.len(),
            "Proxy catalog built"
        );

        if proxies.is_empty() {
            return Err(ProxyVoteError::NoEligibleProxies);
        }

        Ok(Self { proxies })
    }

    pub fn proxies(&self) -> &[ProxyRecord] {
        &self.proxies
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    /// Hand the catalog over to a rotor
    pub fn into_rotor(self) -> Result<ProxyRotor> {
        ProxyRotor::new(self.proxies)
    }
}

/// Parse an IANA timezone id; anything unrecognized counts as unknown
pub fn parse_timezone(zone: &str) -> Option<Tz> {
    zone.trim().parse::<Tz>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnonymityLevel;
    use std::net::IpAddr;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn mixed_raw() -> Vec<RawProxy> {
        vec![
            RawProxy::new("10.0.0.1", 80, true, "elite proxy"),
            RawProxy::new("10.0.0.2", 80, false, "elite proxy"),
            RawProxy::new("10.0.0.3", 80, true, "anonymous"),
            RawProxy::new("10.0.0.4", 80, true, "transparent"),
            RawProxy::new("10.0.0.5", 80, false, "anonymous"),
            RawProxy::new("10.0.0.6", 80, true, "elite"),
        ]
    }

    fn geo_for_all() -> StaticGeoLookup {
        (1..=6)
            .map(|i| (ip(&format!("10.0.0.{}", i)), "Europe/Paris".to_string()))
            .collect()
    }

    fn criteria(min: AnonymityLevel, require_https: bool) -> FilterCriteria {
        FilterCriteria {
            min_anonymity: min,
            require_https,
        }
    }

    #[tokio::test]
    async fn test_elite_filter_keeps_only_elite() {
        let catalog = ProxyCatalog::build(
            mixed_raw(),
            &geo_for_all(),
            &criteria(AnonymityLevel::Elite, false),
        )
        .await
        .unwrap();

        assert_eq!(catalog.len(), 3);
        assert!(catalog
            .proxies()
            .iter()
            .all(|p| p.anonymity == AnonymityLevel::Elite));
    }

    #[tokio::test]
    async fn test_https_filter_keeps_only_https() {
        let catalog = ProxyCatalog::build(
            mixed_raw(),
            &geo_for_all(),
            &criteria(AnonymityLevel::Transparent, true),
        )
        .await
        .unwrap();

        assert_eq!(catalog.len(), 4);
        assert!(catalog.proxies().iter().all(|p| p.supports_https));
    }

    #[tokio::test]
    async fn test_output_preserves_input_order() {
        let catalog = ProxyCatalog::build_with_concurrency(
            mixed_raw(),
            &geo_for_all(),
            &criteria(AnonymityLevel::Anonymous, false),
            3,
        )
        .await
        .unwrap();

        let addresses: Vec<String> = catalog
            .proxies()
            .iter()
            .map(|p| p.address.to_string())
            .collect();
        assert_eq!(
            addresses,
            vec!["10.0.0.1", "10.0.0.2", "10.0.0.3", "10.0.0.5", "10.0.0.6"]
        );
    }

    #[tokio::test]
    async fn test_unknown_timezone_is_dropped() {
        let geo = StaticGeoLookup::new()
            .with(ip("10.0.0.1"), "Europe/Paris")
            .with(ip("10.0.0.2"), "Not/AZone");

        let catalog = ProxyCatalog::build(
            mixed_raw(),
            &geo,
            &criteria(AnonymityLevel::Transparent, false),
        )
        .await
        .unwrap();

        assert_eq!(catalog.len(), 1);
        let only = &catalog.proxies()[0];
        assert_eq!(only.address, ip("10.0.0.1"));
        assert_eq!(only.timezone, Some(chrono_tz::Europe::Paris));
    }

    #[tokio::test]
    async fn test_duplicates_and_malformed_records_are_dropped() {
        let raw = vec![
            RawProxy::new("10.0.0.1", 80, false, "elite"),
            RawProxy::new("10.0.0.1", 80, true, "elite"),
            RawProxy::new("10.0.0.1", 8080, true, "elite"),
            RawProxy::new("not-an-ip", 80, true, "elite"),
            RawProxy::new("10.0.0.2", 99999, true, "elite"),
        ];
        let geo = StaticGeoLookup::new()
            .with(ip("10.0.0.1"), "UTC")
            .with(ip("10.0.0.2"), "UTC");

        let catalog = ProxyCatalog::build(raw, &geo, &criteria(AnonymityLevel::Transparent, false))
            .await
            .unwrap();

        let ids: Vec<String> = catalog.proxies().iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["10.0.0.1:80", "10.0.0.1:8080"]);
        // First occurrence wins.
        assert!(!catalog.proxies()[0].supports_https);
    }

    #[tokio::test]
    async fn test_filtered_copy_does_not_shadow_eligible_duplicate() {
        let raw = vec![
            RawProxy::new("10.0.0.1", 80, false, "elite"),
            RawProxy::new("10.0.0.1", 80, true, "elite"),
        ];
        let geo = StaticGeoLookup::new().with(ip("10.0.0.1"), "UTC");

        let catalog = ProxyCatalog::build(raw, &geo, &criteria(AnonymityLevel::Elite, true))
            .await
            .unwrap();

        assert_eq!(catalog.len(), 1);
        assert!(catalog.proxies()[0].supports_https);
    }

    #[tokio::test]
    async fn test_empty_catalog_fails() {
        let raw = vec![RawProxy::new("10.0.0.4", 80, false, "transparent")];
        let result =
            ProxyCatalog::build(raw, &geo_for_all(), &criteria(AnonymityLevel::Elite, true)).await;
        assert!(matches!(result, Err(ProxyVoteError::NoEligibleProxies)));

        let result = ProxyCatalog::build(
            Vec::new(),
            &geo_for_all(),
            &criteria(AnonymityLevel::Transparent, false),
        )
        .await;
        assert!(matches!(result, Err(ProxyVoteError::NoEligibleProxies)));
    }

    #[tokio::test]
    async fn test_into_rotor() {
        let catalog = ProxyCatalog::build(
            mixed_raw(),
            &geo_for_all(),
            &criteria(AnonymityLevel::Elite, true),
        )
        .await
        .unwrap();

        let mut rotor = catalog.into_rotor().unwrap();
        assert_eq!(rotor.len(), 2);
        assert_eq!(rotor.next().address, ip("10.0.0.1"));
        assert_eq!(rotor.next().address, ip("10.0.0.6"));
    }

    #[test]
    fn test_parse_timezone() {
        assert_eq!(parse_timezone("UTC"), Some(chrono_tz::UTC));
        assert_eq!(parse_timezone(" America/New_York "), Some(chrono_tz::America::New_York));
        assert_eq!(parse_timezone("Mars/Olympus"), None);
        assert_eq!(parse_timezone(""), None);
    }
}
