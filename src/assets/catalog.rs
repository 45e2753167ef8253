//! Cached catalog of assets swappable against the home asset
//!
//! The cache is a single slot with last-write-wins semantics. Concurrent
//! misses may both hit the network; entries are immutable values so the
//! only thing at stake is which fetch lands last.

use crate::clock::Clock;
use crate::config::Settings;
use crate::metrics;
use crate::provider::AssetSource;
use crate::swap::{Asset, HOME_SYMBOL};

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Symbols listed first, in this order; everything else sorts by symbol
const POPULAR_ORDER: &[&str] = &[
    "BTC", "ETH", "SOL", "USDC", "USDT", "NEAR", "ARB", "MATIC", "AVAX", "DOT",
];

#[derive(Debug, Clone)]
struct CachedAssets {
    assets: Vec<Asset>,
    fetched_at: DateTime<Utc>,
}

pub struct AssetCatalog {
    source: Arc<dyn AssetSource>,
    clock: Arc<dyn Clock>,
    ttl: chrono::Duration,
    fetch_timeout: Duration,
    cache: RwLock<Option<CachedAssets>>,
}

impl AssetCatalog {
    pub fn new(
        source: Arc<dyn AssetSource>,
        clock: Arc<dyn Clock>,
        ttl: chrono::Duration,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            source,
            clock,
            ttl,
            fetch_timeout,
            cache: RwLock::new(None),
        }
    }

    pub fn from_settings(settings: &Settings, source: Arc<dyn AssetSource>, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            source,
            clock,
            settings.swap.catalog_ttl(),
            settings.provider.catalog_timeout(),
        )
    }

    /// Assets available for swapping. Never fails: upstream trouble yields
    /// the static fallback list.
    pub async fn list_assets(&self) -> Vec<Asset> {
        self.get_or_fetch(self.clock.now()).await
    }

    /// Find an asset by composite identifier
    pub async fn find(&self, identifier: &str) -> Option<Asset> {
        self.list_assets()
            .await
            .into_iter()
            .find(|asset| asset.identifier.eq_ignore_ascii_case(identifier))
    }

    pub async fn get_or_fetch(&self, now: DateTime<Utc>) -> Vec<Asset> {
        if let Some(cached) = self.cache.read().await.as_ref() {
            if now - cached.fetched_at < self.ttl {
                debug!("Returning {} cached assets", cached.assets.len());
                metrics::record_catalog_lookup("cache_hit");
                return cached.assets.clone();
            }
        }

        match tokio::time::timeout(self.fetch_timeout, self.source.fetch_assets()).await {
            Ok(Ok(fetched)) if !fetched.is_empty() => {
                let assets = normalize(fetched);
                info!("Loaded {} assets from provider", assets.len());
                metrics::record_catalog_lookup("fetched");

                *self.cache.write().await = Some(CachedAssets {
                    assets: assets.clone(),
                    fetched_at: now,
                });
                assets
            }
            Ok(Ok(_)) => {
                warn!("Provider returned an empty asset list, using fallback");
                fallback()
            }
            Ok(Err(e)) => {
                warn!("Failed to fetch assets, using fallback: {}", e);
                fallback()
            }
            Err(_) => {
                warn!(
                    "Asset fetch timed out after {:?}, using fallback",
                    self.fetch_timeout
                );
                fallback()
            }
        }
    }
}

fn fallback() -> Vec<Asset> {
    metrics::record_catalog_lookup("fallback");
    fallback_assets()
}

/// Drop the home asset and order popular assets first
fn normalize(mut assets: Vec<Asset>) -> Vec<Asset> {
    assets.retain(|asset| asset.symbol != HOME_SYMBOL);
    assets.sort_by(compare_popularity);
    assets
}

fn compare_popularity(a: &Asset, b: &Asset) -> Ordering {
    let rank = |asset: &Asset| POPULAR_ORDER.iter().position(|s| *s == asset.symbol);
    match (rank(a), rank(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.symbol.cmp(&b.symbol),
    }
}

/// Hand-curated assets used when the provider list is unavailable
pub fn fallback_assets() -> Vec<Asset> {
    vec![
        Asset::new("BTC", "BTC", "Bitcoin", 8, None, Some("nep141:btc.omft.near")),
        Asset::new("ETH", "ETH", "Ethereum", 18, None, Some("nep141:eth.omft.near")),
        Asset::new("SOL", "SOL", "Solana", 9, None, Some("nep141:sol.omft.near")),
        Asset::new("NEAR", "NEAR", "NEAR Protocol", 24, None, Some("nep141:wrap.near")),
        Asset::new(
            "ETH",
            "USDC",
            "USD Coin",
            6,
            Some("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
            Some("nep141:eth-0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48.omft.near"),
        ),
        Asset::new(
            "ETH",
            "USDT",
            "Tether",
            6,
            Some("0xdAC17F958D2ee523a2206206994597C13D831ec7"),
            Some("nep141:eth-0xdac17f958d2ee523a2206206994597c13d831ec7.omft.near"),
        ),
        Asset::new("DOGE", "DOGE", "Dogecoin", 8, None, Some("nep141:doge.omft.near")),
        Asset::new("LTC", "LTC", "Litecoin", 8, None, Some("nep141:ltc.omft.near")),
        Asset::new("ARB", "ETH", "Arbitrum ETH", 18, None, Some("nep141:arb.omft.near")),
        Asset::new("BASE", "ETH", "Base ETH", 18, None, Some("nep141:base.omft.near")),
    ]
}
