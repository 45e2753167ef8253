//! Swap lifecycle engine
//!
//! Composes the asset catalog, quote aggregation, intent execution and
//! status tracking over the provider set selected at startup.

mod executor;
mod monitor;
mod quote;
mod tracker;

pub use executor::IntentExecutor;
pub use monitor::{backoff_delay, PollSummary, SwapMonitor};
pub use quote::QuoteEngine;
pub use tracker::StatusTracker;

use crate::assets::AssetCatalog;
use crate::clock::Clock;
use crate::config::Settings;
use crate::error::{SwapError, SwapResult};
use crate::events::{EventBus, SwapEvent};
use crate::provider::{build_providers, ProviderMode, ProviderSet};
use crate::swap::{ActiveSwap, Asset, ExecParams, QuoteRequest, StatusSnapshot, SwapQuote};

use std::sync::Arc;
use tracing::info;

pub struct SwapEngine {
    mode: ProviderMode,
    catalog: AssetCatalog,
    quotes: QuoteEngine,
    executor: IntentExecutor,
    tracker: Arc<StatusTracker>,
    events: EventBus,
    clock: Arc<dyn Clock>,
}

impl SwapEngine {
    /// Build the engine for the configured mode
    pub fn new(settings: &Settings, clock: Arc<dyn Clock>) -> SwapResult<Self> {
        let providers = build_providers(settings, clock.clone())?;
        Ok(Self::from_providers(settings, providers, clock))
    }

    pub fn from_providers(settings: &Settings, set: ProviderSet, clock: Arc<dyn Clock>) -> Self {
        info!(
            "Swap engine running in {} mode with {} provider(s)",
            set.mode,
            set.providers.len()
        );

        Self {
            mode: set.mode,
            catalog: AssetCatalog::from_settings(settings, set.assets, clock.clone()),
            quotes: QuoteEngine::new(set.providers.clone()),
            executor: IntentExecutor::new(set.providers.clone(), clock.clone()),
            tracker: Arc::new(StatusTracker::new(set.providers)),
            events: EventBus::default(),
            clock,
        }
    }

    pub fn mode(&self) -> ProviderMode {
        self.mode
    }

    pub fn tracker(&self) -> Arc<StatusTracker> {
        self.tracker.clone()
    }

    /// Lifecycle events for swaps this engine creates
    pub fn events(&self) -> EventBus {
        self.events.clone()
    }

    pub async fn list_assets(&self) -> Vec<Asset> {
        self.catalog.list_assets().await
    }

    /// Catalog entry for `identifier`, else an asset built from the
    /// identifier alone with heuristic decimals
    pub async fn resolve_asset(&self, identifier: &str) -> SwapResult<Asset> {
        let identifier = identifier.trim();
        if let Some(asset) = self.catalog.find(identifier).await {
            return Ok(asset);
        }

        Asset::from_identifier(identifier).ok_or_else(|| {
            SwapError::Configuration(format!(
                "'{identifier}' is not an asset identifier (expected CHAIN.SYMBOL)"
            ))
        })
    }

    pub async fn get_quotes(&self, request: &QuoteRequest) -> SwapResult<Vec<SwapQuote>> {
        self.quotes.get_quotes(request).await
    }

    /// Execute a quote and return the record the caller must persist
    pub async fn execute(&self, quote: &SwapQuote, params: &ExecParams) -> SwapResult<ActiveSwap> {
        let receipt = self.executor.execute(quote, params).await?;
        let swap = ActiveSwap::from_execution(quote, params, receipt, self.clock.now());
        self.events.publish(SwapEvent::created(&swap));
        Ok(swap)
    }

    pub async fn poll(&self, swap: &ActiveSwap) -> StatusSnapshot {
        self.tracker.poll_swap(swap).await
    }
}
