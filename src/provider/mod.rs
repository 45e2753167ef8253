//! Liquidity providers
//!
//! Every provider satisfies the same capability: list assets, quote, publish
//! an intent and poll its status. Live and mock implementations are chosen
//! once, when the provider set is built from configuration.

pub mod http;
pub mod near_intents;
pub mod response;
pub mod simulator;

pub use http::{HttpReply, HttpTransport, ReqwestTransport};
pub use near_intents::NearIntentsProvider;
pub use simulator::SimulatorProvider;

use crate::clock::Clock;
use crate::config::Settings;
use crate::error::SwapResult;
use crate::swap::{
    Asset, ExecParams, ExecutionReceipt, ProviderKind, QuoteRequest, StatusSnapshot, SwapQuote,
};

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Upstream source of the swappable asset list
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn fetch_assets(&self) -> SwapResult<Vec<Asset>>;
}

#[async_trait]
pub trait SwapProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Dry-run quote; amounts in and out are display units
    async fn quote(&self, request: &QuoteRequest) -> SwapResult<SwapQuote>;

    /// Publish an executable intent for a quote this provider produced
    async fn execute(&self, quote: &SwapQuote, params: &ExecParams) -> SwapResult<ExecutionReceipt>;

    /// Look up an intent. Lookup failures are reported as `unknown`.
    async fn poll(&self, intent_id: &str, deposit_address: Option<&str>) -> StatusSnapshot;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderMode {
    Live,
    Mock,
}

impl fmt::Display for ProviderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderMode::Live => f.write_str("live"),
            ProviderMode::Mock => f.write_str("mock"),
        }
    }
}

/// Providers selected for this process
pub struct ProviderSet {
    pub mode: ProviderMode,
    pub providers: Vec<Arc<dyn SwapProvider>>,
    pub assets: Arc<dyn AssetSource>,
}

/// Build the provider set for the configured mode
pub fn build_providers(settings: &Settings, clock: Arc<dyn Clock>) -> SwapResult<ProviderSet> {
    if settings.provider.mock_mode() {
        info!("No API key or use_mock set - serving swaps from the simulator");
        let simulator = Arc::new(SimulatorProvider::new(clock));
        return Ok(ProviderSet {
            mode: ProviderMode::Mock,
            providers: vec![simulator.clone() as Arc<dyn SwapProvider>],
            assets: simulator,
        });
    }

    let http: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(
        settings.provider.request_timeout(),
        settings.provider.api_key(),
    )?);
    let near = Arc::new(NearIntentsProvider::new(settings, http, clock));
    info!("Using NEAR Intents at {}", settings.provider.quote_url);

    Ok(ProviderSet {
        mode: ProviderMode::Live,
        providers: vec![near.clone() as Arc<dyn SwapProvider>],
        assets: near,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;

    #[test]
    fn test_mode_selection() {
        let mock = build_providers(&Settings::default(), Arc::new(SystemClock)).unwrap();
        assert_eq!(mock.mode, ProviderMode::Mock);
        assert_eq!(mock.providers[0].kind(), ProviderKind::Simulator);

        let mut settings = Settings::default();
        settings.provider.api_key = Some("key".to_string());
        let live = build_providers(&settings, Arc::new(SystemClock)).unwrap();
        assert_eq!(live.mode, ProviderMode::Live);
        assert_eq!(live.providers[0].kind(), ProviderKind::NearIntents);
    }
}
