//! Zecswap - cross-chain swap intents into and out of Zcash
//!
//! Quotes swaps against a liquidity provider (NEAR Intents 1Click, or an
//! offline simulator in mock mode), publishes intents, and tracks each swap
//! from deposit through settlement.

pub mod api;
pub mod assets;
pub mod chain;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod metrics;
pub mod provider;
pub mod state;
pub mod swap;

pub use config::Settings;
pub use engine::SwapEngine;
pub use error::{SwapError, SwapResult};
