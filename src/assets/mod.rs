//! Asset reference data
//!
//! Provides:
//! - Amount conversion between display and minor units
//! - Provider asset-id resolution for composite identifiers
//! - The cached catalog of assets swappable against the home asset

pub mod amount;
pub mod catalog;
pub mod resolver;

pub use amount::{
    decimals_for, from_minor_units, minor_units, parse_amount, resolve_decimals, to_minor_units,
};
pub use catalog::{fallback_assets, AssetCatalog};
pub use resolver::{chain_for_blockchain, resolve};
