//! Chain identification
//!
//! Provides:
//! - The set of settlement chains the engine knows addresses for
//! - Ordered address-format classification (`classify`)

mod address;

pub use address::{classify, is_mainnet_transparent, is_zcash_address};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Chain an address belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainTag {
    Zcash,
    Bitcoin,
    Ethereum,
    Solana,
    Near,
}

impl ChainTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainTag::Zcash => "zcash",
            ChainTag::Bitcoin => "bitcoin",
            ChainTag::Ethereum => "ethereum",
            ChainTag::Solana => "solana",
            ChainTag::Near => "near",
        }
    }

    /// Account-model chains with case-insensitive hex addresses
    pub fn is_evm(&self) -> bool {
        matches!(self, ChainTag::Ethereum)
    }
}

impl fmt::Display for ChainTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
