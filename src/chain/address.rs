//! Address format classification
//!
//! Formats overlap (legacy Bitcoin and Solana share the base58 alphabet), so the
//! rules are evaluated in a fixed order and the first match wins:
//! 1. Zcash unified / sapling / transparent prefixes
//! 2. Bitcoin bech32 and legacy base58 prefixes
//! 3. EVM `0x` hex addresses of exact length
//! 4. Generic base58 (Solana)
//! 5. NEAR named accounts and 64-hex implicit accounts

use super::ChainTag;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref EVM_ADDRESS: Regex = Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("valid regex");
    static ref BASE58_ADDRESS: Regex =
        Regex::new(r"^[1-9A-HJ-NP-Za-km-z]{32,44}$").expect("valid regex");
    static ref NEAR_IMPLICIT: Regex = Regex::new(r"^[a-f0-9]{64}$").expect("valid regex");
}

const ZCASH_PREFIXES: &[&str] = &["u1", "zs", "t1", "t3"];
const ZCASH_TRANSPARENT_PREFIXES: &[&str] = &["t1", "t3"];
const BITCOIN_PREFIXES: &[&str] = &["bc1", "1", "3"];

type Rule = (ChainTag, fn(&str) -> bool);

/// Classification rules, most specific first
const RULES: &[Rule] = &[
    (ChainTag::Zcash, is_zcash_format),
    (ChainTag::Bitcoin, is_bitcoin_format),
    (ChainTag::Ethereum, is_evm_format),
    (ChainTag::Solana, is_base58_format),
    (ChainTag::Near, is_near_format),
];

/// Map an address to the chain it belongs to
pub fn classify(address: &str) -> Option<ChainTag> {
    let address = address.trim();
    if address.is_empty() {
        return None;
    }

    RULES
        .iter()
        .find(|(_, matches)| matches(address))
        .map(|(chain, _)| *chain)
}

pub fn is_zcash_address(address: &str) -> bool {
    classify(address) == Some(ChainTag::Zcash)
}

/// Mainnet transparent Zcash address (`t1` P2PKH or `t3` P2SH)
pub fn is_mainnet_transparent(address: &str) -> bool {
    let address = address.trim();
    ZCASH_TRANSPARENT_PREFIXES
        .iter()
        .any(|prefix| address.starts_with(prefix))
}

fn is_zcash_format(address: &str) -> bool {
    ZCASH_PREFIXES.iter().any(|prefix| address.starts_with(prefix))
}

fn is_bitcoin_format(address: &str) -> bool {
    BITCOIN_PREFIXES
        .iter()
        .any(|prefix| address.starts_with(prefix))
}

fn is_evm_format(address: &str) -> bool {
    EVM_ADDRESS.is_match(address)
}

fn is_base58_format(address: &str) -> bool {
    BASE58_ADDRESS.is_match(address)
}

fn is_near_format(address: &str) -> bool {
    address.ends_with(".near") || NEAR_IMPLICIT.is_match(address)
}
