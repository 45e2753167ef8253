//! Composite identifier to provider asset-id resolution

/// Namespaces of provider-native asset ids
const NATIVE_ID_PREFIXES: &[&str] = &["nep141:", "nep245:"];

/// Well-known composite identifiers and their provider-native ids
const PROVIDER_ID_TABLE: &[(&str, &str)] = &[
    ("BTC.BTC", "nep141:btc.omft.near"),
    ("ETH.ETH", "nep141:eth.omft.near"),
    ("SOL.SOL", "nep141:sol.omft.near"),
    ("NEAR.NEAR", "nep141:wrap.near"),
    ("ZEC.ZEC", "nep141:zec.omft.near"),
    ("DOGE.DOGE", "nep141:doge.omft.near"),
    ("LTC.LTC", "nep141:ltc.omft.near"),
    ("AVAX.AVAX", "nep245:v2_1.omni.hot.tg:43114_11111111111111111111"),
    (
        "ARB.ARB",
        "nep141:arb-0x912ce59144191c1204e64559fe8253a0e49e6548.omft.near",
    ),
    (
        "ETH.USDC-0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
        "nep141:eth-0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48.omft.near",
    ),
    (
        "ETH.USDT-0xdAC17F958D2ee523a2206206994597C13D831ec7",
        "nep141:eth-0xdac17f958d2ee523a2206206994597c13d831ec7.omft.near",
    ),
    (
        "NEAR.USDC",
        "nep141:17208628f84f5d6ad33f0da3bbbeb27ffcb398eac501a31bd6ad2011e36133a1",
    ),
    (
        "SOL.USDC",
        "nep141:sol-5ce3bf3a31af18be40ba30f721101b4341690186.omft.near",
    ),
    ("BASE.ETH", "nep141:base.omft.near"),
    (
        "BASE.USDC",
        "nep141:base-0x833589fcd6edb6e08f4c7c32d4f71b54bda02913.omft.near",
    ),
    ("ARB.ETH", "nep141:arb.omft.near"),
    (
        "ARB.USDC",
        "nep141:arb-0xaf88d065e77c8cc2239327c5edb3a432268e5831.omft.near",
    ),
];

/// Provider blockchain names and their chain codes
const BLOCKCHAIN_TABLE: &[(&str, &str)] = &[
    ("bitcoin", "BTC"),
    ("ethereum", "ETH"),
    ("solana", "SOL"),
    ("near", "NEAR"),
    ("arbitrum", "ARB"),
    ("base", "BASE"),
    ("polygon", "MATIC"),
    ("bsc", "BSC"),
    ("avalanche", "AVAX"),
    ("optimism", "OP"),
    ("sui", "SUI"),
    ("dogecoin", "DOGE"),
    ("litecoin", "LTC"),
    ("xrp", "XRP"),
    ("zcash", "ZEC"),
    ("aurora", "AURORA"),
    ("turbochain", "TURBO"),
];

/// Resolve a composite identifier to the provider's asset id.
///
/// A provider id captured at catalog time wins. Ids already in a provider
/// namespace pass through. Anything unknown is returned verbatim and left
/// for the provider to reject.
pub fn resolve(identifier: &str, known_provider_id: Option<&str>) -> String {
    if let Some(known) = known_provider_id.map(str::trim).filter(|id| !id.is_empty()) {
        return known.to_string();
    }

    if is_provider_native(identifier) {
        return identifier.to_string();
    }

    PROVIDER_ID_TABLE
        .iter()
        .find(|(composite, _)| *composite == identifier)
        .map(|(_, native)| native.to_string())
        .unwrap_or_else(|| identifier.to_string())
}

pub fn is_provider_native(identifier: &str) -> bool {
    NATIVE_ID_PREFIXES
        .iter()
        .any(|prefix| identifier.starts_with(prefix))
}

/// Chain code for a provider blockchain name; unknown names are upper-cased
pub fn chain_for_blockchain(blockchain: &str) -> String {
    let lower = blockchain.trim().to_ascii_lowercase();
    BLOCKCHAIN_TABLE
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, chain)| chain.to_string())
        .unwrap_or_else(|| lower.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_id_wins() {
        assert_eq!(
            resolve("BTC.BTC", Some("nep141:custom-btc.near")),
            "nep141:custom-btc.near"
        );
        assert_eq!(resolve("BTC.BTC", Some("  ")), "nep141:btc.omft.near");
    }

    #[test]
    fn test_table_lookup() {
        assert_eq!(resolve("NEAR.NEAR", None), "nep141:wrap.near");
        assert_eq!(
            resolve("AVAX.AVAX", None),
            "nep245:v2_1.omni.hot.tg:43114_11111111111111111111"
        );
        assert_eq!(
            resolve("ETH.USDC-0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", None),
            "nep141:eth-0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48.omft.near"
        );
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let once = resolve("SOL.USDC", None);
        assert_eq!(resolve(&once, None), once);
    }

    #[test]
    fn test_unknown_passes_through() {
        assert_eq!(resolve("FOO.BAR", None), "FOO.BAR");
    }

    #[test]
    fn test_chain_for_blockchain() {
        assert_eq!(chain_for_blockchain("ethereum"), "ETH");
        assert_eq!(chain_for_blockchain("Polygon"), "MATIC");
        assert_eq!(chain_for_blockchain("tron"), "TRON");
    }
}
