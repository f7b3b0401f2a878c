// config/mod.rs - Chain configuration management
//
// Router/stablecoin registries per chain, passed explicitly into the analysis core

pub mod chains;

pub use chains::{ChainConfig, ChainRegistry, APPROVE_SELECTOR};

#[cfg(test)]
mod tests {
    use super::chains::*;
    use std::io::Write;

    // =========================================================================
    // Test Suite: Address Validation and Normalization
    // =========================================================================

    #[test]
    fn test_validate_address_valid_lowercase() {
        let result = validate_and_normalize_address("0xabc123def456789012345678901234567890abcd");
        assert_eq!(result.unwrap(), "0xabc123def456789012345678901234567890abcd");
    }

    #[test]
    fn test_validate_address_adds_prefix_and_lowercases() {
        let result = validate_and_normalize_address("ABC123DEF456789012345678901234567890ABCD");
        assert_eq!(result.unwrap(), "0xabc123def456789012345678901234567890abcd");
    }

    #[test]
    fn test_validate_address_uppercase_prefix() {
        let result = validate_and_normalize_address("  0XABC123DEF456789012345678901234567890ABCD ");
        assert_eq!(result.unwrap(), "0xabc123def456789012345678901234567890abcd");
    }

    #[test]
    fn test_validate_address_too_short() {
        let result = validate_and_normalize_address("0xabc123");
        assert!(result.unwrap_err().contains("40 hex characters"));
    }

    #[test]
    fn test_validate_address_invalid_char() {
        let result = validate_and_normalize_address("0xabc123def456789012345678901234567890abgd");
        assert!(result.unwrap_err().contains("hexadecimal"));
    }

    // =========================================================================
    // Test Suite: Builtin chains
    // =========================================================================

    #[test]
    fn test_eth_routers_are_lowercased() {
        let eth = ChainConfig::eth();
        assert_eq!(eth.router_count(), 9);
        assert!(eth.is_router("0x3fc91a3afd70395cd496c647d5a6cc9d4b2b7fad"));
        assert!(!eth.is_router("0x3fC91A3afd70395Cd496C647d5a6CC9D4B2b7FAD"));
    }

    #[test]
    fn test_eth_stablecoins_and_weth() {
        let eth = ChainConfig::eth();
        assert!(eth.is_stablecoin("0xdac17f958d2ee523a2206206994597c13d831ec7"));
        assert!(eth.is_wrapped_native("0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"));
        assert_eq!(eth.explorer_endpoint, "etherscan.io");
    }

    #[test]
    fn test_bsc_has_its_own_lists() {
        let bsc = ChainConfig::bsc();
        assert_eq!(bsc.router_count(), 15);
        assert!(bsc.is_router("0x10ed43c718714eb63d5aa57b78b54704e256024e"));
        // Uniswap V2 router is an eth-only entry
        assert!(!bsc.is_router("0x7a250d5630b4cf539739df2c5dacb4c659f2488d"));
        assert_eq!(bsc.explorer_endpoint, "bscscan.com");
    }

    #[test]
    fn test_builtin_lookup() {
        assert_eq!(ChainConfig::builtin("ETH").unwrap().name, "eth");
        assert_eq!(ChainConfig::builtin("bnb").unwrap().name, "bsc");
        assert!(ChainConfig::builtin("solana").is_none());
    }

    // =========================================================================
    // Test Suite: Registry file loading
    // =========================================================================

    #[test]
    fn test_registry_from_file_adds_and_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{
                    "name": "ETH",
                    "explorer_endpoint": "etherscan.io",
                    "routers": ["0x1111111111111111111111111111111111111111"],
                    "stablecoins": []
                }},
                {{
                    "name": "base",
                    "explorer_endpoint": "basescan.org",
                    "routers": ["0x2222222222222222222222222222222222222222"],
                    "wrapped_native": "0x4200000000000000000000000000000000000006"
                }}
            ]"#
        )
        .unwrap();

        let registry = ChainRegistry::from_file(file.path()).unwrap();
        assert_eq!(registry.len(), 3);

        let eth = registry.get("eth").unwrap();
        assert_eq!(eth.router_count(), 1);
        assert!(eth.wrapped_native.is_none());

        let base = registry.get("base").unwrap();
        assert!(base.is_router("0x2222222222222222222222222222222222222222"));
        assert!(base.is_wrapped_native("0x4200000000000000000000000000000000000006"));
        assert!(registry.get("bsc").is_some());
    }

    #[test]
    fn test_registry_from_file_rejects_bad_address() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name": "x", "explorer_endpoint": "x.io", "routers": ["0x12"]}}]"#
        )
        .unwrap();

        let err = ChainRegistry::from_file(file.path()).unwrap_err();
        assert!(err.contains("Chain 'x'"));
    }

    #[test]
    fn test_registry_from_file_empty_list() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[]").unwrap();
        assert!(ChainRegistry::from_file(file.path()).unwrap_err().contains("no chain"));
    }
}
