// settings.rs - Settings and configuration management
//
// Environment variable loading and validation

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::aggregator::SwapFilter;
use crate::analyzer::AnalysisOptions;
use crate::config::{ChainConfig, ChainRegistry};
use crate::snipes::DEFAULT_OVERSHOOT_FACTOR;

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_CHAIN: &str = "eth";
pub const DEFAULT_CACHE_PATH: &str = "cache/cache.db";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3 * 60 * 60;

// ============================================================================
// Runtime Configuration (loaded from environment)
// ============================================================================

#[derive(Debug, Clone)]
pub struct Settings {
    // Chain registry entry the analysis runs against
    pub chain: ChainConfig,

    // Explorer API
    pub api_key: Option<String>,

    // Response cache
    pub cache_enabled: bool,
    pub cache_path: PathBuf,
    pub cache_ttl: Duration,

    // Snipe detection input (explorer "average gas price" CSV export)
    pub gas_prices_csv: Option<PathBuf>,

    // Analysis tunables
    pub options: AnalysisOptions,
}

impl Settings {
    /// Load configuration from environment variables (call `dotenv().ok()` first to
    /// pick up a `.env` file)
    ///
    /// # Errors
    ///
    /// Returns errors if `CHAIN` names an unknown chain or `CHAINS_FILE` cannot be loaded.
    pub fn from_env() -> Result<Self> {
        let chain_name = env::var("CHAIN").unwrap_or_else(|_| DEFAULT_CHAIN.to_string());
        let chain = load_chain(&chain_name, env::var("CHAINS_FILE").ok().as_deref())?;

        let api_key = env::var("ETHERSCAN_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty() && k != "your_api_key_here");

        let gas_prices_csv = env::var("GAS_PRICES_CSV")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            chain,
            api_key,
            cache_enabled: env_parse_bool("CACHE_ENABLED", true),
            cache_path: env::var("CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CACHE_PATH)),
            cache_ttl: Duration::from_secs(env_parse("CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)),
            gas_prices_csv,
            options: AnalysisOptions {
                overshoot_factor: env_parse("SNIPE_OVERSHOOT", DEFAULT_OVERSHOOT_FACTOR),
                wrapped_native_rule: env_parse_bool("WRAPPED_NATIVE_RULE", true),
                filter: SwapFilter {
                    drop_snipes: env_parse_bool("DROP_SNIPES", true),
                    drop_in_out_tokens: env_parse_bool("DROP_IN_OUT_TOKENS", true),
                    drop_stablecoins: env_parse_bool("DROP_STABLECOINS", false),
                    include_other_swaps: env_parse_bool("INCLUDE_OTHER_SWAPS", false),
                },
            },
        })
    }
}

/// Resolve a chain by name, from `chains_file` when given, else from the builtins
pub fn load_chain(name: &str, chains_file: Option<&str>) -> Result<ChainConfig> {
    let registry = match chains_file {
        Some(path) => ChainRegistry::from_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to load chain configuration: {}", e))?,
        None => ChainRegistry::builtin(),
    };

    registry
        .get(name)
        .cloned()
        .with_context(|| format!("Unknown chain '{}'. Builtin chains: eth, bsc", name))
}

/// Parse env var with default fallback
pub fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parse boolean env var with support for "true", "1", "false", "0"
pub fn env_parse_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => {
            let v = v.trim();
            if v.eq_ignore_ascii_case("true") || v == "1" {
                true
            } else if v.eq_ignore_ascii_case("false") || v == "0" {
                false
            } else {
                default
            }
        }
        Err(_) => default,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own variable names; the process environment is shared
    // between test threads.

    #[test]
    fn test_env_parse_default_when_missing() {
        assert_eq!(env_parse("WA_TEST_MISSING_NUMBER", 42u64), 42);
    }

    #[test]
    fn test_env_parse_reads_value() {
        unsafe { env::set_var("WA_TEST_OVERSHOOT", " 2.5 ") };
        assert_eq!(env_parse("WA_TEST_OVERSHOOT", 1.6f64), 2.5);
    }

    #[test]
    fn test_env_parse_malformed_falls_back() {
        unsafe { env::set_var("WA_TEST_TTL", "three hours") };
        assert_eq!(env_parse("WA_TEST_TTL", 10_800u64), 10_800);
    }

    #[test]
    fn test_env_parse_bool_variants() {
        unsafe {
            env::set_var("WA_TEST_BOOL_TRUE", "TRUE");
            env::set_var("WA_TEST_BOOL_ONE", "1");
            env::set_var("WA_TEST_BOOL_ZERO", "0");
            env::set_var("WA_TEST_BOOL_JUNK", "maybe");
        }
        assert!(env_parse_bool("WA_TEST_BOOL_TRUE", false));
        assert!(env_parse_bool("WA_TEST_BOOL_ONE", false));
        assert!(!env_parse_bool("WA_TEST_BOOL_ZERO", true));
        assert!(env_parse_bool("WA_TEST_BOOL_JUNK", true));
        assert!(!env_parse_bool("WA_TEST_BOOL_MISSING", false));
    }

    #[test]
    fn test_load_builtin_chain() {
        let chain = load_chain("bsc", None).unwrap();
        assert_eq!(chain.name, "bsc");
        assert_eq!(chain.explorer_endpoint, "bscscan.com");
    }

    #[test]
    fn test_load_unknown_chain_fails() {
        let err = load_chain("polygon", None).unwrap_err();
        assert!(err.to_string().contains("Unknown chain 'polygon'"));
    }

    #[test]
    fn test_load_chain_from_missing_file_fails() {
        let err = load_chain("eth", Some("/nonexistent/chains.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to load chain configuration"));
    }
}
