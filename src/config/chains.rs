// chains.rs - Chain configuration structures and parsing
//
// Known DEX routers, stablecoins and the wrapped native token for each supported chain

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// ERC-20 `approve(address,uint256)` selector
pub const APPROVE_SELECTOR: &str = "0x095ea7b3";

// Ethereum mainnet
const ETH_ROUTERS: [&str; 9] = [
    "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D", // Uniswap V2 Router 2
    "0x68b3465833fb72A70ecDF485E0e4C7bD8665Fc45", // Uniswap V3 Router 2
    "0xd9e1cE17f2641f24aE83637ab66a2cca9C378B9F", // SushiSwap
    "0xEf1c6E67703c7BD7107eed8303Fbe6EC2554BF6B", // Uniswap old Universal Router
    "0x1111111254EEB25477B68fb85Ed929f73A960582", // 1inch v5 Aggregation Router
    "0x881D40237659C251811CEC9c364ef91dC08D300C", // MetaMask Swap Router
    "0x6131B5fae19EA4f9D964eAc0408E4408b66337b5", // KyberSwap Meta Aggregation Router v2
    "0x00000000009726632680FB29d3F7A9734E3010E2", // Rainbow Router
    "0x3fC91A3afd70395Cd496C647d5a6CC9D4B2b7FAD", // Uniswap Universal Router
];
const ETH_STABLECOINS: [&str; 4] = [
    "0xdAC17F958D2ee523a2206206994597C13D831ec7", // USDT
    "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", // USDC
    "0x6B175474E89094C44Da98b954EedeAC495271d0F", // DAI
    "0x4Fabb145d64652a948d72533023f6E7A623C7C53", // BUSD
];
const WETH: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";

// BNB Smart Chain
const BSC_ROUTERS: [&str; 15] = [
    "0x10ED43C718714eb63d5aA57B78B54704E256024E", // PancakeSwap v2
    "0x13f4EA83D0bd40E75C8222255bc855a974568Dd4", // PancakeSwap v3
    "0x00000000009726632680FB29d3F7A9734E3010E2", // Rainbow Router
    "0xC0788A3aD43d79aa53B09c2EaCc313A787d1d607", // ApeSwap
    "0xCDe540d7eAFE93aC5fE6233Bee57E1270D3E330F", // BakerySwap
    "0x9cb73F20164e399958261c289Eb5F9846f4D1404", // Belt Finance
    "0x58F876857a02D6762E0101bb5C46A8c1ED44Dc16", // BurgerSwap
    "0x933DAea3a5995Fb94b14A7696a5F3ffD7B1E385A", // CafeSwap
    "0x0ED7e52944161450477ee417DE9Cd3a859b14fD0", // CakeDeFi
    "0x3e9c2ee838072b370567efc2df27602d776b341c", // Crow Finance
    "0x029f944cd3afa7c229122b19c706d8f9c6bcc963", // Dopple
    "0x160CAed03795365F3A589f10C379FfA7d75d4E76", // Ellipsis
    "0x1b02dA8Cb0d097eB8D57A175b88c7D8b47997506", // SushiSwap
    "0x6131B5fae19EA4f9D964eAc0408E4408b66337b5", // KyberSwap Meta Aggregation Router v2
    "0x1a1ec25DC08e98e5E93F1104B5e5cdD298707d31", // MetaMask Swap Router
];
const BSC_STABLECOINS: [&str; 4] = [
    "0xe9e7CEA3DedcA5984780Bafc599bD69ADd087D56", // BUSD
    "0x55d398326f99059fF775485246999027B3197955", // USDT
    "0x8AC76a51cc950d9822D68b83fE1Ad97B32Cd580d", // USDC
    "0x1AF3F329e8BE154074D8769D1FFa4eE058B1DBc3", // DAI
];
const WBNB: &str = "0xbb4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c";

/// JSON representation of a chain entry for file parsing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfigJson {
    pub name: String,
    pub explorer_endpoint: String,
    #[serde(default)]
    pub routers: Vec<String>,
    #[serde(default)]
    pub stablecoins: Vec<String>,
    #[serde(default)]
    pub wrapped_native: Option<String>,
}

/// Static, chain-specific registry the classifier and reconciler are built with
#[derive(Debug, Clone, PartialEq)]
pub struct ChainConfig {
    /// Short chain name ("eth", "bsc")
    pub name: String,
    /// Explorer API host, e.g. "etherscan.io"
    pub explorer_endpoint: String,
    routers: HashSet<String>,
    stablecoins: HashSet<String>,
    /// Wrapped native asset token contract (WETH, WBNB)
    pub wrapped_native: Option<String>,
}

impl ChainConfig {
    /// Creates a ChainConfig, validating and lowercasing every address
    pub fn new(
        name: &str,
        explorer_endpoint: &str,
        routers: &[&str],
        stablecoins: &[&str],
        wrapped_native: Option<&str>,
    ) -> Result<Self, String> {
        let routers = routers
            .iter()
            .map(|a| validate_and_normalize_address(a))
            .collect::<Result<HashSet<_>, _>>()?;
        let stablecoins = stablecoins
            .iter()
            .map(|a| validate_and_normalize_address(a))
            .collect::<Result<HashSet<_>, _>>()?;
        let wrapped_native = wrapped_native.map(validate_and_normalize_address).transpose()?;

        Ok(Self {
            name: name.to_lowercase(),
            explorer_endpoint: explorer_endpoint.to_string(),
            routers,
            stablecoins,
            wrapped_native,
        })
    }

    // Builtin lists are checksummed literals, only case needs normalizing
    fn from_static(
        name: &str,
        explorer_endpoint: &str,
        routers: &[&str],
        stablecoins: &[&str],
        wrapped_native: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            explorer_endpoint: explorer_endpoint.to_string(),
            routers: routers.iter().map(|a| a.to_lowercase()).collect(),
            stablecoins: stablecoins.iter().map(|a| a.to_lowercase()).collect(),
            wrapped_native: Some(wrapped_native.to_lowercase()),
        }
    }

    /// Ethereum mainnet with the default router and stablecoin lists
    pub fn eth() -> Self {
        Self::from_static("eth", "etherscan.io", &ETH_ROUTERS, &ETH_STABLECOINS, WETH)
    }

    /// BNB Smart Chain with the default router and stablecoin lists
    pub fn bsc() -> Self {
        Self::from_static("bsc", "bscscan.com", &BSC_ROUTERS, &BSC_STABLECOINS, WBNB)
    }

    /// Builtin configuration by chain name
    pub fn builtin(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "eth" | "ethereum" => Some(Self::eth()),
            "bsc" | "bnb" => Some(Self::bsc()),
            _ => None,
        }
    }

    /// Chain `name` from a chain JSON file, falling back to the builtin of that name
    pub fn from_json_file<P: AsRef<Path>>(path: P, name: &str) -> Result<Self, String> {
        let registry = ChainRegistry::from_file(path)?;
        registry
            .get(name)
            .cloned()
            .ok_or_else(|| format!("Unknown chain '{}'", name))
    }

    pub fn is_router(&self, address: &str) -> bool {
        self.routers.contains(address)
    }

    pub fn is_stablecoin(&self, contract: &str) -> bool {
        self.stablecoins.contains(contract)
    }

    pub fn is_wrapped_native(&self, contract: &str) -> bool {
        self.wrapped_native.as_deref() == Some(contract)
    }

    pub fn router_count(&self) -> usize {
        self.routers.len()
    }

    pub fn stablecoins(&self) -> impl Iterator<Item = &String> {
        self.stablecoins.iter()
    }

    fn from_json(json: &ChainConfigJson) -> Result<Self, String> {
        let routers: Vec<&str> = json.routers.iter().map(String::as_str).collect();
        let stablecoins: Vec<&str> = json.stablecoins.iter().map(String::as_str).collect();
        Self::new(
            &json.name,
            &json.explorer_endpoint,
            &routers,
            &stablecoins,
            json.wrapped_native.as_deref(),
        )
        .map_err(|e| format!("Chain '{}': {}", json.name, e))
    }
}

/// Validates an EVM address and normalizes it to `0x` + 40 lowercase hex characters
///
/// # Examples
/// ```
/// use wallet_analyzer::config::chains::validate_and_normalize_address;
///
/// let addr = validate_and_normalize_address("0xABC123def456789012345678901234567890abcd").unwrap();
/// assert_eq!(addr, "0xabc123def456789012345678901234567890abcd");
/// ```
pub fn validate_and_normalize_address(input: &str) -> Result<String, String> {
    let trimmed = input.trim();

    let without_prefix = match trimmed.get(..2) {
        Some(prefix) if prefix.eq_ignore_ascii_case("0x") => &trimmed[2..],
        _ => trimmed,
    };

    if without_prefix.len() != 40 {
        return Err(format!(
            "Address must be exactly 40 hex characters after 0x (found {}): {}",
            without_prefix.len(),
            trimmed
        ));
    }

    if !without_prefix.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!(
            "Address contains invalid characters. Must be hexadecimal (0-9, a-f, A-F): {}",
            trimmed
        ));
    }

    Ok(format!("0x{}", without_prefix.to_lowercase()))
}

/// All chains available to an analysis session, keyed by name
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: FxHashMap<String, ChainConfig>,
}

impl ChainRegistry {
    /// Registry holding the builtin `eth` and `bsc` chains
    pub fn builtin() -> Self {
        let mut chains = FxHashMap::default();
        for chain in [ChainConfig::eth(), ChainConfig::bsc()] {
            chains.insert(chain.name.clone(), chain);
        }
        Self { chains }
    }

    /// Loads chains from a JSON file on top of the builtin ones
    ///
    /// Expected JSON format:
    /// ```json
    /// [
    ///   {
    ///     "name": "eth",
    ///     "explorer_endpoint": "etherscan.io",
    ///     "routers": ["0x7a25..."],
    ///     "stablecoins": ["0xdac1..."],
    ///     "wrapped_native": "0xc02a..."
    ///   }
    /// ]
    /// ```
    /// Entries replace builtin chains of the same name.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read file {}: {}", path.display(), e))?;

        let json_configs: Vec<ChainConfigJson> = serde_json::from_str(&contents)
            .map_err(|e| format!("Failed to parse JSON: {}", e))?;

        if json_configs.is_empty() {
            return Err("JSON file contains no chain configurations".to_string());
        }

        let mut registry = Self::builtin();
        for json in &json_configs {
            let chain = ChainConfig::from_json(json)?;
            registry.chains.insert(chain.name.clone(), chain);
        }

        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&ChainConfig> {
        let name = name.trim().to_lowercase();
        let key = match name.as_str() {
            "ethereum" => "eth",
            "bnb" => "bsc",
            other => other,
        };
        self.chains.get(key)
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}
