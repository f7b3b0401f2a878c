//! Per-Token Aggregation Module
//!
//! Selects the confirmed swap rows that count as trading activity and sums them per
//! (token contract, side). Tokens with both a buy and a sell aggregate get realized
//! result columns on their sell row.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::debug;

use crate::config::ChainConfig;
use crate::models::{EnrichedTransaction, SwapSide};

/// Which swap rows make it into the trading set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapFilter {
    /// Drop every row of a token that was sniped at least once
    pub drop_snipes: bool,
    /// Drop every row of a token that was ever transferred in or out without a trade
    pub drop_in_out_tokens: bool,
    /// Drop stablecoin contracts
    pub drop_stablecoins: bool,
    /// Count `other_buy`/`other_sell` heuristics as trades
    pub include_other_swaps: bool,
}

impl Default for SwapFilter {
    fn default() -> Self {
        Self {
            drop_snipes: true,
            drop_in_out_tokens: true,
            drop_stablecoins: false,
            include_other_swaps: false,
        }
    }
}

impl SwapFilter {
    /// Every confirmed router swap, nothing dropped
    pub fn none() -> Self {
        Self {
            drop_snipes: false,
            drop_in_out_tokens: false,
            drop_stablecoins: false,
            include_other_swaps: false,
        }
    }
}

/// Confirmed swap rows after filtering, in input order
pub fn get_swap_txs(
    txs: &[EnrichedTransaction],
    filter: &SwapFilter,
    chain: &ChainConfig,
) -> Vec<EnrichedTransaction> {
    let sniped: FxHashSet<&str> = if filter.drop_snipes {
        txs.iter()
            .filter(|tx| tx.snipe)
            .filter_map(|tx| tx.token_contract.as_deref())
            .collect()
    } else {
        FxHashSet::default()
    };

    let transferred: FxHashSet<&str> = if filter.drop_in_out_tokens {
        txs.iter()
            .filter(|tx| tx.tx_type.is_token_transfer())
            .filter_map(|tx| tx.token_contract.as_deref())
            .collect()
    } else {
        FxHashSet::default()
    };

    let swaps: Vec<EnrichedTransaction> = txs
        .iter()
        .filter(|tx| match tx.swap_type {
            Some(s) => s.is_router_swap() || filter.include_other_swaps,
            None => false,
        })
        .filter(|tx| match tx.token_contract.as_deref() {
            Some(contract) => {
                !sniped.contains(contract)
                    && !transferred.contains(contract)
                    && !(filter.drop_stablecoins && chain.is_stablecoin(contract))
            }
            None => false,
        })
        .cloned()
        .collect();

    debug!(
        swaps = swaps.len(),
        sniped_tokens = sniped.len(),
        transferred_tokens = transferred.len(),
        "Selected swap rows"
    );
    swaps
}

/// Sums of one side of one token's trades
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenTradeAggregate {
    pub token_contract: String,
    pub token_name: String,
    pub token_symbol: String,
    pub side: SwapSide,
    /// Native asset spent (buy) or received (sell)
    pub native_value: f64,
    pub token_value: f64,
    pub orders: usize,
    /// Set on the sell row of tokens traded on both sides
    pub token_result: Option<f64>,
    pub eth_result: Option<f64>,
    pub unsold_tokens_percentage: Option<f64>,
    /// 100 is break-even
    pub trade_result_percentage: Option<f64>,
}

impl TokenTradeAggregate {
    fn new(tx: &EnrichedTransaction, contract: &str, side: SwapSide) -> Self {
        Self {
            token_contract: contract.to_string(),
            token_name: tx.token_name.clone().unwrap_or_default(),
            token_symbol: tx.token_symbol.clone().unwrap_or_default(),
            side,
            native_value: 0.0,
            token_value: 0.0,
            orders: 0,
            token_result: None,
            eth_result: None,
            unsold_tokens_percentage: None,
            trade_result_percentage: None,
        }
    }

    /// Both sides were traded and the result columns are filled
    pub fn is_closed_pair(&self) -> bool {
        self.eth_result.is_some()
    }
}

/// Group swap rows by (token, side), buy before sell, tokens in contract order
pub fn aggregate_tokens(swaps: &[EnrichedTransaction]) -> Vec<TokenTradeAggregate> {
    let mut groups: BTreeMap<(String, SwapSide), TokenTradeAggregate> = BTreeMap::new();

    for tx in swaps {
        let (Some(side), Some(contract)) = (tx.swap_side(), tx.token_contract.as_deref()) else {
            continue;
        };
        let agg = groups
            .entry((contract.to_string(), side))
            .or_insert_with(|| TokenTradeAggregate::new(tx, contract, side));
        agg.native_value += tx.swap_counter_value.unwrap_or(0.0);
        agg.token_value += tx.token_value.unwrap_or(0.0);
        agg.orders += 1;
    }

    let mut rows: Vec<TokenTradeAggregate> = groups.into_values().collect();

    // Buy and sell of the same token are adjacent after the BTreeMap ordering
    for i in 1..rows.len() {
        let (head, tail) = rows.split_at_mut(i);
        let buy = &head[i - 1];
        let sell = &mut tail[0];
        if buy.token_contract != sell.token_contract
            || buy.side != SwapSide::Buy
            || sell.side != SwapSide::Sell
        {
            continue;
        }

        let token_result = sell.token_value - buy.token_value;
        let eth_result = sell.native_value - buy.native_value;
        let unsold_denominator = sell.token_value + token_result.abs();

        sell.token_result = Some(token_result);
        sell.eth_result = Some(eth_result);
        sell.unsold_tokens_percentage =
            (unsold_denominator != 0.0).then(|| -token_result / unsold_denominator * 100.0);
        sell.trade_result_percentage =
            (buy.native_value != 0.0).then(|| eth_result * 100.0 / buy.native_value + 100.0);
    }

    debug!(rows = rows.len(), "Aggregated token trades");
    rows
}
