//! Wallet totals and KPIs
//!
//! Wallet-level sums over the enriched table and the headline KPIs of the dashboard.

use serde::Serialize;

use crate::aggregator::TokenTradeAggregate;
use crate::models::{EnrichedTransaction, SwapSide, SwapType, TxType};

/// Native, stablecoin and fee flows of the whole wallet
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WalletTotals {
    pub total_eth_in: f64,
    pub total_eth_internal_in: f64,
    pub total_eth_out: f64,
    /// Over the filtered swap set
    pub total_eth_buy: f64,
    pub total_eth_sell: f64,
    pub total_stablecoins_in: f64,
    pub total_stablecoins_out: f64,
    pub total_fees_eth: f64,
    pub count_tokens_in: usize,
    pub count_tokens_out: usize,
}

impl WalletTotals {
    /// Native received from sells minus native spent on buys
    pub fn trading_result(&self) -> f64 {
        self.total_eth_sell - self.total_eth_buy
    }
}

/// `txs` is the full enriched table, `swaps` the filtered trading set
pub fn wallet_totals(wallet: &str, txs: &[EnrichedTransaction], swaps: &[EnrichedTransaction]) -> WalletTotals {
    let mut totals = WalletTotals::default();

    for tx in txs {
        match tx.tx_type {
            TxType::EthTransferIn => totals.total_eth_in += tx.value,
            TxType::EthOtherTransferIn => totals.total_eth_internal_in += tx.value,
            TxType::EthTransferOut => totals.total_eth_out += tx.value,
            TxType::StablecoinsTransferIn => totals.total_stablecoins_in += tx.token_value.unwrap_or(0.0),
            TxType::StablecoinsTransferOut => totals.total_stablecoins_out += tx.token_value.unwrap_or(0.0),
            TxType::TokensTransferIn => totals.count_tokens_in += 1,
            TxType::TokensTransferOut => totals.count_tokens_out += 1,
            _ => {}
        }
        if tx.from == wallet {
            totals.total_fees_eth += tx.fee();
        }
    }

    for tx in swaps {
        let native = tx.swap_counter_value.unwrap_or(0.0);
        match tx.swap_side() {
            Some(SwapSide::Buy) => totals.total_eth_buy += native,
            Some(SwapSide::Sell) => totals.total_eth_sell += native,
            None => {}
        }
    }

    totals
}

/// Headline numbers of the report
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Kpis {
    /// Sum of realized native results over tokens traded on both sides
    pub final_trade_result: f64,
    /// Sniped router buys as a share of all router buys
    pub snipes_percent: f64,
    /// Mean native value of a buy
    pub avg_trade_size: f64,
    /// Mean trade result percentage over tokens traded on both sides (100 = break-even)
    pub avg_trade_result: f64,
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

pub fn kpis(txs: &[EnrichedTransaction], swaps: &[EnrichedTransaction], tokens: &[TokenTradeAggregate]) -> Kpis {
    let router_buys = txs.iter().filter(|tx| tx.swap_type == Some(SwapType::SwapBuy));
    let (buys, snipes) = router_buys.fold((0usize, 0usize), |(b, s), tx| (b + 1, s + usize::from(tx.snipe)));

    Kpis {
        final_trade_result: tokens.iter().filter_map(|t| t.eth_result).sum(),
        snipes_percent: if buys == 0 { 0.0 } else { snipes as f64 * 100.0 / buys as f64 },
        avg_trade_size: mean(
            swaps
                .iter()
                .filter(|tx| tx.swap_side() == Some(SwapSide::Buy))
                .map(|tx| tx.swap_counter_value.unwrap_or(0.0)),
        ),
        avg_trade_result: mean(tokens.iter().filter_map(|t| t.trade_result_percentage)),
    }
}
