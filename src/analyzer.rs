//! Wallet analysis session
//!
//! `WalletAnalyzer` owns the normalized feeds and the enriched transaction table of
//! one wallet on one chain. `get_data`/`load` replace the inputs, `calculate` rebuilds
//! the enriched table from scratch, and the report accessors derive everything else
//! from that table.

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use crate::aggregator::{aggregate_tokens, get_swap_txs, SwapFilter, TokenTradeAggregate};
use crate::classifier::Classifier;
use crate::config::ChainConfig;
use crate::error::AnalyzerError;
use crate::feeds::{FeedProvider, FeedSet};
use crate::models::{EnrichedTransaction, InternalTransfer, TokenTransfer, Transaction};
use crate::normalizer::{normalize_internal_transfers, normalize_token_transfers, normalize_transactions};
use crate::reconciler::{ReconcileStats, Reconciler};
use crate::rolling::{compute_rolling_metrics, RollingMetricsRow};
use crate::snipes::{detect_snipes, GasPriceBaseline, DEFAULT_OVERSHOOT_FACTOR};
use crate::summary::{kpis, wallet_totals, Kpis, WalletTotals};

/// Tunables of one analysis run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisOptions {
    /// Multiple of the daily average gas price above which a buy is a snipe
    pub overshoot_factor: f64,
    /// Treat wrapped-native token legs of router swaps as native value
    pub wrapped_native_rule: bool,
    /// Selection of the trading set for aggregates, rolling metrics and totals
    pub filter: SwapFilter,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            overshoot_factor: DEFAULT_OVERSHOOT_FACTOR,
            wrapped_native_rule: true,
            filter: SwapFilter::default(),
        }
    }
}

/// Normalized input tables
#[derive(Debug, Clone, Default)]
struct NormalizedFeeds {
    transactions: Vec<Transaction>,
    token_transfers: Vec<TokenTransfer>,
    internal_transfers: Vec<InternalTransfer>,
}

/// Every output table of a finished analysis
#[derive(Debug, Clone, Serialize)]
pub struct WalletReport {
    pub wallet: String,
    pub chain: String,
    pub kpis: Kpis,
    pub totals: WalletTotals,
    pub tokens: Vec<TokenTradeAggregate>,
    pub rolling: Vec<RollingMetricsRow>,
    pub transactions: Vec<EnrichedTransaction>,
}

pub struct WalletAnalyzer {
    wallet: String,
    chain: ChainConfig,
    options: AnalysisOptions,
    baseline: GasPriceBaseline,
    feeds: Option<NormalizedFeeds>,
    enriched: Vec<EnrichedTransaction>,
    stats: ReconcileStats,
    calculated: bool,
}

impl WalletAnalyzer {
    pub fn new(wallet: &str, chain: ChainConfig, options: AnalysisOptions) -> Self {
        Self {
            wallet: wallet.trim().to_lowercase(),
            chain,
            options,
            baseline: GasPriceBaseline::new(),
            feeds: None,
            enriched: Vec::new(),
            stats: ReconcileStats::default(),
            calculated: false,
        }
    }

    /// Daily gas price averages used by snipe detection; without them nothing is a snipe
    pub fn with_gas_baseline(mut self, baseline: GasPriceBaseline) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn wallet(&self) -> &str {
        &self.wallet
    }

    pub fn chain(&self) -> &ChainConfig {
        &self.chain
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    /// Fetch the three feeds from `provider` and normalize them
    pub fn get_data(&mut self, provider: &dyn FeedProvider, start_block: u64) -> Result<()> {
        let feeds = provider.fetch(&self.wallet, start_block)?;
        self.load(&feeds)?;
        Ok(())
    }

    /// Normalize already fetched feeds. Any previous results are discarded.
    pub fn load(&mut self, feeds: &FeedSet) -> Result<(), AnalyzerError> {
        let normalized = NormalizedFeeds {
            transactions: normalize_transactions(&feeds.transactions)?,
            token_transfers: normalize_token_transfers(&feeds.token_transfers)?,
            internal_transfers: normalize_internal_transfers(&feeds.internal_transfers)?,
        };

        info!(
            wallet = %self.wallet,
            chain = %self.chain.name,
            transactions = normalized.transactions.len(),
            token_transfers = normalized.token_transfers.len(),
            internal_transfers = normalized.internal_transfers.len(),
            "Wallet data loaded"
        );

        self.feeds = Some(normalized);
        self.enriched.clear();
        self.stats = ReconcileStats::default();
        self.calculated = false;
        Ok(())
    }

    /// Classify, reconcile and flag snipes. Always starts over from the normalized
    /// feeds, so calling it again gives the same table.
    pub fn calculate(&mut self) -> Result<&[EnrichedTransaction], AnalyzerError> {
        let feeds = self.feeds.as_ref().ok_or(AnalyzerError::NotLoaded)?;

        let classifier = Classifier::new(&self.wallet, &self.chain);
        let mut classified = Vec::with_capacity(feeds.transactions.len());
        for tx in &feeds.transactions {
            let tx_type = classifier
                .classify(&tx.from, &tx.to, &tx.method_id, tx.value)
                .map_err(|source| AnalyzerError::Classify {
                    hash: tx.hash.clone(),
                    source,
                })?;
            classified.push(EnrichedTransaction::from_transaction(tx.clone(), tx_type));
        }

        let (mut enriched, stats) = Reconciler::new(&self.wallet, &self.chain)
            .with_wrapped_native_rule(self.options.wrapped_native_rule)
            .reconcile(classified, &feeds.token_transfers, &feeds.internal_transfers);

        let snipes = detect_snipes(&mut enriched, &self.baseline, self.options.overshoot_factor);

        info!(
            wallet = %self.wallet,
            rows = enriched.len(),
            swaps = stats.swap_buys + stats.swap_sells,
            snipes,
            "Wallet transactions classified"
        );

        self.enriched = enriched;
        self.stats = stats;
        self.calculated = true;
        Ok(&self.enriched)
    }

    fn ensure_calculated(&self) -> Result<(), AnalyzerError> {
        if self.feeds.is_none() {
            return Err(AnalyzerError::NotLoaded);
        }
        if !self.calculated {
            return Err(AnalyzerError::NotCalculated);
        }
        Ok(())
    }

    /// Enriched transaction table of the last `calculate`
    pub fn transactions(&self) -> &[EnrichedTransaction] {
        &self.enriched
    }

    pub fn stats(&self) -> ReconcileStats {
        self.stats
    }

    /// Confirmed swaps selected by `filter`
    pub fn get_swap_txs(&self, filter: &SwapFilter) -> Vec<EnrichedTransaction> {
        get_swap_txs(&self.enriched, filter, &self.chain)
    }

    /// Per-token aggregates over the configured trading set
    pub fn token_trades(&self) -> Vec<TokenTradeAggregate> {
        aggregate_tokens(&self.get_swap_txs(&self.options.filter))
    }

    /// Rolling metrics over the configured trading set
    pub fn rolling_metrics(&self) -> Vec<RollingMetricsRow> {
        compute_rolling_metrics(&self.get_swap_txs(&self.options.filter))
    }

    pub fn totals(&self) -> WalletTotals {
        wallet_totals(&self.wallet, &self.enriched, &self.get_swap_txs(&self.options.filter))
    }

    pub fn kpis(&self) -> Kpis {
        let swaps = self.get_swap_txs(&self.options.filter);
        kpis(&self.enriched, &swaps, &aggregate_tokens(&swaps))
    }

    /// All report tables at once; fails until `calculate` ran on the loaded feeds
    pub fn report(&self) -> Result<WalletReport, AnalyzerError> {
        self.ensure_calculated()?;
        let swaps = self.get_swap_txs(&self.options.filter);
        let tokens = aggregate_tokens(&swaps);

        Ok(WalletReport {
            wallet: self.wallet.clone(),
            chain: self.chain.name.clone(),
            kpis: kpis(&self.enriched, &swaps, &tokens),
            totals: wallet_totals(&self.wallet, &self.enriched, &swaps),
            rolling: compute_rolling_metrics(&swaps),
            tokens,
            transactions: self.enriched.clone(),
        })
    }
}
