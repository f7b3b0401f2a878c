// Integration tests for the full analysis pipeline
//
// Raw explorer rows -> normalize -> classify -> reconcile -> snipes -> reports

use chrono::NaiveDate;
use wallet_analyzer::aggregator::SwapFilter;
use wallet_analyzer::models::{RawInternalTransfer, RawTokenTransfer, RawTransaction};
use wallet_analyzer::snipes::GasPriceBaseline;
use wallet_analyzer::{
    AnalysisOptions, AnalyzerError, ChainConfig, FeedSet, SwapSide, SwapType, TxType, WalletAnalyzer,
};

const WALLET: &str = "0xcecfce5556a66bf8cb1a9f3005ce5496363a88aa";
const EXCHANGE: &str = "0x3f5ce5fbfe3e9af3971dd833d26ba9b5c936f0be";
const UNIVERSAL_ROUTER: &str = "0x3fc91a3afd70395cd496c647d5a6cc9d4b2b7fad";
const PAIR: &str = "0xa43fe16908251ee70ef74718545e4fe6c5ccec9f";
const PEPE: &str = "0x6982508145454ce325ddbe47a25d4ec3d2311933";

const ETH_IN_HASH: &str = "0xaaa1";
const UNMATCHED_HASH: &str = "0xaaa2";
const BUY_HASH: &str = "0xaaa3";
const SELL_HASH: &str = "0xaaa4";

// 2023-11-14 22:13:20 UTC
const BASE_TS: i64 = 1_700_000_000;
const GWEI: u64 = 1_000_000_000;

// ============================================================================
// Fixtures
// ============================================================================

fn raw_tx(hash: &str, block: u64, from: &str, to: &str, value_wei: &str, method_id: &str, gas_price: u64) -> RawTransaction {
    RawTransaction {
        block_number: block.to_string(),
        timestamp: (BASE_TS + block as i64).to_string(),
        hash: hash.to_string(),
        nonce: block.to_string(),
        block_hash: format!("0xb{}", block),
        transaction_index: "0".to_string(),
        from: from.to_string(),
        to: to.to_string(),
        value: value_wei.to_string(),
        gas: "300000".to_string(),
        gas_price: gas_price.to_string(),
        is_error: "0".to_string(),
        input: method_id.to_string(),
        contract_address: String::new(),
        cumulative_gas_used: "150000".to_string(),
        gas_used: "150000".to_string(),
        confirmations: "10".to_string(),
        method_id: method_id.to_string(),
        function_name: String::new(),
    }
}

fn raw_token(hash: &str, block: u64, from: &str, to: &str, value: &str) -> RawTokenTransfer {
    RawTokenTransfer {
        block_number: block.to_string(),
        timestamp: (BASE_TS + block as i64).to_string(),
        hash: hash.to_string(),
        nonce: block.to_string(),
        block_hash: format!("0xb{}", block),
        from: from.to_string(),
        contract_address: PEPE.to_string(),
        to: to.to_string(),
        value: value.to_string(),
        token_name: "Pepe".to_string(),
        token_symbol: "PEPE".to_string(),
        token_decimal: "18".to_string(),
        transaction_index: "0".to_string(),
        gas: "300000".to_string(),
        gas_price: (20 * GWEI).to_string(),
        gas_used: "150000".to_string(),
        cumulative_gas_used: "150000".to_string(),
        confirmations: "10".to_string(),
    }
}

fn raw_internal(hash: &str, block: u64, to: &str, value_wei: &str) -> RawInternalTransfer {
    RawInternalTransfer {
        block_number: block.to_string(),
        timestamp: (BASE_TS + block as i64).to_string(),
        hash: hash.to_string(),
        from: UNIVERSAL_ROUTER.to_string(),
        to: to.to_string(),
        value: value_wei.to_string(),
        contract_address: String::new(),
        kind: "call".to_string(),
        gas: "2300".to_string(),
        gas_used: "0".to_string(),
        trace_id: "0_1".to_string(),
        is_error: "0".to_string(),
        err_code: String::new(),
    }
}

/// (a) native deposit, (b) router call without a matching leg, (c) router buy,
/// (d) router sell of half the bought tokens
fn wallet_feeds(buy_gas_price: u64) -> FeedSet {
    FeedSet {
        transactions: vec![
            raw_tx(ETH_IN_HASH, 100, EXCHANGE, WALLET, "1000000000000000000", "0x", 20 * GWEI),
            raw_tx(UNMATCHED_HASH, 101, WALLET, UNIVERSAL_ROUTER, "0", "0x3593564c", 20 * GWEI),
            raw_tx(BUY_HASH, 102, WALLET, UNIVERSAL_ROUTER, "2000000000000000000", "0x3593564c", buy_gas_price),
            raw_tx(SELL_HASH, 103, WALLET, UNIVERSAL_ROUTER, "0", "0x3593564c", 20 * GWEI),
        ],
        token_transfers: vec![
            raw_token(UNMATCHED_HASH, 101, PAIR, WALLET, "50000000000000000000"),
            raw_token(BUY_HASH, 102, PAIR, WALLET, "200000000000000000000"),
            raw_token(SELL_HASH, 103, WALLET, PAIR, "100000000000000000000"),
        ],
        internal_transfers: vec![raw_internal(SELL_HASH, 103, WALLET, "3000000000000000000")],
    }
}

fn calculated(feeds: &FeedSet, options: AnalysisOptions, baseline: GasPriceBaseline) -> WalletAnalyzer {
    let mut analyzer = WalletAnalyzer::new(WALLET, ChainConfig::eth(), options).with_gas_baseline(baseline);
    analyzer.load(feeds).expect("Failed to load feeds");
    analyzer.calculate().expect("Failed to calculate");
    analyzer
}

fn baseline_for_fixture(gwei: u64) -> GasPriceBaseline {
    let mut baseline = GasPriceBaseline::new();
    baseline.insert(
        NaiveDate::from_ymd_opt(2023, 11, 14).unwrap(),
        (gwei * GWEI) as f64,
    );
    baseline
}

// =========================================================================
// Test Suite: Classification and reconciliation
// =========================================================================

#[test]
fn test_end_to_end_rows() {
    let analyzer = calculated(&wallet_feeds(20 * GWEI), AnalysisOptions::default(), GasPriceBaseline::new());
    let rows = analyzer.transactions();
    assert_eq!(rows.len(), 4);

    let row = |hash: &str| rows.iter().find(|r| r.hash == hash).expect("row missing");

    let deposit = row(ETH_IN_HASH);
    assert_eq!(deposit.tx_type, TxType::EthTransferIn);
    assert_eq!(deposit.value, 1.0);
    assert_eq!(deposit.swap_type, None);

    let unmatched = row(UNMATCHED_HASH);
    assert_eq!(unmatched.tx_type, TxType::SwapTxZeroValue);
    assert_eq!(unmatched.swap_type, None);
    assert_eq!(unmatched.swap_counter_value, None);
    assert_eq!(unmatched.token_value, None);

    let buy = row(BUY_HASH);
    assert_eq!(buy.tx_type, TxType::SwapTxNonzeroValue);
    assert_eq!(buy.swap_type, Some(SwapType::SwapBuy));
    assert_eq!(buy.swap_counter_value, Some(2.0));
    assert_eq!(buy.token_value, Some(200.0));
    assert_eq!(buy.token_contract.as_deref(), Some(PEPE));
    assert_eq!(buy.token_symbol.as_deref(), Some("pepe"));

    let sell = row(SELL_HASH);
    assert_eq!(sell.tx_type, TxType::SwapTxZeroValue);
    assert_eq!(sell.swap_type, Some(SwapType::SwapSell));
    assert_eq!(sell.swap_counter_value, Some(3.0));
    assert_eq!(sell.token_value, Some(100.0));

    let stats = analyzer.stats();
    assert_eq!(stats.swap_buys, 1);
    assert_eq!(stats.swap_sells, 1);
    assert_eq!(stats.unmatched_swaps, 1);
}

#[test]
fn test_calculate_is_idempotent() {
    let mut analyzer = calculated(&wallet_feeds(20 * GWEI), AnalysisOptions::default(), GasPriceBaseline::new());
    let first = analyzer.transactions().to_vec();

    let second = analyzer.calculate().unwrap().to_vec();
    assert_eq!(first, second);
}

#[test]
fn test_failed_transactions_are_dropped() {
    let mut feeds = wallet_feeds(20 * GWEI);
    feeds.transactions[0].is_error = "1".to_string();

    let analyzer = calculated(&feeds, AnalysisOptions::default(), GasPriceBaseline::new());
    assert!(analyzer.transactions().iter().all(|r| r.hash != ETH_IN_HASH));
}

#[test]
fn test_orphan_token_transfer_is_promoted() {
    let mut feeds = wallet_feeds(20 * GWEI);
    feeds
        .token_transfers
        .push(raw_token("0xairdrop", 104, PAIR, WALLET, "7000000000000000000"));

    let analyzer = calculated(&feeds, AnalysisOptions::default(), GasPriceBaseline::new());
    let airdrop = analyzer
        .transactions()
        .iter()
        .find(|r| r.hash == "0xairdrop")
        .expect("promoted row missing");
    assert_eq!(airdrop.tx_type, TxType::TokensTransferIn);
    assert_eq!(airdrop.token_value, Some(7.0));

    // A transferred-in token leaves the default trading set
    assert!(analyzer.get_swap_txs(&SwapFilter::default()).is_empty());
    assert_eq!(analyzer.get_swap_txs(&SwapFilter::none()).len(), 2);
}

#[test]
fn test_claimed_token_leaves_trading_set() {
    let distributor = "0x090d4613473dee047c3f2706764f49e0821d256e";
    let mut feeds = wallet_feeds(20 * GWEI);
    feeds
        .transactions
        .push(raw_tx("0xclaim", 104, WALLET, distributor, "0", "0x4e71d92d", 20 * GWEI));
    feeds
        .token_transfers
        .push(raw_token("0xclaim", 104, distributor, WALLET, "5000000000000000000"));

    let analyzer = calculated(&feeds, AnalysisOptions::default(), GasPriceBaseline::new());
    let claim = analyzer
        .transactions()
        .iter()
        .find(|r| r.hash == "0xclaim")
        .expect("claim row missing");
    assert_eq!(claim.tx_type, TxType::TokensTransferOut);
    assert_eq!(claim.token_contract.as_deref(), Some(PEPE));
    assert_eq!(analyzer.transactions().iter().filter(|r| r.hash == "0xclaim").count(), 1);

    assert!(analyzer.get_swap_txs(&SwapFilter::default()).is_empty());
    assert_eq!(analyzer.get_swap_txs(&SwapFilter::none()).len(), 2);
}

#[test]
fn test_non_numeric_integer_field_is_fatal() {
    let mut feeds = wallet_feeds(20 * GWEI);
    feeds.transactions[1].nonce = "abc".to_string();

    let mut analyzer = WalletAnalyzer::new(WALLET, ChainConfig::eth(), AnalysisOptions::default());
    assert!(matches!(analyzer.load(&feeds), Err(AnalyzerError::Ingest(_))));
}

// =========================================================================
// Test Suite: Reports
// =========================================================================

#[test]
fn test_token_aggregates_and_kpis() {
    let analyzer = calculated(&wallet_feeds(20 * GWEI), AnalysisOptions::default(), GasPriceBaseline::new());

    let tokens = analyzer.token_trades();
    assert_eq!(tokens.len(), 2);

    let buy = &tokens[0];
    assert_eq!(buy.side, SwapSide::Buy);
    assert_eq!(buy.native_value, 2.0);
    assert_eq!(buy.token_value, 200.0);
    assert_eq!(buy.eth_result, None);

    let sell = &tokens[1];
    assert_eq!(sell.side, SwapSide::Sell);
    assert_eq!(sell.token_result, Some(-100.0));
    assert_eq!(sell.eth_result, Some(1.0));
    assert_eq!(sell.unsold_tokens_percentage, Some(50.0));
    assert_eq!(sell.trade_result_percentage, Some(150.0));

    let kpis = analyzer.kpis();
    assert_eq!(kpis.final_trade_result, 1.0);
    assert_eq!(kpis.snipes_percent, 0.0);
    assert_eq!(kpis.avg_trade_size, 2.0);
    assert_eq!(kpis.avg_trade_result, 150.0);
}

#[test]
fn test_rolling_metrics_follow_block_order() {
    let analyzer = calculated(&wallet_feeds(20 * GWEI), AnalysisOptions::default(), GasPriceBaseline::new());
    let rolling = analyzer.rolling_metrics();

    assert_eq!(rolling.len(), 2);
    assert_eq!(rolling[0].hash, BUY_HASH);
    assert_eq!(rolling[1].hash, SELL_HASH);
    assert_eq!(rolling[1].trades_cumsum, 2);
    assert_eq!(rolling[1].eth_bought_cumsum, 2.0);
    assert_eq!(rolling[1].eth_sold_cumsum, 3.0);
}

#[test]
fn test_report_contains_every_table() {
    let analyzer = calculated(&wallet_feeds(20 * GWEI), AnalysisOptions::default(), GasPriceBaseline::new());
    let report = analyzer.report().unwrap();

    assert_eq!(report.wallet, WALLET);
    assert_eq!(report.chain, "eth");
    assert_eq!(report.transactions.len(), 4);
    assert_eq!(report.tokens.len(), 2);
    assert_eq!(report.rolling.len(), 2);
    assert_eq!(report.kpis, analyzer.kpis());

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["tokens"][1]["side"], "sell");
}

// =========================================================================
// Test Suite: Snipes
// =========================================================================

#[test]
fn test_sniped_token_dropped_from_trading_set() {
    // 100 gwei against a 20 gwei daily average
    let analyzer = calculated(
        &wallet_feeds(100 * GWEI),
        AnalysisOptions::default(),
        baseline_for_fixture(20),
    );

    let buy = analyzer.transactions().iter().find(|r| r.hash == BUY_HASH).unwrap();
    assert!(buy.snipe);
    assert_eq!(analyzer.kpis().snipes_percent, 100.0);

    // Every row of the sniped token goes, sells included
    assert!(analyzer.get_swap_txs(&SwapFilter::default()).is_empty());
    assert!(analyzer.token_trades().is_empty());

    let unfiltered = analyzer.get_swap_txs(&SwapFilter::none());
    assert_eq!(unfiltered.len(), 2);
}

#[test]
fn test_gas_price_at_threshold_is_not_a_snipe() {
    // 32 gwei == 1.6 * 20 gwei, strictly greater is required
    let analyzer = calculated(
        &wallet_feeds(32 * GWEI),
        AnalysisOptions::default(),
        baseline_for_fixture(20),
    );
    assert!(analyzer.transactions().iter().all(|r| !r.snipe));
    assert_eq!(analyzer.get_swap_txs(&SwapFilter::default()).len(), 2);
}
