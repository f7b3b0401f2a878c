// main.rs - Wallet Analyzer entry point
// Analyzes the trading history of one wallet and prints KPIs, totals and per-token results
//
// Usage:
//   cargo run -- 0xwallet                               # Download feeds from the explorer
//   cargo run -- 0xwallet --feeds-dir data/0xwallet     # Use feeds saved by fetch_feeds
//   cargo run -- 0xwallet --format json                 # Full report as JSON
//   cargo run -- 0xwallet --export-dir out/             # Also write CSV/JSON tables

use anyhow::{bail, Context, Result};
use chrono::DateTime;
use clap::Parser;
use dotenvy::dotenv;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use wallet_analyzer::aggregator::TokenTradeAggregate;
use wallet_analyzer::config::chains::validate_and_normalize_address;
use wallet_analyzer::feeds::{ExplorerClient, FeedProvider, JsonDirFeed};
use wallet_analyzer::logging::init_logging;
use wallet_analyzer::persistence::{write_csv, write_json, ResponseCache};
use wallet_analyzer::rolling::RollingMetricsRow;
use wallet_analyzer::settings::{load_chain, Settings};
use wallet_analyzer::snipes::GasPriceBaseline;
use wallet_analyzer::summary::{Kpis, WalletTotals};
use wallet_analyzer::{WalletAnalyzer, WalletReport};

#[derive(Parser)]
#[command(name = "wallet_analyzer")]
#[command(about = "Analyze the on-chain trading history of a wallet")]
struct Args {
    /// Wallet address (0x + 40 hex chars)
    wallet: String,

    /// Directory with txlist.json, tokentx.json and txlistinternal.json instead of the explorer API
    #[arg(long)]
    feeds_dir: Option<PathBuf>,

    /// First block to include
    #[arg(long, default_value = "0")]
    start_block: u64,

    /// Chain name (overrides CHAIN)
    #[arg(long)]
    chain: Option<String>,

    /// Daily average gas price CSV for snipe detection (overrides GAS_PRICES_CSV)
    #[arg(long)]
    gas_prices: Option<PathBuf>,

    /// Include heuristic other_buy/other_sell swaps in the trading set
    #[arg(long)]
    include_other_swaps: bool,

    /// Keep snipes in the trading set
    #[arg(long)]
    keep_snipes: bool,

    /// Drop stablecoin swaps from the trading set
    #[arg(long)]
    drop_stablecoins: bool,

    /// Skip the explorer response cache
    #[arg(long)]
    no_cache: bool,

    /// Number of most recent rolling metric rows to print
    #[arg(long, default_value = "10")]
    tail: usize,

    /// Output format: table, csv, json
    #[arg(long, default_value = "table")]
    format: String,

    /// Write the CSV tables and report.json into this directory
    #[arg(long)]
    export_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    dotenv().ok();
    init_logging()?;

    let args = Args::parse();
    let mut settings = Settings::from_env()?;

    let wallet = validate_and_normalize_address(&args.wallet)
        .map_err(|e| anyhow::anyhow!("Invalid wallet: {}", e))?;

    if let Some(chain) = &args.chain {
        settings.chain = load_chain(chain, std::env::var("CHAINS_FILE").ok().as_deref())?;
    }
    if let Some(path) = &args.gas_prices {
        settings.gas_prices_csv = Some(path.clone());
    }
    if args.include_other_swaps {
        settings.options.filter.include_other_swaps = true;
    }
    if args.keep_snipes {
        settings.options.filter.drop_snipes = false;
    }
    if args.drop_stablecoins {
        settings.options.filter.drop_stablecoins = true;
    }

    let format = args.format.to_lowercase();
    if !matches!(format.as_str(), "table" | "csv" | "json") {
        bail!("Unknown format '{}'. Use table, csv or json", args.format);
    }

    let baseline = match &settings.gas_prices_csv {
        Some(path) => GasPriceBaseline::from_csv_path(path)?,
        None => {
            warn!("No gas price CSV configured, snipe detection disabled");
            GasPriceBaseline::new()
        }
    };

    let provider = build_provider(&args, &settings)?;

    let mut analyzer = WalletAnalyzer::new(&wallet, settings.chain.clone(), settings.options)
        .with_gas_baseline(baseline);
    analyzer.get_data(provider.as_ref(), args.start_block)?;
    analyzer.calculate()?;

    let report = analyzer.report()?;
    info!(
        wallet = %report.wallet,
        chain = %report.chain,
        tokens = report.tokens.len(),
        "Analysis complete"
    );

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        "csv" => print_csv(&report.tokens)?,
        _ => print_report(&report, args.tail),
    }

    if let Some(dir) = &args.export_dir {
        export_report(dir, &report)?;
        println!("\nReport written to {}", dir.display());
    }

    Ok(())
}

fn build_provider(args: &Args, settings: &Settings) -> Result<Box<dyn FeedProvider>> {
    if let Some(dir) = &args.feeds_dir {
        return Ok(Box::new(JsonDirFeed::new(dir)));
    }

    if settings.api_key.is_none() {
        warn!("ETHERSCAN_API_KEY not set, explorer requests will be rate limited");
    }

    let mut client = ExplorerClient::new(&settings.chain.explorer_endpoint, settings.api_key.clone())?;
    if settings.cache_enabled && !args.no_cache {
        let cache = ResponseCache::new(&settings.cache_path)
            .with_context(|| format!("Failed to open cache {}", settings.cache_path.display()))?;
        client = client.with_cache(cache, settings.cache_ttl);
    }
    Ok(Box::new(client))
}

fn export_report(dir: &Path, report: &WalletReport) -> Result<()> {
    write_csv(dir.join("transactions.csv"), &report.transactions)?;
    write_csv(dir.join("tokens.csv"), &report.tokens)?;
    write_csv(dir.join("rolling.csv"), &report.rolling)?;
    write_csv(dir.join("totals.csv"), std::slice::from_ref(&report.totals))?;
    write_json(dir.join("report.json"), report)?;
    Ok(())
}

// ============================================================================
// Output
// ============================================================================

fn print_report(report: &WalletReport, tail: usize) {
    println!("\n=== WALLET {} ({}) ===", report.wallet, report.chain);
    print_kpis(&report.kpis);
    print_totals(&report.totals);
    print_tokens(&report.tokens);
    print_rolling_tail(&report.rolling, tail);
}

fn print_kpis(kpis: &Kpis) {
    println!("\n=== KPIs ===\n");
    println!("{:<28} {:>14.4}", "Final trade result", kpis.final_trade_result);
    println!("{:<28} {:>13.2}%", "Snipes", kpis.snipes_percent);
    println!("{:<28} {:>14.4}", "Average trade size", kpis.avg_trade_size);
    println!("{:<28} {:>14.4}", "Average trade result", kpis.avg_trade_result);
}

fn print_totals(totals: &WalletTotals) {
    println!("\n=== TOTALS ===\n");
    println!("{:<28} {:>14.4}", "Native in", totals.total_eth_in);
    println!("{:<28} {:>14.4}", "Native internal in", totals.total_eth_internal_in);
    println!("{:<28} {:>14.4}", "Native out", totals.total_eth_out);
    println!("{:<28} {:>14.4}", "Native spent on buys", totals.total_eth_buy);
    println!("{:<28} {:>14.4}", "Native from sells", totals.total_eth_sell);
    println!("{:<28} {:>14.4}", "Trading result", totals.trading_result());
    println!("{:<28} {:>14.4}", "Stablecoins in", totals.total_stablecoins_in);
    println!("{:<28} {:>14.4}", "Stablecoins out", totals.total_stablecoins_out);
    println!("{:<28} {:>14.6}", "Fees", totals.total_fees_eth);
    println!("{:<28} {:>14}", "Token transfers in", totals.count_tokens_in);
    println!("{:<28} {:>14}", "Token transfers out", totals.count_tokens_out);
}

fn fmt_opt(value: Option<f64>, suffix: &str) -> String {
    value
        .map(|v| format!("{:.2}{}", v, suffix))
        .unwrap_or_else(|| "N/A".to_string())
}

fn print_tokens(tokens: &[TokenTradeAggregate]) {
    println!("\n=== TOKENS ===\n");

    if tokens.is_empty() {
        println!("No swaps found.");
        return;
    }

    println!(
        "{:<12} {:<5} {:>7} {:>14} {:>18} {:>12} {:>10} {:>10}",
        "Symbol", "Side", "Orders", "Native", "Tokens", "Result", "Unsold %", "Result %"
    );
    println!("{}", "-".repeat(96));

    for token in tokens {
        println!(
            "{:<12} {:<5} {:>7} {:>14.4} {:>18.2} {:>12} {:>10} {:>10}",
            truncate(&token.token_symbol, 12),
            token.side,
            token.orders,
            token.native_value,
            token.token_value,
            fmt_opt(token.eth_result, ""),
            fmt_opt(token.unsold_tokens_percentage, "%"),
            fmt_opt(token.trade_result_percentage, "%"),
        );
    }
}

fn print_rolling_tail(rows: &[RollingMetricsRow], tail: usize) {
    println!("\n=== ROLLING METRICS (last {}) ===\n", tail.min(rows.len()));

    if rows.is_empty() {
        println!("No swaps found.");
        return;
    }

    println!(
        "{:<20} {:<12} {:<5} {:>12} {:>8} {:>10} {:>12}",
        "Time", "Symbol", "Side", "Native", "Trades", "Win ratio", "Result MA"
    );
    println!("{}", "-".repeat(85));

    for row in &rows[rows.len().saturating_sub(tail)..] {
        println!(
            "{:<20} {:<12} {:<5} {:>12.4} {:>8} {:>10.2} {:>12.4}",
            format_timestamp(row.timestamp),
            truncate(&row.token_symbol, 12),
            row.side,
            row.native_value,
            row.trades_cumsum,
            row.win_ratio,
            row.result_ma_10,
        );
    }
}

fn print_csv(tokens: &[TokenTradeAggregate]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(std::io::stdout());
    for token in tokens {
        writer.serialize(token)?;
    }
    writer.flush()?;
    Ok(())
}

fn format_timestamp(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(2)).collect();
        format!("{}..", head)
    }
}
