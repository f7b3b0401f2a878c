// fetch_feeds.rs - Download the explorer feeds of a wallet into a directory
//
// Usage:
//   cargo run --bin fetch_feeds -- 0xwallet                        # Save into data/<wallet>/
//   cargo run --bin fetch_feeds -- 0xwallet --out feeds/ --chain bsc
//   cargo run --bin fetch_feeds -- 0xwallet --no-cache             # Always hit the API
//
// The saved directory can be analyzed offline with `wallet_analyzer --feeds-dir`.

use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use std::path::PathBuf;

use wallet_analyzer::config::chains::validate_and_normalize_address;
use wallet_analyzer::feeds::{ExplorerClient, FeedProvider, JsonDirFeed};
use wallet_analyzer::logging::init_logging;
use wallet_analyzer::persistence::ResponseCache;
use wallet_analyzer::settings::{load_chain, Settings};

#[derive(Parser)]
#[command(name = "fetch_feeds")]
#[command(about = "Download txlist, tokentx and txlistinternal feeds of a wallet")]
struct Args {
    /// Wallet address
    wallet: String,

    /// Output directory (default: data/<wallet>)
    #[arg(long)]
    out: Option<PathBuf>,

    /// Chain name (overrides CHAIN)
    #[arg(long)]
    chain: Option<String>,

    /// First block to include
    #[arg(long, default_value = "0")]
    start_block: u64,

    /// Skip the response cache
    #[arg(long)]
    no_cache: bool,
}

fn main() -> Result<()> {
    dotenv().ok();
    init_logging()?;

    let args = Args::parse();
    let settings = Settings::from_env()?;

    let wallet = validate_and_normalize_address(&args.wallet)
        .map_err(|e| anyhow::anyhow!("Invalid wallet: {}", e))?;

    let chain = match &args.chain {
        Some(name) => load_chain(name, std::env::var("CHAINS_FILE").ok().as_deref())?,
        None => settings.chain.clone(),
    };

    let mut client = ExplorerClient::new(&chain.explorer_endpoint, settings.api_key.clone())?;
    if settings.cache_enabled && !args.no_cache {
        let cache = ResponseCache::new(&settings.cache_path)
            .with_context(|| format!("Failed to open cache {}", settings.cache_path.display()))?;
        client = client.with_cache(cache, settings.cache_ttl);
    }

    let feeds = client.fetch(&wallet, args.start_block)?;

    let out = args
        .out
        .unwrap_or_else(|| PathBuf::from("data").join(&wallet));
    JsonDirFeed::new(&out).save(&feeds)?;

    println!("\n=== FEEDS SAVED ===\n");
    println!("Wallet:             {}", wallet);
    println!("Chain:              {}", chain.name);
    println!("Directory:          {}", out.display());
    println!("Transactions:       {}", feeds.transactions.len());
    println!("Token transfers:    {}", feeds.token_transfers.len());
    println!("Internal transfers: {}", feeds.internal_transfers.len());

    Ok(())
}
