//! Wallet Analyzer - on-chain trading behaviour of a single EVM wallet
//!
//! Pulls the three explorer feeds of a wallet, classifies and reconciles every
//! transaction into swaps, transfers and promotions, flags snipes, and derives
//! per-token aggregates, rolling metrics and headline KPIs.

pub mod aggregator;
pub mod analyzer;
pub mod classifier;
pub mod config;
pub mod error;
pub mod feeds;
pub mod logging;
pub mod models;
pub mod normalizer;
pub mod persistence;
pub mod reconciler;
pub mod rolling;
pub mod settings;
pub mod snipes;
pub mod summary;

pub use analyzer::{AnalysisOptions, WalletAnalyzer, WalletReport};
pub use config::{ChainConfig, ChainRegistry};
pub use error::{AnalyzerError, ClassifyError, IngestError};
pub use feeds::{ExplorerClient, FeedProvider, FeedSet, JsonDirFeed};
pub use models::{EnrichedTransaction, SwapSide, SwapType, TxType};
