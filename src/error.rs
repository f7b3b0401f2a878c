//! Error types for the analysis core

use thiserror::Error;

/// Which explorer feed a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    Transactions,
    TokenTransfers,
    InternalTransfers,
}

impl Feed {
    /// Explorer `action` parameter of the feed
    pub fn action(&self) -> &'static str {
        match self {
            Feed::Transactions => "txlist",
            Feed::TokenTransfers => "tokentx",
            Feed::InternalTransfers => "txlistinternal",
        }
    }
}

impl std::fmt::Display for Feed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.action())
    }
}

/// Hard failures while turning raw feed rows into typed rows
#[derive(Debug, Error, PartialEq)]
pub enum IngestError {
    #[error("No transactions found")]
    EmptyTransactionFeed,
    #[error("{feed}: field '{field}' of tx {hash} is not an integer: {value:?}")]
    InvalidInteger {
        feed: Feed,
        field: &'static str,
        hash: String,
        value: String,
    },
    #[error("{feed}: field '{field}' of tx {hash} is not a number: {value:?}")]
    InvalidNumber {
        feed: Feed,
        field: &'static str,
        hash: String,
        value: String,
    },
}

/// Classifier input that can never describe a real transaction
#[derive(Debug, Error, PartialEq)]
pub enum ClassifyError {
    #[error("transaction value is not a comparable number: {0}")]
    NonFiniteValue(f64),
    #[error("transaction value must not be negative: {0}")]
    NegativeValue(f64),
}

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error("failed to classify tx {hash}: {source}")]
    Classify {
        hash: String,
        #[source]
        source: ClassifyError,
    },
    #[error("wallet data not loaded, call get_data() first")]
    NotLoaded,
    #[error("wallet data not calculated, call calculate() first")]
    NotCalculated,
}
