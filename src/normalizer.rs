//! Record normalization
//!
//! Converts the string-typed explorer feeds into typed rows: integers are parsed
//! strictly, addresses and hashes are lowercased so hash joins are case-insensitive,
//! and token/internal values go through the legacy truncating rescale.

use std::str::FromStr;

use tracing::{debug, trace};

use crate::error::{Feed, IngestError};
use crate::models::{
    InternalTransfer, RawInternalTransfer, RawTokenTransfer, RawTransaction, TokenTransfer,
    Transaction,
};

/// Decimals of the chain's native asset
pub const NATIVE_DECIMALS: i64 = 18;
/// Digits kept after the decimal point for token transfer values
pub const TOKEN_VALUE_CROP: i64 = 2;
/// Digits kept after the decimal point for internal transfer values
pub const INTERNAL_VALUE_CROP: i64 = 8;

/// Rescale an integer amount string by dropping its last `decimal - crop` characters
/// and dividing what is left by `10^crop`.
///
/// Raw amounts overflow 64-bit integers, so precision beyond `crop` digits is thrown
/// away by truncating the string rather than by dividing. Slicing follows the
/// `value[:-(decimal - crop)]` convention of the historical reports, including its
/// corner cases (`decimal == crop` yields an empty string, `decimal < crop` keeps the
/// leading characters). Anything that does not parse afterwards is `0.0`.
pub fn change_decimal(value: &str, decimal: i64, crop: i64) -> f64 {
    let change = decimal - crop;
    let chars: Vec<char> = value.chars().collect();
    let len = chars.len() as i64;

    let stop = -change;
    let end = if stop < 0 { (len + stop).max(0) } else { stop.min(len) };
    let kept: String = chars[..end as usize].iter().collect();

    match kept.trim().parse::<f64>() {
        Ok(v) => v / 10f64.powi(crop as i32),
        Err(_) => {
            trace!(value, decimal, crop, "Unparseable amount after crop, using 0.0");
            0.0
        }
    }
}

/// Parse a mandatory integer field
fn parse_int<T: FromStr>(
    feed: Feed,
    field: &'static str,
    hash: &str,
    value: &str,
) -> Result<T, IngestError> {
    value.trim().parse::<T>().map_err(|_| IngestError::InvalidInteger {
        feed,
        field,
        hash: hash.to_string(),
        value: value.to_string(),
    })
}

/// Selector of the called method; `0x` for a plain value transfer
fn method_id(raw: &RawTransaction) -> String {
    let explicit = raw.method_id.trim();
    if !explicit.is_empty() {
        return explicit.to_lowercase();
    }
    let input = raw.input.trim();
    match input.get(..10) {
        Some(selector) => selector.to_lowercase(),
        None => "0x".to_string(),
    }
}

/// Normalize the normal-transaction feed.
///
/// An empty feed is fatal (there is nothing to analyze). Rows flagged `isError == 1`
/// are dropped here, before anything downstream sees them.
pub fn normalize_transactions(raw: &[RawTransaction]) -> Result<Vec<Transaction>, IngestError> {
    if raw.is_empty() {
        return Err(IngestError::EmptyTransactionFeed);
    }

    let feed = Feed::Transactions;
    let mut txs = Vec::with_capacity(raw.len());
    let mut failed = 0usize;

    for row in raw {
        let hash = row.hash.trim().to_lowercase();

        let value_wei: f64 = row.value.trim().parse().map_err(|_| IngestError::InvalidNumber {
            feed,
            field: "value",
            hash: hash.clone(),
            value: row.value.clone(),
        })?;

        let tx = Transaction {
            block_number: parse_int(feed, "blockNumber", &hash, &row.block_number)?,
            timestamp: parse_int(feed, "timeStamp", &hash, &row.timestamp)?,
            nonce: parse_int(feed, "nonce", &hash, &row.nonce)?,
            transaction_index: parse_int(feed, "transactionIndex", &hash, &row.transaction_index)?,
            gas: parse_int(feed, "gas", &hash, &row.gas)?,
            gas_price: parse_int(feed, "gasPrice", &hash, &row.gas_price)?,
            is_error: parse_int(feed, "isError", &hash, &row.is_error)?,
            cumulative_gas_used: parse_int(feed, "cumulativeGasUsed", &hash, &row.cumulative_gas_used)?,
            gas_used: parse_int(feed, "gasUsed", &hash, &row.gas_used)?,
            confirmations: parse_int(feed, "confirmations", &hash, &row.confirmations)?,
            value: value_wei / 10f64.powi(NATIVE_DECIMALS as i32),
            block_hash: row.block_hash.trim().to_lowercase(),
            from: row.from.trim().to_lowercase(),
            to: row.to.trim().to_lowercase(),
            method_id: method_id(row),
            function_name: row.function_name.clone(),
            hash,
        };

        if tx.is_error == 1 {
            failed += 1;
            continue;
        }
        txs.push(tx);
    }

    debug!(rows = txs.len(), failed, "Normalized transactions");
    Ok(txs)
}

/// Normalize the token-transfer feed. Rows without `tokenDecimal` are dropped.
pub fn normalize_token_transfers(raw: &[RawTokenTransfer]) -> Result<Vec<TokenTransfer>, IngestError> {
    let feed = Feed::TokenTransfers;
    let mut transfers = Vec::with_capacity(raw.len());
    let mut no_decimals = 0usize;

    for row in raw {
        if row.token_decimal.trim().is_empty() {
            no_decimals += 1;
            continue;
        }

        let hash = row.hash.trim().to_lowercase();
        let token_decimal: u32 = parse_int(feed, "tokenDecimal", &hash, &row.token_decimal)?;

        transfers.push(TokenTransfer {
            block_number: parse_int(feed, "blockNumber", &hash, &row.block_number)?,
            timestamp: parse_int(feed, "timeStamp", &hash, &row.timestamp)?,
            nonce: parse_int(feed, "nonce", &hash, &row.nonce)?,
            transaction_index: parse_int(feed, "transactionIndex", &hash, &row.transaction_index)?,
            gas: parse_int(feed, "gas", &hash, &row.gas)?,
            gas_price: parse_int(feed, "gasPrice", &hash, &row.gas_price)?,
            gas_used: parse_int(feed, "gasUsed", &hash, &row.gas_used)?,
            cumulative_gas_used: parse_int(feed, "cumulativeGasUsed", &hash, &row.cumulative_gas_used)?,
            confirmations: parse_int(feed, "confirmations", &hash, &row.confirmations)?,
            value: change_decimal(&row.value, token_decimal as i64, TOKEN_VALUE_CROP),
            token_decimal,
            block_hash: row.block_hash.trim().to_lowercase(),
            from: row.from.trim().to_lowercase(),
            to: row.to.trim().to_lowercase(),
            contract_address: row.contract_address.trim().to_lowercase(),
            token_name: row.token_name.to_lowercase(),
            token_symbol: row.token_symbol.to_lowercase(),
            hash,
        });
    }

    if no_decimals > 0 {
        debug!(dropped = no_decimals, "Dropped token transfers without decimals");
    }
    debug!(rows = transfers.len(), "Normalized token transfers");
    Ok(transfers)
}

/// Normalize the internal-transfer feed
pub fn normalize_internal_transfers(
    raw: &[RawInternalTransfer],
) -> Result<Vec<InternalTransfer>, IngestError> {
    let feed = Feed::InternalTransfers;
    let mut transfers = Vec::with_capacity(raw.len());

    for row in raw {
        let hash = row.hash.trim().to_lowercase();
        transfers.push(InternalTransfer {
            block_number: parse_int(feed, "blockNumber", &hash, &row.block_number)?,
            timestamp: parse_int(feed, "timeStamp", &hash, &row.timestamp)?,
            gas: parse_int(feed, "gas", &hash, &row.gas)?,
            gas_used: parse_int(feed, "gasUsed", &hash, &row.gas_used)?,
            is_error: parse_int(feed, "isError", &hash, &row.is_error)?,
            value: change_decimal(&row.value, NATIVE_DECIMALS, INTERNAL_VALUE_CROP),
            from: row.from.trim().to_lowercase(),
            to: row.to.trim().to_lowercase(),
            contract_address: row.contract_address.trim().to_lowercase(),
            kind: row.kind.to_lowercase(),
            trace_id: row.trace_id.to_lowercase(),
            err_code: row.err_code.to_lowercase(),
            hash,
        });
    }

    debug!(rows = transfers.len(), "Normalized internal transfers");
    Ok(transfers)
}

// ============================================================================
// Tests
// ============================================================================
