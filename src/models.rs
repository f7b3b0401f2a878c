//! Core types of the analysis pipeline
//!
//! Raw explorer rows and their typed counterparts. `EnrichedTransaction` is the
//! table every report is derived from.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Raw explorer records (every field is a string, exactly as the API returns it)
// ============================================================================

/// One row of the explorer `txlist` feed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawTransaction {
    #[serde(rename = "blockNumber")]
    pub block_number: String,
    #[serde(rename = "timeStamp")]
    pub timestamp: String,
    pub hash: String,
    pub nonce: String,
    #[serde(rename = "blockHash")]
    pub block_hash: String,
    #[serde(rename = "transactionIndex")]
    pub transaction_index: String,
    pub from: String,
    pub to: String,
    pub value: String,
    pub gas: String,
    #[serde(rename = "gasPrice")]
    pub gas_price: String,
    #[serde(rename = "isError")]
    pub is_error: String,
    pub input: String,
    #[serde(rename = "contractAddress")]
    pub contract_address: String,
    #[serde(rename = "cumulativeGasUsed")]
    pub cumulative_gas_used: String,
    #[serde(rename = "gasUsed")]
    pub gas_used: String,
    pub confirmations: String,
    #[serde(rename = "methodId")]
    pub method_id: String,
    #[serde(rename = "functionName")]
    pub function_name: String,
}

/// One row of the explorer `tokentx` feed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawTokenTransfer {
    #[serde(rename = "blockNumber")]
    pub block_number: String,
    #[serde(rename = "timeStamp")]
    pub timestamp: String,
    pub hash: String,
    pub nonce: String,
    #[serde(rename = "blockHash")]
    pub block_hash: String,
    pub from: String,
    #[serde(rename = "contractAddress")]
    pub contract_address: String,
    pub to: String,
    pub value: String,
    #[serde(rename = "tokenName")]
    pub token_name: String,
    #[serde(rename = "tokenSymbol")]
    pub token_symbol: String,
    #[serde(rename = "tokenDecimal")]
    pub token_decimal: String,
    #[serde(rename = "transactionIndex")]
    pub transaction_index: String,
    pub gas: String,
    #[serde(rename = "gasPrice")]
    pub gas_price: String,
    #[serde(rename = "gasUsed")]
    pub gas_used: String,
    #[serde(rename = "cumulativeGasUsed")]
    pub cumulative_gas_used: String,
    pub confirmations: String,
}

/// One row of the explorer `txlistinternal` feed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawInternalTransfer {
    #[serde(rename = "blockNumber")]
    pub block_number: String,
    #[serde(rename = "timeStamp")]
    pub timestamp: String,
    pub hash: String,
    pub from: String,
    pub to: String,
    pub value: String,
    #[serde(rename = "contractAddress")]
    pub contract_address: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub gas: String,
    #[serde(rename = "gasUsed")]
    pub gas_used: String,
    #[serde(rename = "traceId")]
    pub trace_id: String,
    #[serde(rename = "isError")]
    pub is_error: String,
    #[serde(rename = "errCode")]
    pub err_code: String,
}

/// Explorer API envelope: `{"status": "1", "message": "OK", "result": [...]}`
///
/// `result` is `null` or `[]` when the account has no history. Rate limits and
/// bad keys come back as `status "0"` with an error string in `result`.
#[derive(Debug, Deserialize)]
pub struct ExplorerResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    pub result: Option<serde_json::Value>,
}

impl ExplorerResponse {
    /// Error reported by the explorer, if any. An empty history is not an error.
    pub fn error_message(&self) -> Option<String> {
        if self.message.starts_with("No transactions found") {
            return None;
        }
        match &self.result {
            Some(serde_json::Value::String(detail)) => Some(format!("{}: {}", self.message, detail)),
            _ if self.status == "0" => Some(self.message.clone()),
            _ => None,
        }
    }

    /// Rows of the response; anything that is not an array counts as empty
    pub fn into_rows<T: DeserializeOwned>(self) -> serde_json::Result<Vec<T>> {
        match self.result {
            Some(value @ serde_json::Value::Array(_)) => serde_json::from_value(value),
            _ => Ok(Vec::new()),
        }
    }
}

// ============================================================================
// Normalized records
// ============================================================================

/// Typed row of the normal-transaction feed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub hash: String,
    pub block_number: u64,
    pub timestamp: i64,
    pub nonce: u64,
    pub block_hash: String,
    pub transaction_index: u64,
    pub from: String,
    pub to: String,
    /// Native asset amount, already scaled by 10^18
    pub value: f64,
    pub gas: u64,
    pub gas_price: u64,
    pub gas_used: u64,
    pub cumulative_gas_used: u64,
    pub confirmations: u64,
    pub is_error: i64,
    /// 4-byte selector (`0x095ea7b3`) or `0x` for a plain transfer
    pub method_id: String,
    pub function_name: String,
}

/// Typed row of the token-transfer feed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenTransfer {
    pub hash: String,
    pub block_number: u64,
    pub timestamp: i64,
    pub nonce: u64,
    pub block_hash: String,
    pub from: String,
    pub to: String,
    pub contract_address: String,
    /// Human-readable amount (lossy legacy rescale, see `normalizer::change_decimal`)
    pub value: f64,
    pub token_name: String,
    pub token_symbol: String,
    pub token_decimal: u32,
    pub transaction_index: u64,
    pub gas: u64,
    pub gas_price: u64,
    pub gas_used: u64,
    pub cumulative_gas_used: u64,
    pub confirmations: u64,
}

/// Typed row of the internal-transfer feed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InternalTransfer {
    pub hash: String,
    pub block_number: u64,
    pub timestamp: i64,
    pub from: String,
    pub to: String,
    pub value: f64,
    pub contract_address: String,
    pub kind: String,
    pub gas: u64,
    pub gas_used: u64,
    pub is_error: i64,
    pub trace_id: String,
    pub err_code: String,
}

// ============================================================================
// Classification taxonomy
// ============================================================================

/// Coarse transaction type assigned by the classifier and the transfer promotions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxType {
    EthTransferOut,
    EthTransferIn,
    Approve,
    SwapTxZeroValue,
    SwapTxNonzeroValue,
    Other,
    TokensTransferIn,
    TokensTransferOut,
    StablecoinsTransferIn,
    StablecoinsTransferOut,
    EthOtherTransferIn,
}

impl TxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxType::EthTransferOut => "eth_transfer_out",
            TxType::EthTransferIn => "eth_transfer_in",
            TxType::Approve => "approve",
            TxType::SwapTxZeroValue => "swap_tx_zero_value",
            TxType::SwapTxNonzeroValue => "swap_tx_nonzero_value",
            TxType::Other => "other",
            TxType::TokensTransferIn => "tokens_transfer_in",
            TxType::TokensTransferOut => "tokens_transfer_out",
            TxType::StablecoinsTransferIn => "stablecoins_transfer_in",
            TxType::StablecoinsTransferOut => "stablecoins_transfer_out",
            TxType::EthOtherTransferIn => "eth_other_transfer_in",
        }
    }

    /// Pure token movement in or out of the wallet (not a trade)
    pub fn is_token_transfer(&self) -> bool {
        matches!(
            self,
            TxType::TokensTransferIn
                | TxType::TokensTransferOut
                | TxType::StablecoinsTransferIn
                | TxType::StablecoinsTransferOut
        )
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Resolved swap direction; `None` on the enriched row means "not a swap"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapType {
    SwapBuy,
    SwapSell,
    OtherBuy,
    OtherSell,
}

/// Buy or sell half of a trade, independent of how it was detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapSide {
    Buy,
    Sell,
}

impl SwapType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapType::SwapBuy => "swap_buy",
            SwapType::SwapSell => "swap_sell",
            SwapType::OtherBuy => "other_buy",
            SwapType::OtherSell => "other_sell",
        }
    }

    pub fn side(&self) -> SwapSide {
        match self {
            SwapType::SwapBuy | SwapType::OtherBuy => SwapSide::Buy,
            SwapType::SwapSell | SwapType::OtherSell => SwapSide::Sell,
        }
    }

    /// Confirmed through a known router (as opposed to the `other_*` heuristics)
    pub fn is_router_swap(&self) -> bool {
        matches!(self, SwapType::SwapBuy | SwapType::SwapSell)
    }
}

impl fmt::Display for SwapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl fmt::Display for SwapSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapSide::Buy => f.pad("BUY"),
            SwapSide::Sell => f.pad("SELL"),
        }
    }
}

// ============================================================================
// Enriched transaction (classifier + reconciler output)
// ============================================================================

/// A normal transaction plus everything classification and reconciliation learned.
///
/// Flat on purpose so the table exports straight to CSV.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedTransaction {
    pub hash: String,
    pub block_number: u64,
    pub timestamp: i64,
    pub nonce: u64,
    pub transaction_index: u64,
    pub from: String,
    pub to: String,
    pub value: f64,
    pub gas: u64,
    pub gas_price: u64,
    pub gas_used: u64,
    pub cumulative_gas_used: u64,
    pub confirmations: u64,
    pub method_id: String,
    pub function_name: String,
    pub tx_type: TxType,
    pub swap_type: Option<SwapType>,
    /// Native amount moved by the other leg of the swap
    pub swap_counter_value: Option<f64>,
    pub token_value: Option<f64>,
    pub token_name: Option<String>,
    pub token_symbol: Option<String>,
    pub token_contract: Option<String>,
    pub token_decimals: Option<u32>,
    pub snipe: bool,
}

impl EnrichedTransaction {
    pub fn from_transaction(tx: Transaction, tx_type: TxType) -> Self {
        Self {
            hash: tx.hash,
            block_number: tx.block_number,
            timestamp: tx.timestamp,
            nonce: tx.nonce,
            transaction_index: tx.transaction_index,
            from: tx.from,
            to: tx.to,
            value: tx.value,
            gas: tx.gas,
            gas_price: tx.gas_price,
            gas_used: tx.gas_used,
            cumulative_gas_used: tx.cumulative_gas_used,
            confirmations: tx.confirmations,
            method_id: tx.method_id,
            function_name: tx.function_name,
            tx_type,
            swap_type: None,
            swap_counter_value: None,
            token_value: None,
            token_name: None,
            token_symbol: None,
            token_contract: None,
            token_decimals: None,
            snipe: false,
        }
    }

    /// Row for a token transfer that has no parent in the transaction feed
    pub fn from_token_transfer(transfer: &TokenTransfer, tx_type: TxType) -> Self {
        let mut row = Self {
            hash: transfer.hash.clone(),
            block_number: transfer.block_number,
            timestamp: transfer.timestamp,
            nonce: transfer.nonce,
            transaction_index: transfer.transaction_index,
            from: transfer.from.clone(),
            to: transfer.to.clone(),
            value: 0.0,
            gas: transfer.gas,
            gas_price: transfer.gas_price,
            gas_used: transfer.gas_used,
            cumulative_gas_used: transfer.cumulative_gas_used,
            confirmations: transfer.confirmations,
            method_id: String::new(),
            function_name: String::new(),
            tx_type,
            swap_type: None,
            swap_counter_value: None,
            token_value: None,
            token_name: None,
            token_symbol: None,
            token_contract: None,
            token_decimals: None,
            snipe: false,
        };
        row.set_token(transfer, transfer.value);
        row
    }

    /// Row for an internal transfer that has no parent in the transaction feed
    pub fn from_internal_transfer(transfer: &InternalTransfer, tx_type: TxType) -> Self {
        Self {
            hash: transfer.hash.clone(),
            block_number: transfer.block_number,
            timestamp: transfer.timestamp,
            nonce: 0,
            transaction_index: 0,
            from: transfer.from.clone(),
            to: transfer.to.clone(),
            value: transfer.value,
            gas: transfer.gas,
            gas_price: 0,
            gas_used: transfer.gas_used,
            cumulative_gas_used: 0,
            confirmations: 0,
            method_id: String::new(),
            function_name: String::new(),
            tx_type,
            swap_type: None,
            swap_counter_value: None,
            token_value: None,
            token_name: None,
            token_symbol: None,
            token_contract: None,
            token_decimals: None,
            snipe: false,
        }
    }

    /// Copy token identity from `transfer`, with `value` as the token amount
    pub fn set_token(&mut self, transfer: &TokenTransfer, value: f64) {
        self.token_value = Some(value);
        self.token_name = Some(transfer.token_name.clone());
        self.token_symbol = Some(transfer.token_symbol.clone());
        self.token_contract = Some(transfer.contract_address.clone());
        self.token_decimals = Some(transfer.token_decimal);
    }

    pub fn swap_side(&self) -> Option<SwapSide> {
        self.swap_type.map(|s| s.side())
    }

    /// Transaction fee in native units
    pub fn fee(&self) -> f64 {
        (self.gas_price as f64) * (self.gas_used as f64) / 1e18
    }
}

// ============================================================================
// Tests
// ============================================================================
