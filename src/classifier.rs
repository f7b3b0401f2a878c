//! Transaction classification
//!
//! Coarse typing of normal transactions from sender, recipient, selector and native value.

use crate::config::chains::{ChainConfig, APPROVE_SELECTOR};
use crate::error::ClassifyError;
use crate::models::TxType;

/// Classifies normal transactions of one wallet on one chain
#[derive(Debug, Clone)]
pub struct Classifier<'a> {
    wallet: &'a str,
    chain: &'a ChainConfig,
}

/// A plain value transfer carries no calldata
fn is_plain_transfer(method_id: &str) -> bool {
    method_id.is_empty() || method_id == "0x"
}

impl<'a> Classifier<'a> {
    /// `wallet` must already be lowercase, like every address coming out of the normalizer
    pub fn new(wallet: &'a str, chain: &'a ChainConfig) -> Self {
        Self { wallet, chain }
    }

    /// First matching rule wins:
    /// 1. own wallet sends value without calldata => `eth_transfer_out`
    /// 2. own wallet receives value without calldata => `eth_transfer_in`
    /// 3. `approve` selector => `approve` whatever the value
    /// 4. router recipient, zero value => `swap_tx_zero_value`
    /// 5. router recipient, nonzero value => `swap_tx_nonzero_value`
    /// 6. anything else => `other`
    pub fn classify(
        &self,
        from: &str,
        to: &str,
        method_id: &str,
        value: f64,
    ) -> Result<TxType, ClassifyError> {
        if !value.is_finite() {
            return Err(ClassifyError::NonFiniteValue(value));
        }
        if value < 0.0 {
            return Err(ClassifyError::NegativeValue(value));
        }

        let plain = is_plain_transfer(method_id);
        let has_value = value != 0.0;

        let tx_type = if from == self.wallet && has_value && plain {
            TxType::EthTransferOut
        } else if to == self.wallet && has_value && plain {
            TxType::EthTransferIn
        } else if method_id == APPROVE_SELECTOR {
            TxType::Approve
        } else if self.chain.is_router(to) && !has_value {
            TxType::SwapTxZeroValue
        } else if self.chain.is_router(to) {
            TxType::SwapTxNonzeroValue
        } else {
            TxType::Other
        };

        Ok(tx_type)
    }
}
