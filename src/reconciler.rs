//! Swap/transfer reconciliation
//!
//! Joins classified transactions against the token-transfer and internal-transfer
//! feeds by hash. Each feed is indexed once into a hash -> row-indices multimap and
//! queried during a single pass. A join that does not have the exact expected shape
//! leaves the row's swap fields unset.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use crate::config::ChainConfig;
use crate::models::{EnrichedTransaction, InternalTransfer, SwapType, TokenTransfer, TxType};

/// Trace id given to internal rows synthesized from wrapped-native transfers
pub const WRAPPED_TRACE_ID: &str = "wrapped";

/// Hash -> positions of the rows carrying that hash, in feed order
struct HashIndex<'r> {
    rows: FxHashMap<&'r str, Vec<usize>>,
}

impl<'r> HashIndex<'r> {
    fn build<T>(rows: &'r [T], hash: impl Fn(&'r T) -> &'r str) -> Self {
        let mut index: FxHashMap<&'r str, Vec<usize>> = FxHashMap::default();
        for (i, row) in rows.iter().enumerate() {
            index.entry(hash(row)).or_default().push(i);
        }
        Self { rows: index }
    }

    fn get(&self, hash: &str) -> &[usize] {
        self.rows.get(hash).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Counters logged at the end of a reconciliation run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileStats {
    pub wrapped_native: usize,
    pub swap_buys: usize,
    pub swap_sells: usize,
    pub other_buys: usize,
    pub other_sells: usize,
    pub unmatched_swaps: usize,
    pub tokens_out: usize,
    pub tokens_in: usize,
    pub internal_in: usize,
}

pub struct Reconciler<'a> {
    wallet: &'a str,
    chain: &'a ChainConfig,
    wrapped_native_rule: bool,
}

impl<'a> Reconciler<'a> {
    pub fn new(wallet: &'a str, chain: &'a ChainConfig) -> Self {
        Self {
            wallet,
            chain,
            wrapped_native_rule: true,
        }
    }

    /// Toggle the wrapped-native-as-native rule (on by default)
    pub fn with_wrapped_native_rule(mut self, enabled: bool) -> Self {
        self.wrapped_native_rule = enabled;
        self
    }

    /// Resolve swaps and promote transfers. Inputs are only read, so running this
    /// twice on the same tables yields the same output.
    pub fn reconcile(
        &self,
        mut txs: Vec<EnrichedTransaction>,
        tokens: &[TokenTransfer],
        internals: &[InternalTransfer],
    ) -> (Vec<EnrichedTransaction>, ReconcileStats) {
        let mut stats = ReconcileStats::default();
        let mut tokens = tokens.to_vec();
        let mut internals = internals.to_vec();

        if self.wrapped_native_rule {
            stats.wrapped_native = self.apply_wrapped_native(&mut txs, &mut tokens, &mut internals);
        }

        {
            let token_index = HashIndex::build(&tokens, |t| t.hash.as_str());
            let internal_index = HashIndex::build(&internals, |t| t.hash.as_str());

            for tx in txs.iter_mut() {
                let token_rows = token_index.get(&tx.hash);
                let internal_rows = internal_index.get(&tx.hash);
                self.resolve_swap(tx, token_rows, internal_rows, &tokens, &internals, &mut stats);
            }

            for tx in txs.iter_mut() {
                if self.promote_outgoing(tx, token_index.get(&tx.hash), &tokens) {
                    stats.tokens_out += 1;
                }
            }
        }

        stats.tokens_in = self.promote_incoming_tokens(&mut txs, &tokens);
        stats.internal_in = self.promote_incoming_internal(&mut txs, &internals);

        debug!(
            wallet = %self.wallet,
            chain = %self.chain.name,
            swap_buys = stats.swap_buys,
            swap_sells = stats.swap_sells,
            other_buys = stats.other_buys,
            other_sells = stats.other_sells,
            unmatched = stats.unmatched_swaps,
            tokens_in = stats.tokens_in,
            tokens_out = stats.tokens_out,
            internal_in = stats.internal_in,
            "Reconciled transactions"
        );

        (txs, stats)
    }

    /// Move wrapped-native transfers of router swaps out of the token feed and treat
    /// them as the native leg of the swap. Returns the number of rewritten transactions.
    fn apply_wrapped_native(
        &self,
        txs: &mut [EnrichedTransaction],
        tokens: &mut Vec<TokenTransfer>,
        internals: &mut Vec<InternalTransfer>,
    ) -> usize {
        let Some(wrapped) = self.chain.wrapped_native.as_deref() else {
            return 0;
        };

        let tx_pos: FxHashMap<String, usize> = txs
            .iter()
            .enumerate()
            .map(|(i, tx)| (tx.hash.clone(), i))
            .collect();

        let mut per_hash: FxHashMap<&str, Vec<usize>> = FxHashMap::default();
        for (i, t) in tokens.iter().enumerate() {
            let party = t.from == self.wallet || t.to == self.wallet;
            if t.contract_address == wrapped && party && tx_pos.contains_key(&t.hash) {
                per_hash.entry(t.hash.as_str()).or_default().push(i);
            }
        }

        let mut moved: Vec<usize> = Vec::new();
        let mut synthetic: Vec<InternalTransfer> = Vec::new();

        for (hash, rows) in &per_hash {
            let Some(&pos) = tx_pos.get(*hash) else { continue };
            let tx = &mut txs[pos];
            if !self.chain.is_router(&tx.to) {
                continue;
            }
            // A wrapped leg in both directions is a multi-hop shape, leave it alone
            if rows.len() != 1 {
                trace!(hash, rows = rows.len(), "Ambiguous wrapped-native legs");
                continue;
            }

            let transfer = &tokens[rows[0]];
            tx.value = transfer.value;
            if transfer.from == self.wallet {
                tx.tx_type = TxType::SwapTxNonzeroValue;
            } else {
                tx.tx_type = TxType::SwapTxZeroValue;
                synthetic.push(InternalTransfer {
                    hash: transfer.hash.clone(),
                    block_number: transfer.block_number,
                    timestamp: transfer.timestamp,
                    from: transfer.from.clone(),
                    to: self.wallet.to_string(),
                    value: transfer.value,
                    contract_address: transfer.contract_address.clone(),
                    kind: "call".to_string(),
                    gas: transfer.gas,
                    gas_used: transfer.gas_used,
                    is_error: 0,
                    trace_id: WRAPPED_TRACE_ID.to_string(),
                    err_code: String::new(),
                });
            }
            moved.push(rows[0]);
        }

        if moved.is_empty() {
            return 0;
        }

        let moved_set: FxHashSet<usize> = moved.iter().copied().collect();
        let mut i = 0usize;
        tokens.retain(|_| {
            let keep = !moved_set.contains(&i);
            i += 1;
            keep
        });
        internals.extend(synthetic);

        debug!(rows = moved.len(), "Applied wrapped-native rule");
        moved.len()
    }

    fn resolve_swap(
        &self,
        tx: &mut EnrichedTransaction,
        token_rows: &[usize],
        internal_rows: &[usize],
        tokens: &[TokenTransfer],
        internals: &[InternalTransfer],
        stats: &mut ReconcileStats,
    ) {
        let tokens_to_wallet: Vec<usize> = token_rows
            .iter()
            .copied()
            .filter(|&i| tokens[i].to == self.wallet)
            .collect();
        let internal_to_wallet: Vec<usize> = internal_rows
            .iter()
            .copied()
            .filter(|&i| internals[i].to == self.wallet)
            .collect();

        match tx.tx_type {
            TxType::SwapTxNonzeroValue => {
                if let [only] = tokens_to_wallet.as_slice() {
                    self.mark_buy(tx, SwapType::SwapBuy, &tokens[*only]);
                    stats.swap_buys += 1;
                } else {
                    trace!(hash = %tx.hash, matches = tokens_to_wallet.len(), "Unmatched swap buy");
                    stats.unmatched_swaps += 1;
                }
            }
            TxType::SwapTxZeroValue => {
                match (internal_to_wallet.as_slice(), token_rows.is_empty()) {
                    ([only], false) => {
                        self.mark_sell(tx, SwapType::SwapSell, &internals[*only], token_rows, tokens);
                        stats.swap_sells += 1;
                    }
                    _ => {
                        trace!(hash = %tx.hash, matches = internal_to_wallet.len(), "Unmatched swap sell");
                        stats.unmatched_swaps += 1;
                    }
                }
            }
            TxType::Other => {
                if tx.value != 0.0 {
                    if let [only] = tokens_to_wallet.as_slice() {
                        self.mark_buy(tx, SwapType::OtherBuy, &tokens[*only]);
                        stats.other_buys += 1;
                    }
                } else if token_rows.len() > 1 {
                    if let [only] = internal_to_wallet.as_slice() {
                        self.mark_sell(tx, SwapType::OtherSell, &internals[*only], token_rows, tokens);
                        stats.other_sells += 1;
                    }
                }
            }
            _ => {}
        }
    }

    fn mark_buy(&self, tx: &mut EnrichedTransaction, swap_type: SwapType, transfer: &TokenTransfer) {
        tx.swap_type = Some(swap_type);
        tx.swap_counter_value = Some(tx.value);
        tx.set_token(transfer, transfer.value);
    }

    fn mark_sell(
        &self,
        tx: &mut EnrichedTransaction,
        swap_type: SwapType,
        internal: &InternalTransfer,
        token_rows: &[usize],
        tokens: &[TokenTransfer],
    ) {
        let total: f64 = token_rows.iter().map(|&i| tokens[i].value).sum();
        tx.swap_type = Some(swap_type);
        tx.swap_counter_value = Some(internal.value);
        tx.set_token(&tokens[token_rows[0]], total);
    }

    /// `other` + sent by the wallet + zero value => token transfer out
    ///
    /// Token fields come from the rows sent by the wallet when there are any,
    /// otherwise from the first token row of the hash (claims, airdrop pulls).
    fn promote_outgoing(
        &self,
        tx: &mut EnrichedTransaction,
        token_rows: &[usize],
        tokens: &[TokenTransfer],
    ) -> bool {
        if tx.tx_type != TxType::Other
            || tx.swap_type.is_some()
            || tx.from != self.wallet
            || tx.value != 0.0
        {
            return false;
        }

        let rows: Vec<&TokenTransfer> = token_rows.iter().map(|&i| &tokens[i]).collect();
        let sent: Vec<&TokenTransfer> = rows
            .iter()
            .copied()
            .filter(|t| t.from == self.wallet)
            .collect();
        let legs = if sent.is_empty() { rows } else { sent };

        let Some(first) = legs.first() else {
            tx.tx_type = TxType::TokensTransferOut;
            return true;
        };

        let total: f64 = legs
            .iter()
            .filter(|t| t.contract_address == first.contract_address)
            .map(|t| t.value)
            .sum();

        tx.tx_type = if self.chain.is_stablecoin(&first.contract_address) {
            TxType::StablecoinsTransferOut
        } else {
            TxType::TokensTransferOut
        };
        tx.set_token(first, total);
        true
    }

    /// Token transfers to the wallet with no parent transaction become their own rows
    fn promote_incoming_tokens(&self, txs: &mut Vec<EnrichedTransaction>, tokens: &[TokenTransfer]) -> usize {
        let known: FxHashSet<String> = txs.iter().map(|tx| tx.hash.clone()).collect();
        let before = txs.len();

        for transfer in tokens {
            if transfer.to != self.wallet || known.contains(&transfer.hash) {
                continue;
            }
            let tx_type = if self.chain.is_stablecoin(&transfer.contract_address) {
                TxType::StablecoinsTransferIn
            } else {
                TxType::TokensTransferIn
            };
            txs.push(EnrichedTransaction::from_token_transfer(transfer, tx_type));
        }

        txs.len() - before
    }

    /// Internal transfers to the wallet with no parent transaction become `eth_other_transfer_in`
    fn promote_incoming_internal(
        &self,
        txs: &mut Vec<EnrichedTransaction>,
        internals: &[InternalTransfer],
    ) -> usize {
        let known: FxHashSet<String> = txs.iter().map(|tx| tx.hash.clone()).collect();
        let before = txs.len();

        for transfer in internals {
            if transfer.to != self.wallet || known.contains(&transfer.hash) {
                continue;
            }
            txs.push(EnrichedTransaction::from_internal_transfer(
                transfer,
                TxType::EthOtherTransferIn,
            ));
        }

        txs.len() - before
    }
}
