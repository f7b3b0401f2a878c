//! Rolling Metrics Engine
//!
//! Single left-to-right scan over swap rows sorted by block number. Every output row
//! carries running sums and trailing windows as they stood after that swap. Metrics
//! that are undefined on a row carry the last known value forward, or 0.0 before
//! the first one.

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use tracing::debug;

use crate::models::{EnrichedTransaction, SwapSide};

/// Floor for denominators that can be zero
pub const EPSILON: f64 = 1e-9;
/// Share of bought tokens that must be sold before a position counts as exited
pub const EXIT_THRESHOLD: f64 = 0.9;
pub const RECENT_DAYS: i64 = 7;
pub const WIN_RATIO_WINDOW: usize = 25;
pub const MOVING_AVERAGE_WINDOW: usize = 10;

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollingMetricsRow {
    pub hash: String,
    pub block_number: u64,
    pub timestamp: i64,
    pub token_contract: String,
    pub token_symbol: String,
    pub side: SwapSide,
    pub native_value: f64,
    pub token_value: f64,
    /// Whole days since the first swap
    pub day_offset: i64,
    pub trades_last_7_days: usize,
    pub distinct_tokens_cumsum: usize,
    pub trades_cumsum: usize,
    pub eth_bought_cumsum: f64,
    pub eth_sold_cumsum: f64,
    pub sold_bought_ratio: f64,
    /// Per-token running sums
    pub token_bought_cumsum: f64,
    pub token_sold_cumsum: f64,
    pub token_eth_bought_cumsum: f64,
    pub token_eth_sold_cumsum: f64,
    /// Sold at least 90% of what was bought of this token so far
    pub exited: bool,
    pub realized_result: f64,
    pub win: bool,
    pub wins_number_cumsum: usize,
    pub exited_trades_cumsum: usize,
    pub win_ratio: f64,
    pub win_ratio_last_25: f64,
    pub result_ma_10: f64,
    pub result_expanding_mean: f64,
    pub exited_tokens_ratio: f64,
    pub buy_size_ma_10: f64,
    pub buy_size_expanding_mean: f64,
    pub buy_size_ma_ratio: f64,
    pub profit_per_trade: f64,
}

/// Mean over the last `capacity` pushed values (partial until full)
#[derive(Debug, Clone)]
struct TrailingWindow {
    capacity: usize,
    values: VecDeque<f64>,
    sum: f64,
}

impl TrailingWindow {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            values: VecDeque::with_capacity(capacity),
            sum: 0.0,
        }
    }

    fn push(&mut self, value: f64) -> f64 {
        if self.values.len() == self.capacity {
            if let Some(old) = self.values.pop_front() {
                self.sum -= old;
            }
        }
        self.values.push_back(value);
        self.sum += value;
        self.sum / self.values.len() as f64
    }
}

#[derive(Debug, Clone, Default)]
struct Expanding {
    sum: f64,
    count: usize,
}

impl Expanding {
    fn push(&mut self, value: f64) -> f64 {
        self.sum += value;
        self.count += 1;
        self.sum / self.count as f64
    }
}

#[derive(Debug, Clone, Default)]
struct TokenPosition {
    bought: f64,
    sold: f64,
    eth_bought: f64,
    eth_sold: f64,
}

/// Last known value of a gappy series
#[derive(Debug, Clone, Copy, Default)]
struct Carry(Option<f64>);

impl Carry {
    fn update(&mut self, value: Option<f64>) -> f64 {
        if value.is_some() {
            self.0 = value;
        }
        self.0.unwrap_or(0.0)
    }
}

/// Running state of the scan
struct RollingScan {
    first_timestamp: Option<i64>,
    recent_days: VecDeque<i64>,
    tokens_seen: FxHashSet<String>,
    exited_tokens: FxHashSet<String>,
    positions: FxHashMap<String, TokenPosition>,
    trades: usize,
    eth_bought: f64,
    eth_sold: f64,
    wins: usize,
    exited_trades: usize,
    win_window: TrailingWindow,
    result_window: TrailingWindow,
    result_all: Expanding,
    buy_window: TrailingWindow,
    buy_all: Expanding,
    realized_carry: Carry,
    win_ratio_carry: Carry,
    win_25_carry: Carry,
    result_ma_carry: Carry,
    result_mean_carry: Carry,
    buy_ma_carry: Carry,
    buy_mean_carry: Carry,
    buy_ratio_carry: Carry,
}

impl RollingScan {
    fn new() -> Self {
        Self {
            first_timestamp: None,
            recent_days: VecDeque::new(),
            tokens_seen: FxHashSet::default(),
            exited_tokens: FxHashSet::default(),
            positions: FxHashMap::default(),
            trades: 0,
            eth_bought: 0.0,
            eth_sold: 0.0,
            wins: 0,
            exited_trades: 0,
            win_window: TrailingWindow::new(WIN_RATIO_WINDOW),
            result_window: TrailingWindow::new(MOVING_AVERAGE_WINDOW),
            result_all: Expanding::default(),
            buy_window: TrailingWindow::new(MOVING_AVERAGE_WINDOW),
            buy_all: Expanding::default(),
            realized_carry: Carry::default(),
            win_ratio_carry: Carry::default(),
            win_25_carry: Carry::default(),
            result_ma_carry: Carry::default(),
            result_mean_carry: Carry::default(),
            buy_ma_carry: Carry::default(),
            buy_mean_carry: Carry::default(),
            buy_ratio_carry: Carry::default(),
        }
    }

    fn push(&mut self, tx: &EnrichedTransaction, side: SwapSide, contract: &str) -> RollingMetricsRow {
        let native = tx.swap_counter_value.unwrap_or(0.0);
        let tokens = tx.token_value.unwrap_or(0.0);

        let t0 = *self.first_timestamp.get_or_insert(tx.timestamp);
        let day_offset = (tx.timestamp - t0).div_euclid(SECONDS_PER_DAY);
        while let Some(&front) = self.recent_days.front() {
            if day_offset - front >= RECENT_DAYS {
                self.recent_days.pop_front();
            } else {
                break;
            }
        }
        self.recent_days.push_back(day_offset);

        self.tokens_seen.insert(contract.to_string());
        self.trades += 1;

        let position = self.positions.entry(contract.to_string()).or_default();
        match side {
            SwapSide::Buy => {
                self.eth_bought += native;
                position.bought += tokens;
                position.eth_bought += native;
            }
            SwapSide::Sell => {
                self.eth_sold += native;
                position.sold += tokens;
                position.eth_sold += native;
            }
        }
        let position = position.clone();

        let exited = position.bought > 0.0 && position.sold >= EXIT_THRESHOLD * position.bought;
        let mut realized = None;
        let mut win = false;
        let (mut win_ratio, mut win_25, mut result_ma, mut result_mean) = (None, None, None, None);

        if exited {
            self.exited_tokens.insert(contract.to_string());
            let result = position.eth_sold - position.eth_bought;
            win = result > 0.0;
            self.exited_trades += 1;
            if win {
                self.wins += 1;
            }
            realized = Some(result);
            win_ratio = Some(self.wins as f64 / self.exited_trades as f64);
            win_25 = Some(self.win_window.push(if win { 1.0 } else { 0.0 }));
            result_ma = Some(self.result_window.push(result));
            result_mean = Some(self.result_all.push(result));
        }

        let (mut buy_ma, mut buy_mean, mut buy_ratio) = (None, None, None);
        if side == SwapSide::Buy {
            let ma = self.buy_window.push(native);
            let mean = self.buy_all.push(native);
            buy_ma = Some(ma);
            buy_mean = Some(mean);
            buy_ratio = Some(ma / mean.max(EPSILON));
        }

        RollingMetricsRow {
            hash: tx.hash.clone(),
            block_number: tx.block_number,
            timestamp: tx.timestamp,
            token_contract: contract.to_string(),
            token_symbol: tx.token_symbol.clone().unwrap_or_default(),
            side,
            native_value: native,
            token_value: tokens,
            day_offset,
            trades_last_7_days: self.recent_days.len(),
            distinct_tokens_cumsum: self.tokens_seen.len(),
            trades_cumsum: self.trades,
            eth_bought_cumsum: self.eth_bought,
            eth_sold_cumsum: self.eth_sold,
            sold_bought_ratio: self.eth_sold / self.eth_bought.max(EPSILON),
            token_bought_cumsum: position.bought,
            token_sold_cumsum: position.sold,
            token_eth_bought_cumsum: position.eth_bought,
            token_eth_sold_cumsum: position.eth_sold,
            exited,
            realized_result: self.realized_carry.update(realized),
            win,
            wins_number_cumsum: self.wins,
            exited_trades_cumsum: self.exited_trades,
            win_ratio: self.win_ratio_carry.update(win_ratio),
            win_ratio_last_25: self.win_25_carry.update(win_25),
            result_ma_10: self.result_ma_carry.update(result_ma),
            result_expanding_mean: self.result_mean_carry.update(result_mean),
            exited_tokens_ratio: self.exited_tokens.len() as f64 / self.tokens_seen.len() as f64,
            buy_size_ma_10: self.buy_ma_carry.update(buy_ma),
            buy_size_expanding_mean: self.buy_mean_carry.update(buy_mean),
            buy_size_ma_ratio: self.buy_ratio_carry.update(buy_ratio),
            profit_per_trade: (self.eth_sold - self.eth_bought) / (self.trades as f64 / 2.0).max(EPSILON),
        }
    }
}

/// Compute the rolling table. Rows are stably sorted by block number first, so ties
/// keep their feed order. Rows without a swap side or token are skipped.
pub fn compute_rolling_metrics(swaps: &[EnrichedTransaction]) -> Vec<RollingMetricsRow> {
    let mut ordered: Vec<&EnrichedTransaction> = swaps.iter().collect();
    ordered.sort_by_key(|tx| tx.block_number);

    let mut scan = RollingScan::new();
    let rows: Vec<RollingMetricsRow> = ordered
        .into_iter()
        .filter_map(|tx| {
            let side = tx.swap_side()?;
            let contract = tx.token_contract.as_deref()?;
            Some(scan.push(tx, side, contract))
        })
        .collect();

    debug!(rows = rows.len(), "Computed rolling metrics");
    rows
}
