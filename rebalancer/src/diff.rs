//! CURRENT→TARGET diff.
//!
//! Pure functions: decide which held positions to close and which target
//! entries to buy, given the positions and the target allocation. Held
//! positions that are still targeted are kept as they are, and their symbols
//! are blocklisted so no additional buy is placed for them.

use rustc_hash::FxHashSet;
use serde::Serialize;
use volbarometer::{Symbol, TargetAllocation};
use volbarometer_broker::{NotionalOrder, Position};

/// Result of comparing current positions with the target.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diff {
    /// Held symbols absent from the target, in position order.
    pub close: Vec<Symbol>,
    /// Held symbols present in the target, in position order.
    pub retained: Vec<Symbol>,
    /// Symbols that must not be bought this run.
    #[serde(skip)]
    pub blocklist: FxHashSet<Symbol>,
}

/// Split current positions into closes and retains.
pub fn compute_diff(positions: &[Position], target: &TargetAllocation) -> Diff {
    let mut diff = Diff::default();
    for pos in positions {
        if target.contains(&pos.symbol) {
            if diff.blocklist.insert(pos.symbol.clone()) {
                diff.retained.push(pos.symbol.clone());
            }
        } else if !diff.close.contains(&pos.symbol) {
            diff.close.push(pos.symbol.clone());
        }
    }
    diff
}

/// Notional for `weight` of `equity_cents`, rounded to the nearest cent.
pub fn notional_cents(equity_cents: i64, weight: f64) -> i64 {
    (equity_cents as f64 * weight).round() as i64
}

/// Buy orders for every non-cash, non-blocklisted target entry.
///
/// Entries are not merged: two strategies on the same symbol give two
/// orders. Orders that would round to zero cents are skipped.
pub fn plan_opens(
    target: &TargetAllocation,
    blocklist: &FxHashSet<Symbol>,
    equity_cents: i64,
) -> Vec<NotionalOrder> {
    target
        .entries
        .iter()
        .filter_map(|entry| {
            let symbol = entry.symbol.as_ref()?;
            if blocklist.contains(symbol) {
                return None;
            }
            let cents = notional_cents(equity_cents, entry.weight);
            (cents > 0).then(|| NotionalOrder::market_buy(symbol.clone(), cents))
        })
        .collect()
}
