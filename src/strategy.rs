//! Weighted strategies and target allocation planning.
//!
//! A [`Strategy`] owns a fixed slice of the portfolio (`weight`) and says
//! which ticker to hold in each volatility level. `None` for a level means
//! the slice sits in cash at that level.

use crate::error::{Error, Result};
use crate::regime::VolatilityLevels;
use crate::symbol::Symbol;

/// One weighted strategy with a per-level symbol table.
#[derive(Clone, Debug, PartialEq)]
pub struct Strategy {
    name: String,
    weight: f64,
    symbols: Vec<(String, Option<Symbol>)>,
}

impl Strategy {
    /// Create a strategy with an empty symbol table.
    pub fn new(name: &str, weight: f64) -> Self {
        Self {
            name: name.to_string(),
            weight,
            symbols: Vec::new(),
        }
    }

    /// Hold `symbol` at `level`.
    pub fn hold(mut self, level: &str, symbol: &str) -> Self {
        self.set(level, Some(Symbol::new(symbol)));
        self
    }

    /// Hold cash at `level`.
    pub fn cash(mut self, level: &str) -> Self {
        self.set(level, None);
        self
    }

    /// Assign a level's symbol, replacing an earlier assignment.
    pub fn set(&mut self, level: &str, symbol: Option<Symbol>) {
        match self.symbols.iter_mut().find(|(l, _)| l == level) {
            Some(entry) => entry.1 = symbol,
            None => self.symbols.push((level.to_string(), symbol)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Symbol assigned to `level`: `Some(None)` for cash, `None` if the level
    /// is not in the table.
    pub fn symbol_for(&self, level: &str) -> Option<Option<&Symbol>> {
        self.symbols
            .iter()
            .find(|(l, _)| l == level)
            .map(|(_, s)| s.as_ref())
    }

    /// Every distinct ticker this strategy can hold, in table order.
    pub fn symbol_list(&self) -> Vec<&Symbol> {
        let mut out: Vec<&Symbol> = Vec::new();
        for sym in self.symbols.iter().filter_map(|(_, s)| s.as_ref()) {
            if !out.contains(&sym) {
                out.push(sym);
            }
        }
        out
    }

    /// Check weight range and that the table covers exactly `levels`.
    pub fn validate(&self, levels: &VolatilityLevels) -> Result<()> {
        if !(0.0..=1.0).contains(&self.weight) {
            return Err(Error::InvalidConfig(format!(
                "strategy {} weight {} outside [0, 1]",
                self.name, self.weight
            )));
        }
        for name in levels.names() {
            if self.symbol_for(name).is_none() {
                return Err(Error::InvalidConfig(format!(
                    "strategy {} has no symbol for level {name}",
                    self.name
                )));
            }
        }
        if let Some((unknown, _)) = self.symbols.iter().find(|(l, _)| !levels.contains(l)) {
            return Err(Error::InvalidConfig(format!(
                "strategy {} references unknown level {unknown}",
                self.name
            )));
        }
        Ok(())
    }
}

/// One slice of the target portfolio.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TargetEntry {
    pub strategy: String,
    /// `None` means hold cash; never submitted as an order.
    pub symbol: Option<Symbol>,
    pub weight: f64,
}

/// Target portfolio: exactly one entry per strategy, in strategy order.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TargetAllocation {
    pub level: String,
    pub entries: Vec<TargetEntry>,
}

impl TargetAllocation {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct non-cash symbols, in entry order.
    pub fn symbols(&self) -> Vec<&Symbol> {
        let mut out: Vec<&Symbol> = Vec::new();
        for sym in self.entries.iter().filter_map(|e| e.symbol.as_ref()) {
            if !out.contains(&sym) {
                out.push(sym);
            }
        }
        out
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.entries.iter().any(|e| e.symbol.as_ref() == Some(symbol))
    }

    /// Sum of weights of non-cash entries.
    pub fn invested_weight(&self) -> f64 {
        self.entries
            .iter()
            .filter(|e| e.symbol.is_some())
            .map(|e| e.weight)
            .sum()
    }
}

/// Build the target allocation for `level`.
///
/// Entries are not merged: two strategies resolving to the same symbol
/// produce two entries.
pub fn plan_allocation(level: &str, strategies: &[Strategy]) -> Result<TargetAllocation> {
    let entries = strategies
        .iter()
        .map(|s| -> Result<TargetEntry> {
            let symbol = s.symbol_for(level).ok_or_else(|| {
                Error::InvalidConfig(format!("strategy {} has no symbol for level {level}", s.name))
            })?;
            Ok(TargetEntry {
                strategy: s.name.clone(),
                symbol: symbol.cloned(),
                weight: s.weight,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(TargetAllocation {
        level: level.to_string(),
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defensive() -> Strategy {
        Strategy::new("defensive", 0.25)
            .hold("minimum", "VGLT")
            .hold("moderate", "QLD")
            .hold("average", "QLD")
            .hold("elevated", "XLU")
            .cash("extreme")
    }

    fn vol_trend() -> Strategy {
        Strategy::new("vol_trend", 0.25)
            .hold("minimum", "SVXY")
            .hold("moderate", "SVXY")
            .hold("average", "SVXY")
            .cash("elevated")
            .cash("extreme")
    }

    #[test]
    fn symbol_lookup() {
        let s = defensive();
        assert_eq!(s.symbol_for("moderate"), Some(Some(&Symbol::new("QLD"))));
        assert_eq!(s.symbol_for("extreme"), Some(None));
        assert_eq!(s.symbol_for("unknown"), None);
        assert_eq!(s.symbol_list().len(), 3);
    }

    #[test]
    fn set_replaces_assignment() {
        let mut s = defensive();
        s.set("extreme", Some(Symbol::new("GLD")));
        assert_eq!(s.symbol_for("extreme"), Some(Some(&Symbol::new("GLD"))));
    }

    #[test]
    fn plan_preserves_strategy_order() {
        let target = plan_allocation("moderate", &[defensive(), vol_trend()]).unwrap();
        assert_eq!(target.len(), 2);
        assert_eq!(target.level, "moderate");
        assert_eq!(target.entries[0].symbol, Some(Symbol::new("QLD")));
        assert_eq!(target.entries[1].symbol, Some(Symbol::new("SVXY")));
        assert_eq!(target.entries[0].strategy, "defensive");
        assert!((target.invested_weight() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn plan_keeps_cash_entries() {
        let target = plan_allocation("extreme", &[defensive(), vol_trend()]).unwrap();
        assert_eq!(target.len(), 2);
        assert!(target.entries.iter().all(|e| e.symbol.is_none()));
        assert!(target.entries.iter().all(|e| e.weight == 0.25));
        assert!(target.symbols().is_empty());
        assert_eq!(target.invested_weight(), 0.0);
    }

    #[test]
    fn plan_does_not_merge_duplicates() {
        let a = Strategy::new("a", 0.3).hold("calm", "SSO");
        let b = Strategy::new("b", 0.2).hold("calm", "SSO");
        let target = plan_allocation("calm", &[a, b]).unwrap();
        assert_eq!(target.len(), 2);
        assert_eq!(target.symbols(), [&Symbol::new("SSO")]);
        assert!(target.contains(&Symbol::new("SSO")));
    }

    #[test]
    fn plan_missing_level_errors() {
        let a = Strategy::new("a", 0.3).hold("calm", "SSO");
        assert!(plan_allocation("storm", &[a]).is_err());
    }

    #[test]
    fn validate_against_levels() {
        let levels = VolatilityLevels::standard();
        assert!(defensive().validate(&levels).is_ok());

        let partial = Strategy::new("p", 0.5).hold("minimum", "SSO");
        assert!(partial.validate(&levels).is_err());

        let heavy = Strategy::new("h", 1.5);
        assert!(heavy.validate(&levels).is_err());

        let extra = defensive().hold("panic", "GLD");
        assert!(extra.validate(&levels).is_err());
    }
}
