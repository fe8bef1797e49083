//! Regime classification: map a barometer value to an ordered risk level.

use crate::error::{Error, Result};

/// A named level and its exclusive upper bound.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VolLevel {
    pub name: String,
    pub threshold: f64,
}

impl VolLevel {
    pub fn new(name: &str, threshold: f64) -> Self {
        Self {
            name: name.to_string(),
            threshold,
        }
    }
}

/// What to do with a value at or above the highest threshold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum OverflowPolicy {
    /// Fail with [`Error::UnclassifiedRegime`].
    #[default]
    Reject,
    /// Treat the value as belonging to the highest level.
    ClampToHighest,
}

/// Ordered levels with strictly increasing thresholds.
#[derive(Clone, Debug, PartialEq)]
pub struct VolatilityLevels {
    levels: Vec<VolLevel>,
    overflow: OverflowPolicy,
}

impl VolatilityLevels {
    /// Build from `(name, threshold)` pairs in ascending order.
    ///
    /// Rejects an empty list, duplicate names, and thresholds that are not
    /// finite or not strictly increasing.
    pub fn new(levels: Vec<VolLevel>) -> Result<Self> {
        if levels.is_empty() {
            return Err(Error::InvalidConfig("at least one volatility level is required".into()));
        }
        for (i, level) in levels.iter().enumerate() {
            if level.name.is_empty() {
                return Err(Error::InvalidConfig("level name must not be empty".into()));
            }
            if !level.threshold.is_finite() {
                return Err(Error::InvalidConfig(format!(
                    "level {} threshold must be finite",
                    level.name
                )));
            }
            if levels[..i].iter().any(|l| l.name == level.name) {
                return Err(Error::InvalidConfig(format!("duplicate level {}", level.name)));
            }
            if i > 0 && level.threshold <= levels[i - 1].threshold {
                return Err(Error::InvalidConfig(format!(
                    "level {} threshold {} must exceed {} ({})",
                    level.name,
                    level.threshold,
                    levels[i - 1].name,
                    levels[i - 1].threshold
                )));
            }
        }
        Ok(Self {
            levels,
            overflow: OverflowPolicy::Reject,
        })
    }

    /// The five production levels: minimum < 20 ≤ moderate < 40 ≤ average
    /// < 60 ≤ elevated < 80 ≤ extreme < 100.
    pub fn standard() -> Self {
        Self {
            levels: vec![
                VolLevel::new("minimum", 20.0),
                VolLevel::new("moderate", 40.0),
                VolLevel::new("average", 60.0),
                VolLevel::new("elevated", 80.0),
                VolLevel::new("extreme", 100.0),
            ],
            overflow: OverflowPolicy::Reject,
        }
    }

    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    pub fn overflow(&self) -> OverflowPolicy {
        self.overflow
    }

    pub fn levels(&self) -> &[VolLevel] {
        &self.levels
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.levels.iter().map(|l| l.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.levels.iter().any(|l| l.name == name)
    }

    pub fn highest(&self) -> &VolLevel {
        // non-empty by construction
        &self.levels[self.levels.len() - 1]
    }

    /// True if `value` is at or above the highest threshold.
    pub fn is_overflow(&self, value: f64) -> bool {
        value >= self.highest().threshold
    }

    /// First level, in ascending order, whose threshold is strictly above
    /// `value`.
    ///
    /// A value at or above every threshold is rejected or clamped according
    /// to the [`OverflowPolicy`]. NaN is always rejected.
    pub fn classify(&self, value: f64) -> Result<&VolLevel> {
        let highest = self.highest();
        if value.is_nan() {
            return Err(Error::UnclassifiedRegime {
                value,
                highest: highest.threshold,
            });
        }
        if let Some(level) = self.levels.iter().find(|l| value < l.threshold) {
            return Ok(level);
        }
        match self.overflow {
            OverflowPolicy::Reject => Err(Error::UnclassifiedRegime {
                value,
                highest: highest.threshold,
            }),
            OverflowPolicy::ClampToHighest => Ok(highest),
        }
    }
}
