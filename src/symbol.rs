//! Ticker symbol type.

use std::fmt;
use std::str::FromStr;

/// Longest accepted symbol. OCC option symbols are 21 bytes.
pub const MAX_SYMBOL_LEN: usize = 21;

/// A tradeable ticker (e.g. `SSO`, `VGLT`).
///
/// Always non-empty ASCII without whitespace. The "hold cash" placeholder
/// is modelled as `Option<Symbol>::None`, never as an empty symbol.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Symbol(String);

impl Symbol {
    /// Create a symbol, panicking on invalid input.
    ///
    /// Intended for literals and tests; use [`Symbol::try_new`] for
    /// untrusted input.
    #[track_caller]
    pub fn new(s: &str) -> Self {
        match Self::try_new(s) {
            Some(sym) => sym,
            None => panic!("invalid symbol: {s:?}"),
        }
    }

    /// Create a symbol, returning `None` if `s` is empty, too long, or
    /// contains non-ASCII or whitespace characters.
    pub fn try_new(s: &str) -> Option<Self> {
        if s.is_empty() || s.len() > MAX_SYMBOL_LEN {
            return None;
        }
        if !s.bytes().all(|b| b.is_ascii_graphic()) {
            return None;
        }
        Some(Symbol(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Symbol {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Symbol::try_new(s).ok_or_else(|| crate::Error::InvalidConfig(format!("invalid symbol: {s:?}")))
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Symbol {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Symbol::try_new(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid symbol: {s:?}")))
    }
}
