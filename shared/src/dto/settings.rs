//! Preferences persisted client-side across reloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which market the whole application addresses
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    #[default]
    Crypto,
    Stocks,
}

impl TradingMode {
    pub fn all() -> &'static [TradingMode] {
        &[TradingMode::Crypto, TradingMode::Stocks]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TradingMode::Crypto => "crypto",
            TradingMode::Stocks => "stocks",
        }
    }
}

impl fmt::Display for TradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradingMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "crypto" => Ok(TradingMode::Crypto),
            "stocks" | "stock" => Ok(TradingMode::Stocks),
            other => Err(format!("Unknown trading mode: {}", other)),
        }
    }
}

/// Cookie-consent choice
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CookieConsent {
    /// Always true: strictly necessary cookies cannot be declined
    pub necessary: bool,
    pub analytics: bool,
    pub marketing: bool,
    pub decided_at: DateTime<Utc>,
}

impl CookieConsent {
    pub fn accept_all(now: DateTime<Utc>) -> Self {
        Self {
            necessary: true,
            analytics: true,
            marketing: true,
            decided_at: now,
        }
    }

    pub fn necessary_only(now: DateTime<Utc>) -> Self {
        Self {
            necessary: true,
            analytics: false,
            marketing: false,
            decided_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trading_mode_parse() {
        assert_eq!("crypto".parse::<TradingMode>(), Ok(TradingMode::Crypto));
        assert_eq!(" Stocks ".parse::<TradingMode>(), Ok(TradingMode::Stocks));
        assert!("forex".parse::<TradingMode>().is_err());
    }

    #[test]
    fn test_trading_mode_wire_format() {
        assert_eq!(serde_json::to_string(&TradingMode::Stocks).expect("serializable"), "\"stocks\"");
        assert_eq!(TradingMode::default(), TradingMode::Crypto);
    }
}
