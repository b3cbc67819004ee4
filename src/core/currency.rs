//! Currency codes, the rate table and the rate table provider abstraction

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use tracing::debug;

/// The fixed set of currencies an account can be held in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Jpy,
    Inr,
}

impl Currency {
    pub const ALL: [Currency; 5] = [
        Currency::Usd,
        Currency::Eur,
        Currency::Gbp,
        Currency::Jpy,
        Currency::Inr,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Jpy => "JPY",
            Currency::Inr => "INR",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Usd => "$",
            Currency::Eur => "€",
            Currency::Gbp => "£",
            Currency::Jpy => "¥",
            Currency::Inr => "₹",
        }
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "GBP" => Ok(Currency::Gbp),
            "JPY" => Ok(Currency::Jpy),
            "INR" => Ok(Currency::Inr),
            _ => Err(anyhow!("Unsupported currency: {}", s)),
        }
    }
}

impl TryFrom<String> for Currency {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.code().to_string()
    }
}

/// Conversion factors between currencies. `rate(a, b)` converts one unit of `a` into `b`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateTable {
    rates: HashMap<Currency, HashMap<Currency, f64>>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rate(&self, from: Currency, to: Currency) -> Option<f64> {
        self.rates.get(&from).and_then(|row| row.get(&to)).copied()
    }

    pub fn insert(&mut self, from: Currency, to: Currency, factor: f64) {
        self.rates.entry(from).or_default().insert(to, factor);
    }

    /// Sets `rate(x, x) = 1.0` for every supported currency.
    pub fn with_identity(mut self) -> Self {
        for currency in Currency::ALL {
            self.insert(currency, currency, 1.0);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rates.values().all(|row| row.is_empty())
    }

    /// Builds a table from a nested map keyed by currency codes.
    ///
    /// Unsupported codes and factors that are not positive finite numbers are skipped.
    pub fn from_codes(raw: &HashMap<String, HashMap<String, f64>>) -> Self {
        let mut table = RateTable::new();
        for (from_code, row) in raw {
            let Ok(from) = from_code.parse::<Currency>() else {
                debug!("Skipping rate row for unsupported currency {}", from_code);
                continue;
            };
            for (to_code, factor) in row {
                let Ok(to) = to_code.parse::<Currency>() else {
                    debug!("Skipping rate {}->{}: unsupported currency", from_code, to_code);
                    continue;
                };
                if !factor.is_finite() || *factor <= 0.0 {
                    debug!("Skipping rate {}->{}: invalid factor {}", from, to, factor);
                    continue;
                }
                table.insert(from, to, *factor);
            }
        }
        table
    }
}

/// Supplies a complete rate table over the supported currency set.
#[async_trait]
pub trait RateTableProvider: Send + Sync {
    async fn get_rates(&self) -> Result<RateTable>;
}
