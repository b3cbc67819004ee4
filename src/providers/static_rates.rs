use crate::core::currency::{Currency, RateTable, RateTableProvider};
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Built-in conversion factors, `(from, [(to, factor)])`.
const BUILTIN_RATES: [(Currency, [(Currency, f64); 5]); 5] = [
    (
        Currency::Usd,
        [
            (Currency::Usd, 1.0),
            (Currency::Eur, 0.92),
            (Currency::Gbp, 0.79),
            (Currency::Jpy, 150.0),
            (Currency::Inr, 83.0),
        ],
    ),
    (
        Currency::Eur,
        [
            (Currency::Usd, 1.09),
            (Currency::Eur, 1.0),
            (Currency::Gbp, 0.86),
            (Currency::Jpy, 163.0),
            (Currency::Inr, 90.0),
        ],
    ),
    (
        Currency::Gbp,
        [
            (Currency::Usd, 1.27),
            (Currency::Eur, 1.16),
            (Currency::Gbp, 1.0),
            (Currency::Jpy, 190.0),
            (Currency::Inr, 105.0),
        ],
    ),
    (
        Currency::Jpy,
        [
            (Currency::Usd, 0.0067),
            (Currency::Eur, 0.0061),
            (Currency::Gbp, 0.0053),
            (Currency::Jpy, 1.0),
            (Currency::Inr, 0.55),
        ],
    ),
    (
        Currency::Inr,
        [
            (Currency::Usd, 0.012),
            (Currency::Eur, 0.011),
            (Currency::Gbp, 0.0095),
            (Currency::Jpy, 1.8),
            (Currency::Inr, 1.0),
        ],
    ),
];

/// Serves a fixed rate table, optionally after a simulated network delay.
#[derive(Debug, Clone, Default)]
pub struct StaticRateProvider {
    latency: Option<Duration>,
}

impl StaticRateProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
        }
    }

    pub fn table() -> RateTable {
        let mut table = RateTable::new();
        for (from, row) in BUILTIN_RATES {
            for (to, factor) in row {
                table.insert(from, to, factor);
            }
        }
        table
    }
}

#[async_trait]
impl RateTableProvider for StaticRateProvider {
    async fn get_rates(&self) -> Result<RateTable> {
        if let Some(latency) = self.latency {
            debug!("Simulating rate fetch latency of {:?}", latency);
            tokio::time::sleep(latency).await;
        }
        Ok(Self::table())
    }
}
