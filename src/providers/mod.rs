pub mod http_rates;
pub mod static_rates;
pub mod util;

use crate::core::config::AppConfig;
use crate::core::currency::RateTableProvider;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub use http_rates::HttpRateProvider;
pub use static_rates::StaticRateProvider;

/// The HTTP rate service when one is configured, the built-in table otherwise.
pub fn from_config(config: &AppConfig) -> Result<Arc<dyn RateTableProvider>> {
    match &config.providers.rates {
        Some(rates) => {
            debug!("Using rate service at {}", rates.base_url);
            Ok(Arc::new(HttpRateProvider::new(&rates.base_url)?))
        }
        None => match config.providers.builtin_latency_ms {
            Some(ms) => {
                debug!("Using built-in rate table with {ms}ms latency");
                Ok(Arc::new(StaticRateProvider::with_latency(
                    Duration::from_millis(ms),
                )))
            }
            None => {
                debug!("Using built-in rate table");
                Ok(Arc::new(StaticRateProvider::new()))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_builtin_latency_from_config() {
        let mut config = AppConfig::default();
        config.providers.builtin_latency_ms = Some(1000);
        let provider = from_config(&config).unwrap();
        let start = tokio::time::Instant::now();

        let table = provider.get_rates().await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert_eq!(table, StaticRateProvider::table());
    }

    #[tokio::test(start_paused = true)]
    async fn test_builtin_table_without_latency() {
        let provider = from_config(&AppConfig::default()).unwrap();
        let start = tokio::time::Instant::now();

        provider.get_rates().await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
