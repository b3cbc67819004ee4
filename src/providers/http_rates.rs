use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument};

use crate::core::currency::{Currency, RateTable, RateTableProvider};
use crate::providers::util::with_retry;

const RETRIES: usize = 2;
const RETRY_DELAY_MS: u64 = 500;

/// Response of `GET /latest?from=XXX`.
#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    base: String,
    rates: HashMap<String, f64>,
}

/// Builds the rate table from an HTTP exchange rate service, one request per base currency.
pub struct HttpRateProvider {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRateProvider {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("wealthboard/1.0")
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    #[instrument(name = "RateRowFetch", skip(self), fields(base = %base))]
    async fn fetch_row(&self, base: Currency) -> Result<(String, HashMap<String, f64>)> {
        let url = format!("{}/latest?from={}", self.base_url, base.code());
        debug!("Requesting rates from {}", url);

        let response = with_retry(
            || self.client.get(&url).send(),
            RETRIES,
            RETRY_DELAY_MS,
        )
        .await
        .map_err(|e| anyhow!("Request error: {} for base currency: {}", e, base))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for base currency: {}",
                response.status(),
                base
            ));
        }

        let data = response
            .json::<LatestRatesResponse>()
            .await
            .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", base, e))?;
        if data.base.to_uppercase() != base.code() {
            return Err(anyhow!(
                "Rate service answered for {} instead of {}",
                data.base,
                base
            ));
        }
        Ok((base.code().to_string(), data.rates))
    }
}

#[async_trait]
impl RateTableProvider for HttpRateProvider {
    async fn get_rates(&self) -> Result<RateTable> {
        let rows = join_all(Currency::ALL.iter().map(|base| self.fetch_row(*base))).await;
        let raw = rows.into_iter().collect::<Result<HashMap<_, _>>>()?;
        Ok(RateTable::from_codes(&raw).with_identity())
    }
}
