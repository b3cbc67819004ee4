//! The persisted per-user document and the store abstraction around it.

use crate::core::account::{Account, MonthlyEntry};
use crate::core::currency::Currency;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// An account as stored: monthly data travels as an encoded JSON blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAccount {
    pub name: String,
    pub currency: Currency,
    pub monthly_data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDocument {
    pub accounts: Vec<StoredAccount>,
    pub base_currency: Currency,
}

impl UserDocument {
    pub fn encode(accounts: &[Account], base_currency: Currency) -> Result<Self> {
        let accounts = accounts
            .iter()
            .map(|a| {
                Ok(StoredAccount {
                    name: a.name.clone(),
                    currency: a.currency,
                    monthly_data: serde_json::to_string(&a.monthly_data)
                        .with_context(|| format!("Failed to encode monthly data for {}", a.name))?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            accounts,
            base_currency,
        })
    }

    pub fn decode(&self) -> Result<(Vec<Account>, Currency)> {
        let accounts = self
            .accounts
            .iter()
            .map(|stored| {
                let mut monthly_data: Vec<MonthlyEntry> =
                    serde_json::from_str(&stored.monthly_data).with_context(|| {
                        format!("Failed to decode monthly data for {}", stored.name)
                    })?;
                monthly_data.sort_by(|a, b| a.month.cmp(&b.month));
                Ok(Account {
                    name: stored.name.clone(),
                    currency: stored.currency,
                    monthly_data,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((accounts, self.base_currency))
    }
}

/// Pushed to subscribers after every successful save.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreChange {
    pub user: String,
    /// Identifies the session that wrote the document.
    pub writer: String,
    pub document: UserDocument,
}

/// Read-all/write-all persistence for one document per user, with change notification.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn load(&self, user: &str) -> Result<Option<UserDocument>>;

    async fn save(&self, user: &str, writer: &str, document: &UserDocument) -> Result<()>;

    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}
