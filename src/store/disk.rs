use crate::core::document::{AccountStore, StoreChange, UserDocument};
use anyhow::{Context, Result};
use async_trait::async_trait;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use tokio::sync::broadcast;
use tracing::debug;

const PARTITION: &str = "wealth";

/// Account store backed by a fjall keyspace. One JSON document per user id.
pub struct DiskAccountStore {
    keyspace: Keyspace,
    partition: PartitionHandle,
    changes: broadcast::Sender<StoreChange>,
}

impl DiskAccountStore {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create data directory: {}", path.display()))?;

        let keyspace = Config::new(path)
            .open()
            .with_context(|| format!("Failed to open store at {}", path.display()))?;
        let partition = keyspace
            .open_partition(PARTITION, PartitionCreateOptions::default())
            .context("Failed to open wealth partition")?;
        let (changes, _) = broadcast::channel(super::CHANGE_BUFFER);
        debug!("Opened account store at {}", path.display());

        Ok(Self {
            keyspace,
            partition,
            changes,
        })
    }
}

#[async_trait]
impl AccountStore for DiskAccountStore {
    async fn load(&self, user: &str) -> Result<Option<UserDocument>> {
        let Some(value) = self.partition.get(user)? else {
            debug!(user, "Disk store MISS");
            return Ok(None);
        };
        let document = serde_json::from_slice(&value)
            .with_context(|| format!("Failed to parse stored document for user {user}"))?;
        debug!(user, "Disk store HIT");
        Ok(Some(document))
    }

    async fn save(&self, user: &str, writer: &str, document: &UserDocument) -> Result<()> {
        let bytes = serde_json::to_vec(document)?;
        self.partition.insert(user, bytes)?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!(user, writer, "Disk store SAVE");

        super::notify(
            &self.changes,
            StoreChange {
                user: user.to_string(),
                writer: writer.to_string(),
                document: document.clone(),
            },
        );
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::account::{Account, MonthlyEntry};
    use crate::core::currency::Currency;
    use tempfile::tempdir;

    fn sample_document() -> UserDocument {
        let accounts = vec![Account::new("Vanguard", Currency::Usd).upsert_entry(
            MonthlyEntry::new("2024-01".parse().unwrap(), 100.0, 200.0),
        )];
        UserDocument::encode(&accounts, Currency::Eur).unwrap()
    }

    #[tokio::test]
    async fn test_disk_store_load_save() {
        let dir = tempdir().unwrap();
        let store = DiskAccountStore::open(dir.path()).unwrap();

        assert!(store.load("alice").await.unwrap().is_none());

        store
            .save("alice", "session-1", &sample_document())
            .await
            .unwrap();
        assert_eq!(store.load("alice").await.unwrap(), Some(sample_document()));
        assert!(store.load("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_disk_store_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = DiskAccountStore::open(dir.path()).unwrap();
            store
                .save("alice", "session-1", &sample_document())
                .await
                .unwrap();
        }

        let store = DiskAccountStore::open(dir.path()).unwrap();
        let (accounts, base) = store.load("alice").await.unwrap().unwrap().decode().unwrap();
        assert_eq!(base, Currency::Eur);
        assert_eq!(accounts[0].name, "Vanguard");
        assert_eq!(accounts[0].monthly_data[0].ending, 200.0);
    }

    #[tokio::test]
    async fn test_disk_store_notifies_subscribers() {
        let dir = tempdir().unwrap();
        let store = DiskAccountStore::open(dir.path()).unwrap();
        let mut changes = store.subscribe();

        store
            .save("alice", "session-2", &sample_document())
            .await
            .unwrap();

        let change = changes.recv().await.unwrap();
        assert_eq!(change.user, "alice");
        assert_eq!(change.writer, "session-2");
    }
}
