use crate::core::document::{AccountStore, StoreChange, UserDocument};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tracing::debug;

/// In-memory account store, for tests and ephemeral sessions.
#[derive(Clone)]
pub struct MemoryAccountStore {
    inner: Arc<Mutex<HashMap<String, UserDocument>>>,
    changes: broadcast::Sender<StoreChange>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(super::CHANGE_BUFFER);
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            changes,
        }
    }
}

impl Default for MemoryAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn load(&self, user: &str) -> Result<Option<UserDocument>> {
        let documents = self.inner.lock().await;
        let document = documents.get(user).cloned();
        debug!(user, found = document.is_some(), "Memory store LOAD");
        Ok(document)
    }

    async fn save(&self, user: &str, writer: &str, document: &UserDocument) -> Result<()> {
        let mut documents = self.inner.lock().await;
        documents.insert(user.to_string(), document.clone());
        drop(documents);
        debug!(user, writer, "Memory store SAVE");

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
