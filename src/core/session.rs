//! Serializes state changes from independent sources through a single queue.
//!
//! Local mutations, remote document pushes and the rate fetch all enqueue events on one
//! channel; the session loop applies them strictly in arrival order. Remote documents
//! replace local accounts wholesale: the last write wins and no conflict detection is
//! attempted. Persistence runs as a separate subscriber of published states.

use crate::core::account::{AccountError, AccountResult, MonthlyEntry};
use crate::core::currency::{Currency, RateTableProvider};
use crate::core::document::{AccountStore, UserDocument};
use crate::core::state::{AppState, RatesStatus};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    AddAccount { name: String, currency: Currency },
    RemoveAccount { name: String },
    BeginEdit { name: String },
    EndEdit,
    UpsertEntry { account: String, entry: MonthlyEntry },
    SetBaseCurrency(Currency),
}

impl Mutation {
    fn apply(&self, state: &AppState) -> AccountResult<AppState> {
        match self {
            Mutation::AddAccount { name, currency } => state.add_account(name, *currency),
            Mutation::RemoveAccount { name } => state.remove_account(name),
            Mutation::BeginEdit { name } => state.begin_edit(name),
            Mutation::EndEdit => Ok(state.end_edit()),
            Mutation::UpsertEntry { account, entry } => state.upsert_entry(account, entry.clone()),
            Mutation::SetBaseCurrency(currency) => Ok(state.set_base_currency(*currency)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    Initial,
    Local,
    Remote,
    Rates,
}

/// A state published by the session loop.
#[derive(Debug, Clone)]
pub struct Published {
    pub state: Arc<AppState>,
    pub origin: ChangeOrigin,
    /// Number of local mutations applied so far.
    pub local_revision: u64,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error(transparent)]
    Rejected(#[from] AccountError),

    #[error("Session has shut down")]
    Closed,
}

enum StateEvent {
    Local(Mutation, oneshot::Sender<AccountResult<Arc<AppState>>>),
    Remote(UserDocument),
    Rates(RatesStatus),
}

fn next_session_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    format!(
        "{}-{}-{}",
        std::process::id(),
        chrono::Utc::now().timestamp_millis(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

#[derive(Clone)]
pub struct SessionHandle {
    id: Arc<str>,
    events: mpsc::UnboundedSender<StateEvent>,
    published: watch::Receiver<Published>,
}

struct WeakSessionHandle {
    id: Arc<str>,
    events: mpsc::WeakUnboundedSender<StateEvent>,
    published: watch::Receiver<Published>,
}

impl WeakSessionHandle {
    fn upgrade(&self) -> Option<SessionHandle> {
        self.events.upgrade().map(|events| SessionHandle {
            id: Arc::clone(&self.id),
            events,
            published: self.published.clone(),
        })
    }
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Applies a local mutation and returns the resulting state.
    pub async fn submit(&self, mutation: Mutation) -> Result<Arc<AppState>, SessionError> {
        let (reply, response) = oneshot::channel();
        self.events
            .send(StateEvent::Local(mutation, reply))
            .map_err(|_| SessionError::Closed)?;
        let state = response.await.map_err(|_| SessionError::Closed)??;
        Ok(state)
    }

    pub fn push_remote(&self, document: UserDocument) -> Result<(), SessionError> {
        self.events
            .send(StateEvent::Remote(document))
            .map_err(|_| SessionError::Closed)
    }

    pub fn push_rates(&self, status: RatesStatus) -> Result<(), SessionError> {
        self.events
            .send(StateEvent::Rates(status))
            .map_err(|_| SessionError::Closed)
    }

    pub fn current(&self) -> Arc<AppState> {
        Arc::clone(&self.published.borrow().state)
    }

    pub fn subscribe(&self) -> watch::Receiver<Published> {
        self.published.clone()
    }

    /// Waits until the rate fetch has either succeeded or failed.
    pub async fn settled_rates(&self) -> Arc<AppState> {
        let mut published = self.published.clone();
        let settled = published
            .wait_for(|p| !matches!(p.state.rates, RatesStatus::Loading))
            .await
            .map(|p| Arc::clone(&p.state));
        match settled {
            Ok(state) => state,
            Err(_) => self.current(),
        }
    }

    fn downgrade(&self) -> WeakSessionHandle {
        WeakSessionHandle {
            id: Arc::clone(&self.id),
            events: self.events.downgrade(),
            published: self.published.clone(),
        }
    }
}

/// Owns the current state. Ends once every [`SessionHandle`] is dropped.
pub struct SessionLoop {
    state: Arc<AppState>,
    local_revision: u64,
    events: mpsc::UnboundedReceiver<StateEvent>,
    published: watch::Sender<Published>,
}

pub fn start(initial: AppState) -> (SessionHandle, SessionLoop) {
    let state = Arc::new(initial);
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (published_tx, published_rx) = watch::channel(Published {
        state: Arc::clone(&state),
        origin: ChangeOrigin::Initial,
        local_revision: 0,
    });

    let handle = SessionHandle {
        id: Arc::from(next_session_id()),
        events: events_tx,
        published: published_rx,
    };
    let session = SessionLoop {
        state,
        local_revision: 0,
        events: events_rx,
        published: published_tx,
    };
    (handle, session)
}

/// Starts the session loop on the runtime.
pub fn spawn(initial: AppState) -> (SessionHandle, JoinHandle<Arc<AppState>>) {
    let (handle, session) = start(initial);
    (handle, tokio::spawn(session.run()))
}

impl SessionLoop {
    pub async fn run(mut self) -> Arc<AppState> {
        while let Some(event) = self.events.recv().await {
            self.handle(event);
        }
        debug!("Session loop finished");
        self.state
    }

    fn handle(&mut self, event: StateEvent) {
        match event {
            StateEvent::Local(mutation, reply) => match mutation.apply(&self.state) {
                Ok(next) => {
                    debug!(?mutation, "Applied local mutation");
                    self.local_revision += 1;
                    self.publish(next, ChangeOrigin::Local);
                    let _ = reply.send(Ok(Arc::clone(&self.state)));
                }
                Err(e) => {
                    debug!(?mutation, error = %e, "Rejected local mutation");
                    let _ = reply.send(Err(e));
                }
            },
            StateEvent::Remote(document) => match document.decode() {
                Ok((accounts, base)) => {
                    debug!(accounts = accounts.len(), "Applying remote document");
                    let next = self.state.with_remote(accounts, base);
                    self.publish(next, ChangeOrigin::Remote);
                }
                Err(e) => warn!(error = %e, "Ignoring undecodable remote document"),
            },
            StateEvent::Rates(status) => {
                let next = self.state.with_rates(status);
                self.publish(next, ChangeOrigin::Rates);
            }
        }
    }

    fn publish(&mut self, next: AppState, origin: ChangeOrigin) {
        self.state = Arc::new(next);
        self.published.send_replace(Published {
            state: Arc::clone(&self.state),
            origin,
            local_revision: self.local_revision,
        });
    }
}

/// Mirrors locally changed states to the store. Writes are fire-and-forget: a failed
/// write is logged and dropped.
pub fn spawn_persistence(
    store: Arc<dyn AccountStore>,
    user: String,
    handle: &SessionHandle,
) -> JoinHandle<()> {
    let writer = handle.id().to_string();
    let mut published = handle.subscribe();
    // Read before spawning: a mutation applied ahead of the first poll must still be saved
    let mut saved_revision = published.borrow_and_update().local_revision;
    tokio::spawn(async move {
        while published.changed().await.is_ok() {
            let snapshot = published.borrow_and_update().clone();
            if snapshot.local_revision == saved_revision {
                continue;
            }
            saved_revision = snapshot.local_revision;

            let state = &snapshot.state;
            let result = match UserDocument::encode(&state.accounts, state.base_currency) {
                Ok(document) => store.save(&user, &writer, &document).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => debug!(user, revision = saved_revision, "Saved wealth data"),
                Err(e) => warn!(user, error = %e, "Failed to save wealth data, change dropped"),
            }
        }
        debug!("Persistence subscriber finished");
    })
}

/// Feeds store changes for `user` written by other sessions into the session queue.
pub fn spawn_remote_feed(
    store: &dyn AccountStore,
    user: String,
    handle: &SessionHandle,
) -> JoinHandle<()> {
    let mut changes = store.subscribe();
    let weak = handle.downgrade();
    let mut published = handle.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                change = changes.recv() => match change {
                    Ok(change) => {
                        if change.user != user || *change.writer == *weak.id {
                            continue;
                        }
                        let Some(handle) = weak.upgrade() else { break };
                        if handle.push_remote(change.document).is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Remote feed lagged behind store changes");
                    }
                    Err(RecvError::Closed) => break,
                },
                closed = published.changed() => {
                    if closed.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("Remote feed finished");
    })
}

/// Fetches the rate table once and hands the outcome to the session.
pub fn spawn_rate_fetch(
    provider: Arc<dyn RateTableProvider>,
    handle: SessionHandle,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let status = match provider.get_rates().await {
            Ok(table) => {
                info!("Exchange rates loaded");
                RatesStatus::Ready(table)
            }
            Err(e) => {
                error!(error = %e, "Failed to fetch exchange rates");
                RatesStatus::Unavailable(e.to_string())
            }
        };
        if handle.push_rates(status).is_err() {
            debug!("Session closed before exchange rates arrived");
        }
    })
}
