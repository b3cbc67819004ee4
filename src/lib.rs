pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::config::AppConfig;
use crate::core::document::AccountStore;
use crate::core::session::{self, SessionHandle};
use crate::core::state::{AppState, Overview};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub enum AppCommand {
    Overview,
    Accounts,
    AddAccount {
        name: String,
        currency: String,
    },
    RemoveAccount {
        name: String,
    },
    Record {
        account: String,
        month: String,
        opening: Option<String>,
        ending: Option<String>,
    },
    Details {
        account: String,
    },
    BaseCurrency {
        currency: String,
    },
}

impl AppCommand {
    fn mutates(&self) -> bool {
        matches!(
            self,
            AppCommand::AddAccount { .. }
                | AppCommand::RemoveAccount { .. }
                | AppCommand::Record { .. }
                | AppCommand::BaseCurrency { .. }
        )
    }
}

#[derive(Debug, Default, Clone)]
pub struct RunOptions<'a> {
    pub config_path: Option<&'a str>,
    /// Overrides the configured user.
    pub user: Option<&'a str>,
    /// Keep all data in memory for this run.
    pub ephemeral: bool,
}

/// A running session wired to its store.
struct Workspace {
    handle: SessionHandle,
    session: JoinHandle<Arc<AppState>>,
    subscribers: Vec<JoinHandle<()>>,
    persistent: bool,
}

impl Workspace {
    async fn open(store: Arc<dyn AccountStore>, user: &str, config: &AppConfig) -> Self {
        let (initial, persistent) = match store.load(user).await {
            Ok(Some(document)) => match document.decode() {
                Ok((accounts, base)) => (AppState::new(accounts, base), true),
                Err(e) => {
                    error!(user, error = %e, "Stored wealth data is unreadable");
                    (AppState::new(Vec::new(), config.currency), false)
                }
            },
            Ok(None) => {
                info!(user, "No wealth data found for this user. Starting fresh.");
                (AppState::new(Vec::new(), config.currency), true)
            }
            Err(e) => {
                error!(user, error = %e, "Failed to load wealth data");
                (AppState::new(Vec::new(), config.currency), false)
            }
        };

        let (handle, session) = session::spawn(initial);
        let mut subscribers = vec![session::spawn_remote_feed(
            store.as_ref(),
            user.to_string(),
            &handle,
        )];
        // Never overwrite a document that could not be read
        if persistent {
            subscribers.push(session::spawn_persistence(
                Arc::clone(&store),
                user.to_string(),
                &handle,
            ));
        }

        Self {
            handle,
            session,
            subscribers,
            persistent,
        }
    }

    /// Stops the session and waits for pending writes to flush.
    async fn close(self) -> Result<Arc<AppState>> {
        drop(self.handle);
        let state = self.session.await.context("Session loop panicked")?;
        for subscriber in self.subscribers {
            subscriber.await.context("Session subscriber panicked")?;
        }
        debug!("Workspace closed");
        Ok(state)
    }
}

async fn open_workspace(options: &RunOptions<'_>) -> Result<(AppConfig, Workspace)> {
    let config = match options.config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");
    let user = options.user.unwrap_or(config.user.as_str()).to_string();

    let store = store::open_store(&config, options.ephemeral)?;
    let workspace = Workspace::open(store, &user, &config).await;
    Ok((config, workspace))
}

/// Loads the stored accounts, fetches rates and returns the consolidated overview.
pub async fn load_overview(options: RunOptions<'_>) -> Result<Overview> {
    let (config, workspace) = open_workspace(&options).await?;
    let result = match providers::from_config(&config) {
        Ok(provider) => Ok(cli::overview::fetch(&workspace.handle, provider).await),
        Err(e) => Err(e),
    };
    workspace.close().await?;
    result
}

pub async fn run_command(command: AppCommand, options: RunOptions<'_>) -> Result<()> {
    info!("Wealthboard starting...");

    let (config, workspace) = open_workspace(&options).await?;
    if command.mutates() && !workspace.persistent {
        warn!("Stored data is unavailable, changes will not be saved");
    }

    let handle = workspace.handle.clone();
    let result = match command {
        AppCommand::Overview => match providers::from_config(&config) {
            Ok(provider) => cli::overview::run(&handle, provider).await,
            Err(e) => Err(e),
        },
        AppCommand::Accounts => cli::accounts::list(&handle),
        AppCommand::AddAccount { name, currency } => {
            cli::accounts::add(&handle, &name, &currency).await
        }
        AppCommand::RemoveAccount { name } => cli::accounts::remove(&handle, &name).await,
        AppCommand::Record {
            account,
            month,
            opening,
            ending,
        } => {
            cli::accounts::record(
                &handle,
                &account,
                &month,
                opening.as_deref(),
                ending.as_deref(),
            )
            .await
        }
        AppCommand::Details { account } => cli::accounts::details(&handle, &account),
        AppCommand::BaseCurrency { currency } => {
            cli::accounts::set_base_currency(&handle, &currency).await
        }
    };
    drop(handle);

    workspace.close().await?;
    result
}
