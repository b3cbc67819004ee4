//! Immutable application state. Every change produces a new `AppState`.

use crate::core::account::{Account, AccountError, AccountResult, MonthlyEntry, validate_new_name};
use crate::core::analytics::{self, WealthOverview};
use crate::core::currency::{Currency, RateTable};

#[derive(Debug, Clone, PartialEq)]
pub enum RatesStatus {
    Loading,
    Ready(RateTable),
    Unavailable(String),
}

/// What the overview screen can show for a given state.
#[derive(Debug, Clone, PartialEq)]
pub enum Overview {
    Loading,
    Unavailable(String),
    Ready(WealthOverview),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub accounts: Vec<Account>,
    pub base_currency: Currency,
    pub rates: RatesStatus,
    /// Account whose monthly data is being edited, if any.
    pub editing: Option<String>,
}

impl AppState {
    pub fn new(accounts: Vec<Account>, base_currency: Currency) -> Self {
        Self {
            accounts,
            base_currency,
            rates: RatesStatus::Loading,
            editing: None,
        }
    }

    pub fn account(&self, name: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.matches_name(name))
    }

    fn require_account(&self, name: &str) -> AccountResult<&Account> {
        self.account(name)
            .ok_or_else(|| AccountError::UnknownAccount(name.trim().to_string()))
    }

    pub fn add_account(&self, name: &str, currency: Currency) -> AccountResult<AppState> {
        let name = validate_new_name(&self.accounts, name)?;
        let mut accounts = self.accounts.clone();
        accounts.push(Account::new(&name, currency));
        Ok(AppState {
            accounts,
            ..self.clone()
        })
    }

    pub fn remove_account(&self, name: &str) -> AccountResult<AppState> {
        let removed = self.require_account(name)?.name.clone();
        let accounts = self
            .accounts
            .iter()
            .filter(|a| a.name != removed)
            .cloned()
            .collect();
        let editing = self.editing.clone().filter(|e| *e != removed);
        Ok(AppState {
            accounts,
            editing,
            ..self.clone()
        })
    }

    pub fn begin_edit(&self, name: &str) -> AccountResult<AppState> {
        let name = self.require_account(name)?.name.clone();
        Ok(AppState {
            editing: Some(name),
            ..self.clone()
        })
    }

    pub fn end_edit(&self) -> AppState {
        AppState {
            editing: None,
            ..self.clone()
        }
    }

    pub fn upsert_entry(&self, name: &str, entry: MonthlyEntry) -> AccountResult<AppState> {
        let target = self.require_account(name)?.name.clone();
        let accounts = self
            .accounts
            .iter()
            .map(|a| {
                if a.name == target {
                    a.upsert_entry(entry.clone())
                } else {
                    a.clone()
                }
            })
            .collect();
        Ok(AppState {
            accounts,
            ..self.clone()
        })
    }

    pub fn set_base_currency(&self, currency: Currency) -> AppState {
        AppState {
            base_currency: currency,
            ..self.clone()
        }
    }

    /// Replaces the persisted part of the state with a remote copy. Remote wins.
    pub fn with_remote(&self, accounts: Vec<Account>, base_currency: Currency) -> AppState {
        let editing = self
            .editing
            .clone()
            .filter(|e| accounts.iter().any(|a| &a.name == e));
        AppState {
            accounts,
            base_currency,
            editing,
            ..self.clone()
        }
    }

    pub fn with_rates(&self, rates: RatesStatus) -> AppState {
        AppState {
            rates,
            ..self.clone()
        }
    }

    pub fn overview(&self) -> Overview {
        match &self.rates {
            RatesStatus::Loading => Overview::Loading,
            RatesStatus::Unavailable(reason) => Overview::Unavailable(reason.clone()),
            RatesStatus::Ready(table) => Overview::Ready(analytics::aggregate(
                &self.accounts,
                self.base_currency,
                table,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(month: &str, opening: f64, ending: f64) -> MonthlyEntry {
        MonthlyEntry::new(month.parse().unwrap(), opening, ending)
    }

    fn state_with(names: &[&str]) -> AppState {
        names
            .iter()
            .fold(AppState::new(Vec::new(), Currency::Usd), |s, n| {
                s.add_account(n, Currency::Usd).unwrap()
            })
    }

    #[test]
    fn test_add_account_trims_and_appends() {
        let state = state_with(&["Vanguard"]);
        let next = state.add_account("  eToro ", Currency::Eur).unwrap();

        assert_eq!(next.accounts.len(), 2);
        assert_eq!(next.accounts[1].name, "eToro");
        assert_eq!(next.accounts[1].currency, Currency::Eur);
        assert!(next.accounts[1].monthly_data.is_empty());
        assert_eq!(state.accounts.len(), 1);
    }

    #[test]
    fn test_add_duplicate_account_is_rejected() {
        let state = state_with(&["vanguard"]);

        let err = state.add_account("Vanguard", Currency::Usd).unwrap_err();
        assert_eq!(err, AccountError::DuplicateName("Vanguard".to_string()));
        assert_eq!(state.accounts.len(), 1);
        assert_eq!(state.accounts[0].name, "vanguard");

        assert_eq!(
            state.add_account(" ", Currency::Usd).unwrap_err(),
            AccountError::EmptyName
        );
    }

    #[test]
    fn test_remove_account_clears_edit_session() {
        let state = state_with(&["A", "B"]).begin_edit("b").unwrap();
        assert_eq!(state.editing.as_deref(), Some("B"));

        let other = state.remove_account("A").unwrap();
        assert_eq!(other.editing.as_deref(), Some("B"));

        let next = state.remove_account("B").unwrap();
        assert_eq!(next.accounts.len(), 1);
        assert_eq!(next.editing, None);

        assert_eq!(
            next.remove_account("missing").unwrap_err(),
            AccountError::UnknownAccount("missing".to_string())
        );
    }

    #[test]
    fn test_upsert_entry_targets_one_account() {
        let state = state_with(&["A", "B"]);
        let next = state
            .upsert_entry("a", entry("2024-02", 1.0, 2.0))
            .unwrap()
            .upsert_entry("A", entry("2024-01", 1.0, 3.0))
            .unwrap()
            .upsert_entry("A", entry("2024-02", 5.0, 6.0))
            .unwrap();

        let a = next.account("A").unwrap();
        assert_eq!(a.monthly_data.len(), 2);
        assert_eq!(a.monthly_data[0].month.as_str(), "2024-01");
        assert_eq!(a.monthly_data[1].ending, 6.0);
        assert!(next.account("B").unwrap().monthly_data.is_empty());

        assert!(matches!(
            state.upsert_entry("C", entry("2024-01", 1.0, 1.0)),
            Err(AccountError::UnknownAccount(_))
        ));
    }

    #[test]
    fn test_with_remote_replaces_accounts() {
        let state = state_with(&["A", "B"])
            .begin_edit("A")
            .unwrap()
            .with_rates(RatesStatus::Ready(RateTable::new()));

        let remote = vec![Account::new("B", Currency::Gbp)];
        let next = state.with_remote(remote.clone(), Currency::Eur);
        assert_eq!(next.accounts, remote);
        assert_eq!(next.base_currency, Currency::Eur);
        assert_eq!(next.editing, None);
        assert_eq!(next.rates, RatesStatus::Ready(RateTable::new()));
    }

    #[test]
    fn test_overview_follows_rate_status() {
        let state = state_with(&["A"])
            .upsert_entry("A", entry("2024-01", 100.0, 200.0))
            .unwrap();
        assert_eq!(state.overview(), Overview::Loading);

        let failed = state.with_rates(RatesStatus::Unavailable("boom".to_string()));
        assert_eq!(failed.overview(), Overview::Unavailable("boom".to_string()));

        let ready = state
            .with_rates(RatesStatus::Ready(RateTable::new().with_identity()))
            .set_base_currency(Currency::Usd);
        match ready.overview() {
            Overview::Ready(overview) => {
                assert_eq!(overview.rows.len(), 1);
                assert_eq!(overview.rows[0].total, 200.0);
            }
            other => panic!("Expected a ready overview, got {other:?}"),
        }
    }
}
