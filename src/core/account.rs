//! Accounts, their monthly balance entries and the rules that keep them consistent.

use crate::core::currency::Currency;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AccountError {
    #[error("Account name cannot be empty.")]
    EmptyName,

    #[error("An account with this name already exists: {0}")]
    DuplicateName(String),

    #[error("Please fill in both opening and ending balances: {0}")]
    Validation(String),

    #[error("No account named {0}")]
    UnknownAccount(String),

    #[error("Account name is reserved: {0}")]
    ReservedName(String),
}

/// Keys used by the flattened overview rows; an account cannot share them.
pub const RESERVED_NAMES: [&str; 2] = ["month", "total"];

pub type AccountResult<T> = Result<T, AccountError>;

/// A `YYYY-MM` period key. String order is chronological order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey(String);

impl MonthKey {
    pub fn from_parts(year: i32, month: u32) -> AccountResult<Self> {
        format!("{year:04}-{month:02}").parse()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&format!("{}-01", self.0), "%Y-%m-%d").ok()
    }

    /// Short axis label, e.g. `Jan '24`.
    pub fn label(&self) -> String {
        self.first_day()
            .map(|d| d.format("%b '%y").to_string())
            .unwrap_or_else(|| self.0.clone())
    }
}

impl FromStr for MonthKey {
    type Err = AccountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let bytes = s.as_bytes();
        let shaped = bytes.len() == 7
            && bytes[4] == b'-'
            && bytes[..4].iter().chain(&bytes[5..]).all(u8::is_ascii_digit);
        let key = MonthKey(s.to_string());
        if !shaped || key.first_day().is_none() {
            return Err(AccountError::Validation(format!(
                "month must be in YYYY-MM form, got '{s}'"
            )));
        }
        Ok(key)
    }
}

impl TryFrom<String> for MonthKey {
    type Error = AccountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MonthKey> for String {
    fn from(value: MonthKey) -> Self {
        value.0
    }
}

impl Display for MonthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parses a user supplied balance. Missing, blank or non-numeric input is rejected.
pub fn parse_balance(label: &str, raw: Option<&str>) -> AccountResult<f64> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(AccountError::Validation(format!("{label} balance is missing")));
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(AccountError::Validation(format!(
            "{label} balance '{raw}' is not a number"
        ))),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyEntry {
    pub month: MonthKey,
    pub opening: f64,
    pub ending: f64,
}

impl MonthlyEntry {
    pub fn new(month: MonthKey, opening: f64, ending: f64) -> Self {
        Self {
            month,
            opening,
            ending,
        }
    }

    /// Validates raw form input into an entry.
    pub fn from_input(
        month: &str,
        opening: Option<&str>,
        ending: Option<&str>,
    ) -> AccountResult<Self> {
        let opening = parse_balance("Opening", opening)?;
        let ending = parse_balance("Ending", ending)?;
        Ok(Self::new(month.parse()?, opening, ending))
    }

    pub fn change(&self) -> f64 {
        self.ending - self.opening
    }
}

/// One point of an account's own performance series, in the account currency.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyPerformance {
    pub month: MonthKey,
    pub ending: f64,
    pub change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    pub currency: Currency,
    /// Sorted ascending by month, at most one entry per month.
    pub monthly_data: Vec<MonthlyEntry>,
}

impl Account {
    pub fn new(name: &str, currency: Currency) -> Self {
        Self {
            name: name.to_string(),
            currency,
            monthly_data: Vec::new(),
        }
    }

    pub fn entry(&self, month: &MonthKey) -> Option<&MonthlyEntry> {
        self.monthly_data.iter().find(|e| &e.month == month)
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.trim().to_lowercase()
    }

    pub fn latest(&self) -> Option<&MonthlyEntry> {
        self.monthly_data.last()
    }

    /// Returns a copy with `entry` replacing the same month, or inserted if the month is new.
    pub fn upsert_entry(&self, entry: MonthlyEntry) -> Account {
        let mut monthly_data = self.monthly_data.clone();
        match monthly_data.iter_mut().find(|e| e.month == entry.month) {
            Some(existing) => *existing = entry,
            None => monthly_data.push(entry),
        }
        monthly_data.sort_by(|a, b| a.month.cmp(&b.month));

        Account {
            monthly_data,
            ..self.clone()
        }
    }

    pub fn performance(&self) -> Vec<MonthlyPerformance> {
        self.monthly_data
            .iter()
            .map(|e| MonthlyPerformance {
                month: e.month.clone(),
                ending: e.ending,
                change: e.change(),
            })
            .collect()
    }
}

/// Validates a new account name against the existing set and returns the trimmed name.
pub fn validate_new_name(accounts: &[Account], name: &str) -> AccountResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AccountError::EmptyName);
    }
    if RESERVED_NAMES.iter().any(|r| r.eq_ignore_ascii_case(trimmed)) {
        return Err(AccountError::ReservedName(trimmed.to_string()));
    }
    if accounts.iter().any(|a| a.matches_name(trimmed)) {
        return Err(AccountError::DuplicateName(trimmed.to_string()));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(s: &str) -> MonthKey {
        s.parse().unwrap()
    }

    #[test]
    fn test_month_key_parsing() {
        assert_eq!(month("2024-01").as_str(), "2024-01");
        assert_eq!(MonthKey::from_parts(2024, 3).unwrap(), month("2024-03"));

        for bad in [
            "2024-13", "2024-1", "24-01", "2024/01", "", "2024-01-01", "+2024-1", "-999-01",
            "+999-01", "2024-00", "20a4-01",
        ] {
            assert!(
                matches!(bad.parse::<MonthKey>(), Err(AccountError::Validation(_))),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_month_key_order_and_label() {
        assert!(month("2023-12") < month("2024-01"));
        assert!(month("2024-02") < month("2024-10"));
        assert_eq!(month("2024-01").label(), "Jan '24");
        assert_eq!(month("1999-12").label(), "Dec '99");
    }

    #[test]
    fn test_parse_balance() {
        assert_eq!(parse_balance("Opening", Some(" 50000 ")).unwrap(), 50000.0);
        assert_eq!(parse_balance("Opening", Some("-12.5")).unwrap(), -12.5);
        assert!(matches!(
            parse_balance("Opening", None),
            Err(AccountError::Validation(_))
        ));
        assert!(matches!(
            parse_balance("Ending", Some("  ")),
            Err(AccountError::Validation(_))
        ));
        assert!(matches!(
            parse_balance("Ending", Some("abc")),
            Err(AccountError::Validation(_))
        ));
        assert!(matches!(
            parse_balance("Ending", Some("inf")),
            Err(AccountError::Validation(_))
        ));
    }

    #[test]
    fn test_entry_from_input_requires_both_balances() {
        let entry = MonthlyEntry::from_input("2024-05", Some("100"), Some("150")).unwrap();
        assert_eq!(entry.change(), 50.0);

        let err = MonthlyEntry::from_input("2024-05", Some("100"), None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Please fill in both opening and ending balances: Ending balance is missing"
        );
    }

    #[test]
    fn test_upsert_replaces_existing_month() {
        let account = Account::new("Vanguard", Currency::Usd)
            .upsert_entry(MonthlyEntry::new(month("2024-01"), 100.0, 200.0))
            .upsert_entry(MonthlyEntry::new(month("2024-02"), 200.0, 250.0));

        let updated = account.upsert_entry(MonthlyEntry::new(month("2024-01"), 110.0, 210.0));
        assert_eq!(updated.monthly_data.len(), 2);
        assert_eq!(updated.entry(&month("2024-01")).unwrap().ending, 210.0);
        // The original is left untouched
        assert_eq!(account.entry(&month("2024-01")).unwrap().ending, 200.0);
    }

    #[test]
    fn test_upsert_new_month_keeps_order() {
        let account = Account::new("eToro", Currency::Eur)
            .upsert_entry(MonthlyEntry::new(month("2024-03"), 1.0, 2.0))
            .upsert_entry(MonthlyEntry::new(month("2023-11"), 1.0, 2.0));

        let updated = account.upsert_entry(MonthlyEntry::new(month("2024-01"), 1.0, 2.0));
        assert_eq!(updated.monthly_data.len(), account.monthly_data.len() + 1);
        let months: Vec<&str> = updated.monthly_data.iter().map(|e| e.month.as_str()).collect();
        assert_eq!(months, vec!["2023-11", "2024-01", "2024-03"]);
    }

    #[test]
    fn test_performance_series() {
        let account = Account::new("Savings", Currency::Inr)
            .upsert_entry(MonthlyEntry::new(month("2024-02"), 500.0, 450.0))
            .upsert_entry(MonthlyEntry::new(month("2024-01"), 100.0, 500.0));

        let perf = account.performance();
        assert_eq!(perf.len(), 2);
        assert_eq!(perf[0].month, month("2024-01"));
        assert_eq!(perf[0].change, 400.0);
        assert_eq!(perf[1].ending, 450.0);
        assert_eq!(perf[1].change, -50.0);
        assert_eq!(account.latest().unwrap().month, month("2024-02"));
    }

    #[test]
    fn test_validate_new_name() {
        let accounts = vec![Account::new("vanguard", Currency::Usd)];

        assert_eq!(
            validate_new_name(&accounts, "Vanguard"),
            Err(AccountError::DuplicateName("Vanguard".to_string()))
        );
        assert_eq!(
            validate_new_name(&accounts, "  VANGUARD "),
            Err(AccountError::DuplicateName("VANGUARD".to_string()))
        );
        assert_eq!(validate_new_name(&accounts, "   "), Err(AccountError::EmptyName));
        assert_eq!(
            validate_new_name(&accounts, " Total "),
            Err(AccountError::ReservedName("Total".to_string()))
        );
        assert_eq!(
            validate_new_name(&accounts, "month"),
            Err(AccountError::ReservedName("month".to_string()))
        );
        assert_eq!(
            validate_new_name(&accounts, "  eToro  ").unwrap(),
            "eToro".to_string()
        );
    }
}
