//! Consolidates accounts held in different currencies into a month-by-month
//! net worth breakdown in a single base currency.
use crate::core::account::{Account, MonthKey};
use crate::core::currency::{Currency, RateTable};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeSet;
use tracing::debug;

/// One month of the consolidated view. `values` follows account-list order.
#[derive(Debug, Clone, PartialEq)]
pub struct WealthSnapshotRow {
    pub month: MonthKey,
    pub values: Vec<(String, f64)>,
    pub total: f64,
}

impl WealthSnapshotRow {
    pub fn value(&self, account: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(name, _)| name == account)
            .map(|(_, v)| *v)
    }
}

/// Flattens to `{"month": .., "<account>": .., "total": ..}`, the shape a chart consumes.
impl Serialize for WealthSnapshotRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len() + 2))?;
        map.serialize_entry("month", self.month.as_str())?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        map.serialize_entry("total", &self.total)?;
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WealthOverview {
    pub base_currency: Currency,
    /// Account names in stacking order.
    pub accounts: Vec<String>,
    pub rows: Vec<WealthSnapshotRow>,
    /// Rate pairs that were absent from the table and converted at 1.0.
    pub missing_rates: BTreeSet<(Currency, Currency)>,
}

impl WealthOverview {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.accounts.is_empty()
    }

    pub fn latest_total(&self) -> Option<f64> {
        self.rows.last().map(|r| r.total)
    }
}

/// Builds the consolidated month-by-month view.
///
/// Produces one row per distinct month present in any account, ascending. An account
/// without an entry for a month contributes exactly 0 to that row. An account whose
/// `currency -> base` rate is missing from `rates` is converted with a factor of 1.0
/// and the pair is reported in [`WealthOverview::missing_rates`]. Never fails and never
/// mutates its inputs.
pub fn aggregate(accounts: &[Account], base: Currency, rates: &RateTable) -> WealthOverview {
    let months: BTreeSet<&MonthKey> = accounts
        .iter()
        .flat_map(|a| a.monthly_data.iter().map(|e| &e.month))
        .collect();

    let mut missing_rates = BTreeSet::new();
    let factors: Vec<f64> = accounts
        .iter()
        .map(|account| match rates.rate(account.currency, base) {
            Some(rate) => rate,
            None => {
                if !account.monthly_data.is_empty() {
                    debug!(
                        "No rate for {} -> {}, converting {} at 1.0",
                        account.currency, base, account.name
                    );
                    missing_rates.insert((account.currency, base));
                }
                1.0
            }
        })
        .collect();

    let rows = months
        .into_iter()
        .map(|month| {
            let values: Vec<(String, f64)> = accounts
                .iter()
                .zip(&factors)
                .map(|(account, factor)| {
                    let converted = account
                        .entry(month)
                        .map_or(0.0, |entry| entry.ending * factor);
                    (account.name.clone(), converted)
                })
                .collect();
            let total = values.iter().map(|(_, v)| v).sum();
            WealthSnapshotRow {
                month: month.clone(),
                values,
                total,
            }
        })
        .collect();

    WealthOverview {
        base_currency: base,
        accounts: accounts.iter().map(|a| a.name.clone()).collect(),
        rows,
        missing_rates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::account::MonthlyEntry;

    fn month(s: &str) -> MonthKey {
        s.parse().unwrap()
    }

    fn account(name: &str, currency: Currency, entries: &[(&str, f64)]) -> Account {
        entries
            .iter()
            .fold(Account::new(name, currency), |acc, (m, ending)| {
                acc.upsert_entry(MonthlyEntry::new(month(m), 0.0, *ending))
            })
    }

    fn sample_rates() -> RateTable {
        let mut rates = RateTable::new().with_identity();
        rates.insert(Currency::Eur, Currency::Usd, 1.09);
        rates.insert(Currency::Gbp, Currency::Usd, 1.27);
        rates.insert(Currency::Usd, Currency::Eur, 0.92);
        rates
    }

    #[test]
    fn test_single_account_same_currency() {
        let accounts = vec![Account::new("A", Currency::Usd)
            .upsert_entry(MonthlyEntry::new(month("2024-01"), 100.0, 200.0))];

        let overview = aggregate(&accounts, Currency::Usd, &sample_rates());
        assert_eq!(overview.rows.len(), 1);
        let row = &overview.rows[0];
        assert_eq!(row.month, month("2024-01"));
        assert_eq!(row.value("A"), Some(200.0));
        assert_eq!(row.total, 200.0);
        assert!(overview.missing_rates.is_empty());

        let json = serde_json::to_value(row).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"month": "2024-01", "A": 200.0, "total": 200.0})
        );
    }

    #[test]
    fn test_converts_to_base_currency() {
        let accounts = vec![account("A", Currency::Eur, &[("2024-01", 100.0)])];

        let overview = aggregate(&accounts, Currency::Usd, &sample_rates());
        let row = &overview.rows[0];
        assert!((row.value("A").unwrap() - 109.0).abs() < 1e-9);
        assert!((row.total - 109.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_month_contributes_zero() {
        let accounts = vec![
            account("A", Currency::Usd, &[("2024-01", 100.0), ("2024-02", 150.0)]),
            account("B", Currency::Usd, &[("2024-02", 50.0)]),
        ];

        let overview = aggregate(&accounts, Currency::Usd, &sample_rates());
        assert_eq!(overview.rows.len(), 2);
        assert_eq!(overview.rows[0].value("B"), Some(0.0));
        assert_eq!(overview.rows[0].total, 100.0);
        assert_eq!(overview.rows[1].total, 200.0);
    }

    #[test]
    fn test_missing_rate_falls_back_to_one() {
        let accounts = vec![account("Yen", Currency::Jpy, &[("2024-01", 1000.0)])];

        let overview = aggregate(&accounts, Currency::Usd, &sample_rates());
        assert_eq!(overview.rows[0].value("Yen"), Some(1000.0));
        assert_eq!(
            overview.missing_rates,
            BTreeSet::from([(Currency::Jpy, Currency::Usd)])
        );
    }

    #[test]
    fn test_rows_sorted_unique_and_totals_consistent() {
        let accounts = vec![
            account("A", Currency::Gbp, &[("2024-03", 10.0), ("2023-12", 5.0)]),
            account("B", Currency::Eur, &[("2024-03", 20.0), ("2024-01", 7.0)]),
            account("C", Currency::Usd, &[]),
        ];

        let overview = aggregate(&accounts, Currency::Usd, &sample_rates());
        let months: Vec<&str> = overview.rows.iter().map(|r| r.month.as_str()).collect();
        assert_eq!(months, vec!["2023-12", "2024-01", "2024-03"]);
        assert_eq!(overview.accounts, vec!["A", "B", "C"]);

        for row in &overview.rows {
            let names: Vec<&str> = row.values.iter().map(|(n, _)| n.as_str()).collect();
            assert_eq!(names, vec!["A", "B", "C"]);
            let sum: f64 = row.values.iter().map(|(_, v)| v).sum();
            assert!((row.total - sum).abs() < 1e-9);
        }
        assert!((overview.latest_total().unwrap() - (12.7 + 21.8)).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_is_idempotent_and_pure() {
        let accounts = vec![
            account("A", Currency::Eur, &[("2024-01", 100.0)]),
            account("B", Currency::Usd, &[("2024-02", 30.0)]),
        ];
        let rates = sample_rates();
        let before = accounts.clone();

        let first = aggregate(&accounts, Currency::Eur, &rates);
        let second = aggregate(&accounts, Currency::Eur, &rates);
        assert_eq!(first, second);
        assert_eq!(accounts, before);
        assert_eq!(rates, sample_rates());
    }

    #[test]
    fn test_no_accounts_or_data() {
        let overview = aggregate(&[], Currency::Usd, &sample_rates());
        assert!(overview.is_empty());
        assert_eq!(overview.latest_total(), None);

        let accounts = vec![Account::new("Empty", Currency::Usd)];
        let overview = aggregate(&accounts, Currency::Usd, &sample_rates());
        assert!(overview.rows.is_empty());
        assert!(overview.is_empty());
    }
}
