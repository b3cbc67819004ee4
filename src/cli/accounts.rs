use super::ui;
use crate::core::account::{Account, AccountError, MonthlyEntry};
use crate::core::currency::Currency;
use crate::core::session::{Mutation, SessionError, SessionHandle};
use crate::core::state::AppState;
use anyhow::{Context, Result};
use comfy_table::Cell;
use tracing::debug;

impl AppState {
    pub fn display_accounts(&self) -> String {
        let mut output = format!(
            "{}\n\n",
            ui::style_text("Your Accounts", ui::StyleType::Title)
        );
        if self.accounts.is_empty() {
            output.push_str("No accounts added yet.");
            return output;
        }

        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Account"),
            ui::header_cell("Currency"),
            ui::header_cell("Months"),
            ui::header_cell("Latest Ending"),
        ]);
        for account in &self.accounts {
            let latest = account
                .latest()
                .map_or_else(|| Cell::new("N/A"), |e| ui::money_cell(e.ending, account.currency));
            table.add_row(vec![
                Cell::new(&account.name),
                Cell::new(account.currency.code()),
                Cell::new(account.monthly_data.len()),
                latest,
            ]);
        }
        output.push_str(&table.to_string());
        output.push_str(&format!(
            "\n\nBase currency: {}",
            ui::style_text(self.base_currency.code(), ui::StyleType::TotalLabel)
        ));
        output
    }
}

impl Account {
    pub fn display_details(&self) -> String {
        let mut output = format!(
            "{}\n\n",
            ui::style_text(
                &format!("Performance for {}", self.name),
                ui::StyleType::Title
            )
        );
        if self.monthly_data.is_empty() {
            output.push_str(
                "Record monthly data for this account to see its performance here.",
            );
            return output;
        }

        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Month"),
            ui::header_cell("Opening"),
            ui::header_cell("Ending Balance"),
            ui::header_cell("Change"),
        ]);
        for (entry, perf) in self.monthly_data.iter().zip(self.performance()) {
            table.add_row(vec![
                Cell::new(perf.month.label()),
                ui::money_cell(entry.opening, self.currency),
                ui::money_cell(perf.ending, self.currency),
                ui::change_cell(perf.change, self.currency),
            ]);
        }
        output.push_str(&table.to_string());
        output
    }
}

pub fn list(handle: &SessionHandle) -> Result<()> {
    println!("{}", handle.current().display_accounts());
    Ok(())
}

pub async fn add(handle: &SessionHandle, name: &str, currency: &str) -> Result<()> {
    let currency: Currency = currency.parse()?;
    let state = handle
        .submit(Mutation::AddAccount {
            name: name.to_string(),
            currency,
        })
        .await?;

    if let Some(account) = state.accounts.last() {
        println!("Added account {} ({})", account.name, account.currency);
    }
    Ok(())
}

pub async fn remove(handle: &SessionHandle, name: &str) -> Result<()> {
    handle
        .submit(Mutation::RemoveAccount {
            name: name.to_string(),
        })
        .await?;
    println!("Removed account {}", name.trim());
    Ok(())
}

/// Records one month through an edit session: begin, upsert, end.
pub async fn record(
    handle: &SessionHandle,
    account: &str,
    month: &str,
    opening: Option<&str>,
    ending: Option<&str>,
) -> Result<()> {
    let state = handle
        .submit(Mutation::BeginEdit {
            name: account.to_string(),
        })
        .await?;
    let editing = state
        .editing
        .clone()
        .context("Edit session did not start")?;

    let result = match MonthlyEntry::from_input(month, opening, ending) {
        Ok(entry) => {
            debug!(account = %editing, month = %entry.month, "Recording monthly entry");
            handle
                .submit(Mutation::UpsertEntry {
                    account: editing.clone(),
                    entry,
                })
                .await
        }
        Err(e) => Err(SessionError::Rejected(e)),
    };
    handle.submit(Mutation::EndEdit).await?;

    let state = result?;
    if let Some(updated) = state.account(&editing) {
        println!(
            "Recorded {} for {} ({} months)",
            month.trim(),
            updated.name,
            updated.monthly_data.len()
        );
    }
    Ok(())
}

pub fn details(handle: &SessionHandle, name: &str) -> Result<()> {
    let state = handle.current();
    let account = state
        .account(name)
        .ok_or_else(|| AccountError::UnknownAccount(name.trim().to_string()))?;
    println!("{}", account.display_details());
    Ok(())
}

pub async fn set_base_currency(handle: &SessionHandle, currency: &str) -> Result<()> {
    let currency: Currency = currency.parse()?;
    handle
        .submit(Mutation::SetBaseCurrency(currency))
        .await?;
    println!("Base currency set to {currency}");
    Ok(())
}
