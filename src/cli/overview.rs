use super::ui;
use crate::core::analytics::WealthOverview;
use crate::core::currency::RateTableProvider;
use crate::core::session::{self, SessionHandle};
use crate::core::state::Overview;
use anyhow::Result;
use comfy_table::Cell;
use std::sync::Arc;

impl WealthOverview {
    pub fn display_as_table(&self) -> String {
        let base = self.base_currency;

        let mut output = format!(
            "{}\n{}\n\n",
            ui::style_text("Wealth Overview", ui::StyleType::Title),
            ui::style_text(
                &format!("Consolidated wealth across all accounts, converted to {base}."),
                ui::StyleType::Subtle
            )
        );

        if self.is_empty() {
            output.push_str("Add some accounts and monthly data to see the overview here.");
            return output;
        }

        let mut table = ui::new_styled_table();
        let mut header = vec![ui::header_cell("Month")];
        header.extend(self.accounts.iter().map(|name| ui::header_cell(name)));
        header.push(ui::header_cell(&format!("Total ({base})")));
        table.set_header(header);

        for row in &self.rows {
            let mut cells = vec![Cell::new(row.month.label())];
            cells.extend(row.values.iter().map(|(_, v)| ui::money_cell(*v, base)));
            cells.push(ui::total_cell(row.total, base));
            table.add_row(cells);
        }
        output.push_str(&table.to_string());

        if let Some(latest) = self.latest_total() {
            output.push_str(&format!(
                "\n\nNet Worth ({}): {}",
                ui::style_text(base.code(), ui::StyleType::TotalLabel),
                ui::style_text(&ui::format_money(latest, base), ui::StyleType::TotalValue)
            ));
        }

        for (from, to) in &self.missing_rates {
            output.push_str(&format!(
                "\n{}",
                ui::style_text(
                    &format!("Warning: no exchange rate for {from} -> {to}, values shown unconverted."),
                    ui::StyleType::Warning
                )
            ));
        }

        output
    }
}

pub fn render(overview: &Overview) -> String {
    match overview {
        Overview::Loading => ui::style_text("Fetching exchange rates...", ui::StyleType::Subtle),
        Overview::Unavailable(reason) => ui::style_text(
            &format!("Exchange rates are unavailable: {reason}"),
            ui::StyleType::Error,
        ),
        Overview::Ready(overview) => overview.display_as_table(),
    }
}

/// Fetches rates behind a spinner and waits for the overview to settle.
pub async fn fetch(handle: &SessionHandle, provider: Arc<dyn RateTableProvider>) -> Overview {
    session::spawn_rate_fetch(provider, handle.clone());

    let pb = ui::new_spinner("Fetching exchange rates...");
    let state = handle.settled_rates().await;
    pb.finish_and_clear();
    state.overview()
}

pub async fn run(handle: &SessionHandle, provider: Arc<dyn RateTableProvider>) -> Result<()> {
    let overview = fetch(handle, provider).await;
    println!("{}", render(&overview));
    Ok(())
}
