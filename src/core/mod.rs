//! Core business logic abstractions

pub mod account;
pub mod analytics;
pub mod config;
pub mod currency;
pub mod document;
pub mod log;
pub mod session;
pub mod state;

// Re-export main types for cleaner imports
pub use account::{Account, AccountError, MonthKey, MonthlyEntry};
pub use analytics::{WealthOverview, WealthSnapshotRow, aggregate};
pub use currency::{Currency, RateTable, RateTableProvider};
pub use document::{AccountStore, UserDocument};
pub use state::{AppState, Overview, RatesStatus};
