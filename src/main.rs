use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use wealthboard::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    /// Load and save data for this user instead of the configured one
    #[arg(short, long, global = true)]
    user: Option<String>,

    /// Keep data in memory only; nothing is read from or written to disk
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Display consolidated wealth per month in the base currency
    Overview,
    /// List accounts
    Accounts,
    /// Add an account
    AddAccount {
        name: String,
        /// One of USD, EUR, GBP, JPY, INR
        #[arg(long, default_value = "USD")]
        currency: String,
    },
    /// Remove an account and all its data
    RemoveAccount { name: String },
    /// Add or update the balances of one month
    Record {
        account: String,
        /// Month in YYYY-MM form
        #[arg(long)]
        month: String,
        #[arg(long, allow_hyphen_values = true)]
        opening: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        ending: Option<String>,
    },
    /// Display monthly ending balance and change of one account
    Details { account: String },
    /// Set the currency totals are converted into
    BaseCurrency { currency: String },
}

impl From<Commands> for wealthboard::AppCommand {
    fn from(cmd: Commands) -> wealthboard::AppCommand {
        match cmd {
            Commands::Overview => wealthboard::AppCommand::Overview,
            Commands::Accounts => wealthboard::AppCommand::Accounts,
            Commands::AddAccount { name, currency } => {
                wealthboard::AppCommand::AddAccount { name, currency }
            }
            Commands::RemoveAccount { name } => wealthboard::AppCommand::RemoveAccount { name },
            Commands::Record {
                account,
                month,
                opening,
                ending,
            } => wealthboard::AppCommand::Record {
                account,
                month,
                opening,
                ending,
            },
            Commands::Details { account } => wealthboard::AppCommand::Details { account },
            Commands::BaseCurrency { currency } => {
                wealthboard::AppCommand::BaseCurrency { currency }
            }
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let options = wealthboard::RunOptions {
        config_path: cli.config_path.as_deref(),
        user: cli.user.as_deref(),
        ephemeral: cli.ephemeral,
    };
    let result = match cli.command {
        Some(Commands::Setup) => wealthboard::cli::setup::setup(),
        Some(cmd) => wealthboard::run_command(cmd.into(), options).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
