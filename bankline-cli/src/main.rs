//! Bankline CLI - a small ledger in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{account, doctor, history, logs, money, status, user};

/// Bankline - accounts, deposits and transfers from the terminal
#[derive(Parser)]
#[command(name = "bl", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register, log in and manage sessions
    User {
        #[command(subcommand)]
        command: user::UserCommands,
    },

    /// Open and inspect accounts
    Account {
        #[command(subcommand)]
        command: account::AccountCommands,
    },

    /// Deposit money into an account
    Deposit {
        account_number: String,
        /// Amount with at most two decimals, e.g. 12.50
        amount: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Withdraw money from an account you own
    Withdraw {
        account_number: String,
        amount: String,
        #[arg(long)]
        json: bool,
    },

    /// Transfer money between accounts
    Transfer {
        /// Source account (must be yours)
        from: String,
        /// Destination account
        to: String,
        amount: String,
        #[arg(long)]
        json: bool,
    },

    /// Show transaction history, newest first
    History {
        /// Only this account
        #[arg(long, short)]
        account: Option<String>,
        /// Maximum number of entries
        #[arg(long, short, default_value = "50")]
        limit: usize,
        #[arg(long)]
        json: bool,
    },

    /// Show ledger summary
    Status {
        #[arg(long)]
        json: bool,
    },

    /// Verify balances against the transaction log
    Doctor {
        /// Show verbose output
        #[arg(long, short)]
        verbose: bool,
        #[arg(long)]
        json: bool,
    },

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::User { command } => user::run(command),
        Commands::Account { command } => account::run(command),
        Commands::Deposit {
            account_number,
            amount,
            json,
        } => money::deposit(account_number, &amount, json),
        Commands::Withdraw {
            account_number,
            amount,
            json,
        } => money::withdraw(account_number, &amount, json),
        Commands::Transfer {
            from,
            to,
            amount,
            json,
        } => money::transfer(from, to, &amount, json),
        Commands::History {
            account,
            limit,
            json,
        } => history::run(account, limit, json),
        Commands::Status { json } => status::run(json),
        Commands::Doctor { verbose, json } => doctor::run(verbose, json),
        Commands::Logs { command } => logs::run(command),
    }
}
