//! Account command - open accounts and check balances

use anyhow::Result;
use bankline_core::api;
use clap::Subcommand;
use colored::Colorize;

use super::{api_error, auth_header, get_context};
use crate::output;

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new account with a zero balance
    Open {
        #[arg(long)]
        json: bool,
    },
    /// List your accounts
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show the balance of an account you own
    Balance {
        account_number: String,
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: AccountCommands) -> Result<()> {
    let ctx = get_context()?;
    let auth = auth_header()?;

    match command {
        AccountCommands::Open { json } => {
            let account = api::create_account(&ctx, auth.as_deref())
                .map_err(api_error)?
                .body;
            if json {
                return output::json(&account);
            }
            output::success(&format!("Opened account {}", account.account_number));
        }
        AccountCommands::List { json } => {
            let accounts = api::list_accounts(&ctx, auth.as_deref())
                .map_err(api_error)?
                .body;
            if json {
                return output::json(&accounts);
            }
            if accounts.is_empty() {
                println!("No accounts yet. Open one with `bl account open`.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["Account", "Balance", "Opened"]);
            for account in accounts {
                table.add_row(vec![
                    account.account_number,
                    account.balance,
                    account.created_at.format("%Y-%m-%d").to_string(),
                ]);
            }
            println!("{}", table);
        }
        AccountCommands::Balance { account_number, json } => {
            let view = api::get_balance(&ctx, auth.as_deref(), &account_number)
                .map_err(api_error)?
                .body;
            if json {
                return output::json(&view);
            }
            println!("{}: {}", view.account_number, view.balance.bold());
        }
    }

    Ok(())
}
