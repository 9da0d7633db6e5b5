//! Status command - ledger summary

use anyhow::Result;
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};

use super::{get_context, load_session};

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let status = ctx.status_service.get_status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "Ledger Status".bold());
    println!();

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.add_row(vec!["Users", &status.total_users.to_string()]);
    table.add_row(vec!["Accounts", &status.total_accounts.to_string()]);
    table.add_row(vec!["Transactions", &status.total_transactions.to_string()]);
    table.add_row(vec!["Total holdings", &status.total_holdings]);
    println!("{}", table);
    println!();

    let range = &status.date_range;
    if let (Some(earliest), Some(latest)) = (&range.earliest, &range.latest) {
        println!("Activity: {} to {}", earliest, latest);
    }

    match load_session()? {
        Some(session) => println!("Logged in as {}", session.email.cyan()),
        None => println!("{}", "Not logged in".dimmed()),
    }

    Ok(())
}
