//! History command - show the transaction log

use anyhow::Result;
use bankline_core::api::{self, HistoryQuery};
use bankline_core::TransactionKind;
use comfy_table::{Cell, Color};

use super::{api_error, auth_header, get_context};
use crate::output;

pub fn run(account_number: Option<String>, limit: usize, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let query = HistoryQuery {
        account_number,
        limit: Some(limit),
    };
    let transactions = api::history(&ctx, auth_header()?.as_deref(), &query)
        .map_err(api_error)?
        .body;

    if json {
        return output::json(&transactions);
    }
    if transactions.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Time", "Account", "Kind", "Amount", "Counterparty"]);
    for tx in transactions {
        let amount = match tx.kind {
            TransactionKind::Deposit | TransactionKind::TransferIn => {
                Cell::new(format!("+{}", tx.amount)).fg(Color::Green)
            }
            TransactionKind::Withdrawal | TransactionKind::TransferOut => {
                Cell::new(format!("-{}", tx.amount)).fg(Color::Red)
            }
        };
        table.add_row(vec![
            Cell::new(tx.created_at.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(&tx.account_number),
            Cell::new(tx.kind),
            amount,
            Cell::new(tx.counterparty.as_deref().unwrap_or("")),
        ]);
    }
    println!("{}", table);
    Ok(())
}
