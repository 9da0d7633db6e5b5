//! Deposit, withdraw and transfer commands

use anyhow::Result;
use bankline_core::api::{self, AmountRequest, TransferRequest};
use bankline_core::services::Movement;
use colored::Colorize;

use super::{api_error, auth_header, get_context, parse_amount};
use crate::output;

fn print_movement(verb: &str, movement: &Movement) {
    output::success(&format!(
        "{} {} ({})",
        verb, movement.transaction.amount, movement.transaction.account_number
    ));
    println!("  New balance: {}", movement.balance.balance.bold());
}

pub fn deposit(account_number: String, amount: &str, json: bool) -> Result<()> {
    let amount = parse_amount(amount)?;
    let ctx = get_context()?;
    let request = AmountRequest {
        account_number,
        amount,
    };
    let movement = api::deposit(&ctx, auth_header()?.as_deref(), &request)
        .map_err(api_error)?
        .body;

    if json {
        return output::json(&movement);
    }
    print_movement("Deposited", &movement);
    Ok(())
}

pub fn withdraw(account_number: String, amount: &str, json: bool) -> Result<()> {
    let amount = parse_amount(amount)?;
    let ctx = get_context()?;
    let request = AmountRequest {
        account_number,
        amount,
    };
    let movement = api::withdraw(&ctx, auth_header()?.as_deref(), &request)
        .map_err(api_error)?
        .body;

    if json {
        return output::json(&movement);
    }
    print_movement("Withdrew", &movement);
    Ok(())
}

pub fn transfer(from: String, to: String, amount: &str, json: bool) -> Result<()> {
    let amount = parse_amount(amount)?;
    let ctx = get_context()?;
    let request = TransferRequest {
        from_account_number: from,
        to_account_number: to,
        amount,
    };
    let receipt = api::transfer(&ctx, auth_header()?.as_deref(), &request)
        .map_err(api_error)?
        .body;

    if json {
        return output::json(&receipt);
    }
    output::success(&format!(
        "Transferred {} from {} to {}",
        receipt.from.amount, receipt.from.account_number, receipt.to.account_number
    ));
    println!("  Transfer id: {}", receipt.transfer_id.to_string().dimmed());
    Ok(())
}
