//! Doctor command - ledger health checks

use anyhow::Result;
use colored::Colorize;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use serde_json::Value;

use super::get_context;

/// Render a detail object as "key: value, key: value"
fn format_detail(value: &Value) -> String {
    match value {
        Value::Object(map) => map
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| match v {
                Value::String(s) => format!("{}: {}", k, s),
                other => format!("{}: {}", k, other),
            })
            .collect::<Vec<_>>()
            .join(", "),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn run(verbose: bool, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let result = ctx.doctor_service.run_checks()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", "Ledger Health Check".bold());
        println!();

        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["Check", "Status", "Message"]);

        for (name, check) in &result.checks {
            let status_cell = match check.status.as_str() {
                "pass" => Cell::new("PASS").fg(Color::Green),
                "warning" => Cell::new("WARN").fg(Color::Yellow),
                "error" => Cell::new("ERROR").fg(Color::Red),
                other => Cell::new(other),
            };
            table.add_row(vec![Cell::new(name), status_cell, Cell::new(&check.message)]);

            if verbose {
                for detail in check.details.iter().flatten() {
                    table.add_row(vec![
                        Cell::new(""),
                        Cell::new(""),
                        Cell::new(format!("  - {}", format_detail(detail))),
                    ]);
                }
            }
        }

        println!("{}", table);
        println!();
        println!(
            "Summary: {} passed, {} warnings, {} errors",
            result.summary.passed.to_string().green(),
            result.summary.warnings.to_string().yellow(),
            result.summary.errors.to_string().red(),
        );
    }

    if !result.is_healthy() {
        std::process::exit(1);
    }
    Ok(())
}
