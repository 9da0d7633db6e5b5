//! User command - register, login, logout and profile

use anyhow::Result;
use bankline_core::api::{self, LoginRequest, RegisterRequest};
use bankline_core::Role;
use clap::Subcommand;
use colored::Colorize;
use dialoguer::{Input, Password};

use super::{api_error, auth_header, clear_session, get_context, save_session, SavedSession};
use crate::output;

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create a new user
    Register {
        /// Email address (prompted if omitted)
        email: Option<String>,
        /// Password (prompted if omitted)
        #[arg(long, env = "BANKLINE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log in and remember the session
    Login {
        email: Option<String>,
        #[arg(long, env = "BANKLINE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Revoke the current session
    Logout,
    /// Show the logged-in user
    Me {
        #[arg(long)]
        json: bool,
    },
    /// List all users (admin only)
    List {
        #[arg(long)]
        json: bool,
    },
}

fn prompt_email(email: Option<String>) -> Result<String> {
    match email {
        Some(email) => Ok(email),
        None => Ok(Input::<String>::new().with_prompt("Email").interact_text()?),
    }
}

pub fn run(command: UserCommands) -> Result<()> {
    match command {
        UserCommands::Register { email, password, json } => {
            let email = prompt_email(email)?;
            let password = match password {
                Some(p) => p,
                None => Password::new()
                    .with_prompt("Password")
                    .with_confirmation("Confirm password", "Passwords do not match")
                    .interact()?,
            };

            let ctx = get_context()?;
            let profile = api::register(&ctx, &RegisterRequest { email, password })
                .map_err(api_error)?
                .body;

            if json {
                return output::json(&profile);
            }
            output::success(&format!("Registered {}", profile.email));
            if profile.role == Role::Admin {
                println!("  Role: {}", "admin".bold());
            }
        }
        UserCommands::Login { email, password, json } => {
            let email = prompt_email(email)?;
            let password = match password {
                Some(p) => p,
                None => Password::new().with_prompt("Password").interact()?,
            };

            let ctx = get_context()?;
            let login = api::login(&ctx, &LoginRequest { email, password })
                .map_err(api_error)?
                .body;
            save_session(&SavedSession {
                token: login.token.clone(),
                email: login.user.email.clone(),
                expires_at: login.expires_at,
            })?;

            if json {
                return output::json(&login.user);
            }
            output::success(&format!("Logged in as {}", login.user.email));
            println!("  Session expires {}", login.expires_at.format("%Y-%m-%d %H:%M UTC"));
        }
        UserCommands::Logout => {
            let header = auth_header()?;
            if header.is_some() {
                let ctx = get_context()?;
                // A stale token is still cleared locally
                if let Err(err) = api::logout(&ctx, header.as_deref()) {
                    output::warning(&format!("Could not revoke session: {}", err.message));
                }
            }
            clear_session()?;
            output::success("Logged out");
        }
        UserCommands::Me { json } => {
            let ctx = get_context()?;
            let profile = api::me(&ctx, auth_header()?.as_deref())
                .map_err(api_error)?
                .body;
            if json {
                return output::json(&profile);
            }
            println!("{} ({})", profile.email.bold(), profile.role);
            println!("  id: {}", profile.id);
        }
        UserCommands::List { json } => {
            let ctx = get_context()?;
            let users = api::list_users(&ctx, auth_header()?.as_deref())
                .map_err(api_error)?
                .body;
            if json {
                return output::json(&users);
            }

            let mut table = output::create_table();
            table.set_header(vec!["Email", "Role", "ID"]);
            for user in users {
                table.add_row(vec![user.email, user.role.to_string(), user.id.to_string()]);
            }
            println!("{}", table);
        }
    }

    Ok(())
}
