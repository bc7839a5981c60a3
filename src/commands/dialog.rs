//! Terminal implementation of [`DialogService`]
//!
//! Prompts are read with `rustyline` on a blocking thread so the runtime
//! keeps serving the loopback relay while the user types.

use async_trait::async_trait;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::auth::token::IdentityToken;
use crate::coordinator::DialogService;
use crate::error::{IdgateError, Result};

/// Yes/no prompts on the controlling terminal.
#[derive(Debug, Clone, Default)]
pub struct TerminalDialogs;

impl TerminalDialogs {
    pub fn new() -> Self {
        Self
    }
}

/// Interprets a yes/no answer; empty input picks `default`.
pub fn parse_yes_no(input: &str, default: bool) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "" => Some(default),
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

async fn ask(question: String, default: bool) -> Result<bool> {
    tokio::task::spawn_blocking(move || -> Result<bool> {
        let mut rl = DefaultEditor::new()
            .map_err(|e| IdgateError::Dialog(format!("cannot open terminal: {e}")))?;
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        loop {
            match rl.readline(&format!("{question} {hint} ")) {
                Ok(line) => match parse_yes_no(&line, default) {
                    Some(answer) => return Ok(answer),
                    None => println!("{}", "Please answer y or n.".yellow()),
                },
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => return Ok(false),
                Err(e) => return Err(IdgateError::Dialog(e.to_string()).into()),
            }
        }
    })
    .await
    .map_err(|e| IdgateError::Dialog(format!("prompt task failed: {e}")))?
}

#[async_trait]
impl DialogService for TerminalDialogs {
    async fn confirm_login(&self) -> Result<bool> {
        println!("{}", "Sign-in required.".bold());
        ask("Sign in with your account now?".to_string(), true).await
    }

    async fn login_succeeded(&self, token: &IdentityToken) -> Result<bool> {
        println!("{} ({})", "Signed in.".green().bold(), token.redacted());
        ask("Stay signed in on this machine?".to_string(), false).await
    }

    async fn login_failed(&self) -> Result<()> {
        println!(
            "{}",
            "Sign-in failed. Run with --verbose for details.".red().bold()
        );
        Ok(())
    }
}
