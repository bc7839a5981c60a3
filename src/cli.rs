//! Command-line interface definition for idgate
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for sign-in, sign-out, token validation, and
//! provider discovery.

use clap::{Parser, Subcommand};

/// idgate - OpenID Connect implicit-flow sign-in for desktop applications
///
/// Opens the identity provider's own sign-in page, captures the identity
/// token from the redirect, and verifies it against the provider's
/// published signing keys.
#[derive(Parser, Debug, Clone)]
#[command(name = "idgate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/idgate.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Do not launch the system browser; print the sign-in URL instead
    #[arg(long)]
    pub no_browser: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for idgate
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Sign in and print the verified identity token
    Login {
        /// Ask the provider to skip interactive prompts (silent renewal)
        #[arg(long)]
        renew: bool,

        /// Override the configured sign-in redirect URI
        #[arg(long)]
        redirect_uri: Option<String>,
    },

    /// Sign out of the provider session
    Logout {
        /// Ask the provider to skip interactive prompts
        #[arg(long)]
        no_prompt: bool,
    },

    /// Verify an identity token against the provider's signing keys
    Validate {
        /// Compact identity token to verify
        #[arg(short, long, env = "IDGATE_TOKEN")]
        token: String,
    },

    /// Fetch and print the provider's discovery document
    Discover,
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
