//! idgate - OpenID Connect implicit-flow sign-in
//!
#![doc = "idgate - OpenID Connect implicit-flow sign-in"]
#![doc = "Main entry point for the idgate command-line tool."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use idgate::cli::{Cli, Commands};
use idgate::commands;
use idgate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose, cli.json_logs);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/idgate.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    match cli.command {
        Commands::Login {
            renew,
            redirect_uri,
        } => {
            tracing::info!("Starting sign-in");
            if renew {
                tracing::debug!("Silent renewal requested");
            }
            let signed_in = commands::login::run_login(config, renew, redirect_uri).await?;
            if !signed_in {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Logout { no_prompt } => {
            tracing::info!("Starting sign-out");
            commands::logout::run_logout(config, no_prompt).await?;
            Ok(())
        }
        Commands::Validate { token } => {
            let valid = commands::validate::run_validate(config, token).await?;
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Discover => {
            commands::discover::run_discover(config).await?;
            Ok(())
        }
    }
}

/// Logs go to stderr so stdout carries only command output (tokens, JSON).
fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "idgate=debug" } else { "idgate=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
