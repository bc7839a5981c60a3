/*!
Command handlers for the CLI

This module provides the handlers invoked by the CLI entrypoint:

- `login`    - Interactive sign-in through the coordinator
- `logout`   - Provider sign-out with the confirmation timeout
- `validate` - Signature check of a given token
- `discover` - Print the provider's discovery document

Handlers wire library components together from a [`Config`]; the terminal
dialogs live in [`dialog`].
*/

use std::sync::Arc;

use crate::auth::discovery::DiscoveryCache;
use crate::auth::keys::KeySetResolver;
use crate::auth::validator::TokenValidator;
use crate::config::Config;
use crate::error::Result;
use crate::surface::controller::SurfaceController;
use crate::surface::loopback::LoopbackSurfaceFactory;
use crate::surface::SurfaceFactory;
use crate::workflow::AuthWorkflow;

pub mod dialog;

/// Provider-facing components shared by every command.
#[derive(Debug, Clone)]
pub struct Services {
    pub discovery: Arc<DiscoveryCache>,
    pub validator: TokenValidator,
}

impl Services {
    /// Builds one HTTP client and the discovery cache and validator on it.
    ///
    /// # Errors
    ///
    /// Returns error if the discovery URL is invalid or the HTTP client
    /// cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = Arc::new(
            reqwest::Client::builder()
                .timeout(config.workflow.http_timeout())
                .build()?,
        );
        let discovery = Arc::new(DiscoveryCache::new(
            Arc::clone(&http),
            config.discovery_url()?,
        ));
        let validator = TokenValidator::new(Arc::clone(&discovery), KeySetResolver::new(http));
        Ok(Self {
            discovery,
            validator,
        })
    }

    /// Assembles the workflows on surfaces from `factory`.
    ///
    /// # Errors
    ///
    /// Returns error if the logout endpoint is invalid.
    pub fn workflow(
        &self,
        config: &Config,
        factory: Arc<dyn SurfaceFactory>,
    ) -> Result<AuthWorkflow> {
        let controller = SurfaceController::new(factory, Arc::clone(&self.discovery), config)?;
        Ok(AuthWorkflow::new(
            controller,
            self.validator.clone(),
            config.workflow.sign_out_timeout(),
        ))
    }
}

/// Loopback surfaces as configured.
fn loopback_factory(config: &Config) -> Result<Arc<dyn SurfaceFactory>> {
    Ok(Arc::new(LoopbackSurfaceFactory::new(
        config.loopback_addr()?,
        config.surface.open_browser,
    )))
}

// Login command handler
pub mod login {
    //! Interactive sign-in.
    //!
    //! A plain `login` goes through [`AuthCoordinator`]: it asks before
    //! opening the browser and asks again whether to stay signed in.
    //! `login --renew` skips the dialogs and runs the workflow directly with
    //! `prompt=none`.

    use super::*;
    use crate::commands::dialog::TerminalDialogs;
    use crate::coordinator::{AuthCoordinator, BeginAuthOutcome, InProcessCommands};
    use crate::state::{AuthStore, MemoryAuthStore};

    /// Run sign-in and print the verified token on success
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `renew` - Skip dialogs and request a silent renewal
    /// * `redirect_uri` - Overrides the configured sign-in redirect URI
    ///
    /// # Returns
    ///
    /// Returns `true` if a token was obtained
    pub async fn run_login(
        mut config: Config,
        renew: bool,
        redirect_uri: Option<String>,
    ) -> Result<bool> {
        if let Some(uri) = redirect_uri {
            tracing::debug!("Using redirect URI override: {}", uri);
            config.redirect.login_redirect_uri = uri;
            config.validate()?;
        }

        let services = Services::from_config(&config)?;
        let workflow = services.workflow(&config, loopback_factory(&config)?)?;
        let redirect_uri = config.redirect.login_redirect_uri.clone();

        if renew {
            let result = workflow.enter_auth_workflow(true, &redirect_uri).await;
            return Ok(match result.into_token() {
                Some(token) => {
                    println!("{token}");
                    true
                }
                None => false,
            });
        }

        let store = Arc::new(MemoryAuthStore::default());
        let commands = InProcessCommands::new(workflow, redirect_uri, store.clone());
        let coordinator = AuthCoordinator::new(
            store.clone(),
            Arc::new(TerminalDialogs::new()),
            Arc::new(commands),
        );

        let outcome = coordinator.begin_auth().await?;
        tracing::info!("Login finished: {:?}", outcome);

        let state = store.snapshot();
        match (outcome, state.token) {
            (BeginAuthOutcome::Authenticated, Some(token)) => {
                tracing::debug!("Persist login: {}", state.persist_login);
                println!("{token}");
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

// Logout command handler
pub mod logout {
    //! Provider sign-out.

    use super::*;
    use crate::workflow::SignOutOutcome;

    /// Run sign-out; never fails once the workflow starts
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `no_prompt` - Ask the provider not to prompt
    pub async fn run_logout(config: Config, no_prompt: bool) -> Result<SignOutOutcome> {
        let services = Services::from_config(&config)?;
        let workflow = services.workflow(&config, loopback_factory(&config)?)?;

        let outcome = workflow.enter_sign_out_workflow(!no_prompt).await;
        match outcome {
            SignOutOutcome::Confirmed => println!("Signed out."),
            SignOutOutcome::TimedOut => {
                println!("Signed out (provider did not confirm in time).")
            }
        }
        Ok(outcome)
    }
}

// Validate command handler
pub mod validate {
    //! Token signature check.

    use super::*;
    use crate::auth::token::IdentityToken;
    use colored::Colorize;

    /// Verify `token`; prints the result and returns whether it is valid
    pub async fn run_validate(config: Config, token: String) -> Result<bool> {
        let services = Services::from_config(&config)?;
        let token = IdentityToken::new(token);

        match services.validator.verify(&token).await {
            Ok(()) => {
                println!("{}", "valid".green().bold());
                Ok(true)
            }
            Err(e) => {
                println!("{}: {}", "invalid".red().bold(), e);
                Ok(false)
            }
        }
    }
}

// Discover command handler
pub mod discover {
    //! Discovery document dump.

    use super::*;

    /// Fetch the discovery document and print it as JSON
    pub async fn run_discover(config: Config) -> Result<()> {
        let services = Services::from_config(&config)?;
        let document = services.discovery.get_config().await?;
        println!("{}", serde_json::to_string_pretty(&document)?);
        Ok(())
    }
}
