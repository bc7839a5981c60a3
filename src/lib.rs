//! idgate - OpenID Connect implicit-flow sign-in for desktop applications
//!
//! This library signs a user in by showing the identity provider's own page
//! on an ephemeral surface, capturing the identity token from the redirect,
//! and verifying its signature against the provider's published keys.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `auth`: Discovery cache, key-set resolution and token validation
//! - `surface`: Surface abstraction, its controller, and implementations
//! - `workflow`: Sign-in and sign-out state machines
//! - `state`: Shared auth state, its reducer and store
//! - `coordinator`: Begin-auth handling with dialogs and remote commands
//! - `commands`: CLI command handlers
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use idgate::commands::Services;
//! use idgate::surface::loopback::LoopbackSurfaceFactory;
//! use idgate::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     config.validate()?;
//!
//!     let services = Services::from_config(&config)?;
//!     let factory = Arc::new(LoopbackSurfaceFactory::new(config.loopback_addr()?, true));
//!     let workflow = services.workflow(&config, factory)?;
//!
//!     let result = workflow
//!         .enter_auth_workflow(false, &config.redirect.login_redirect_uri)
//!         .await;
//!     println!("{:?}", result);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cli;
pub mod commands;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod state;
pub mod surface;
pub mod workflow;

// Re-export commonly used types
pub use auth::{DiscoveryCache, DiscoveryDocument, IdentityToken, TokenValidator};
pub use config::Config;
pub use coordinator::{AuthCoordinator, BeginAuthOutcome, DialogService, RemoteCommands};
pub use error::{IdgateError, Result};
pub use state::{AuthAction, AuthState, AuthStore, MemoryAuthStore};
pub use workflow::{AuthWorkflow, AuthWorkflowResult, SignOutOutcome};
