//! Auth state coordinator
//!
//! [`AuthCoordinator::begin_auth`] reacts to a "begin auth" signal: it asks
//! the user, runs the sign-in through [`RemoteCommands`], reports the result
//! through [`DialogService`], and publishes the resulting token to the
//! [`AuthStore`].
//!
//! Dialogs and commands are traits so a desktop host can route them over its
//! own IPC; the CLI uses [`crate::commands::dialog::TerminalDialogs`] and
//! [`InProcessCommands`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::token::IdentityToken;
use crate::error::Result;
use crate::state::{AuthAction, AuthStore};
use crate::workflow::{AuthWorkflow, AuthWorkflowResult};

/// User-facing prompts around a sign-in.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DialogService: Send + Sync {
    /// Asks whether to sign in now.
    async fn confirm_login(&self) -> Result<bool>;

    /// Reports success; returns whether the user wants to stay signed in.
    async fn login_succeeded(&self, token: &IdentityToken) -> Result<bool>;

    /// Reports failure.
    async fn login_failed(&self) -> Result<()>;
}

/// Commands executed by whoever owns the workflows.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteCommands: Send + Sync {
    async fn retrieve_identity_token(&self) -> Result<AuthWorkflowResult>;

    async fn persist_login_changed(&self, persist: bool) -> Result<()>;
}

/// Outcome of [`AuthCoordinator::begin_auth`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeginAuthOutcome {
    /// Another `begin_auth` on this coordinator is still running.
    AlreadyInProgress,
    /// A real token is already stored; nothing was done.
    AlreadySatisfied,
    /// The user declined to sign in.
    Declined,
    /// Sign-in succeeded and the token was published.
    Authenticated,
    /// Sign-in failed and the token was cleared.
    Failed,
}

/// Drives the begin-auth sequence against injected collaborators.
pub struct AuthCoordinator {
    store: Arc<dyn AuthStore>,
    dialogs: Arc<dyn DialogService>,
    commands: Arc<dyn RemoteCommands>,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl AuthCoordinator {
    pub fn new(
        store: Arc<dyn AuthStore>,
        dialogs: Arc<dyn DialogService>,
        commands: Arc<dyn RemoteCommands>,
    ) -> Self {
        Self {
            store,
            dialogs,
            commands,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Handles one "begin auth" signal.
    ///
    /// Concurrent calls on the same coordinator are single-flight: only the
    /// first runs, the others return [`BeginAuthOutcome::AlreadyInProgress`].
    ///
    /// # Errors
    ///
    /// Returns an error only if the confirmation dialog itself fails; the
    /// store is left untouched in that case.
    pub async fn begin_auth(&self) -> Result<BeginAuthOutcome> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("begin_auth ignored: already in progress");
            return Ok(BeginAuthOutcome::AlreadyInProgress);
        }
        let _guard = InFlight(&self.in_flight);

        if self.store.snapshot().is_authenticated() {
            tracing::debug!("begin_auth ignored: already authenticated");
            return Ok(BeginAuthOutcome::AlreadySatisfied);
        }

        if !self.dialogs.confirm_login().await? {
            tracing::info!("User declined sign-in");
            return Ok(BeginAuthOutcome::Declined);
        }

        self.store.dispatch(AuthAction::BeginAuthWorkflow);

        let result = match self.commands.retrieve_identity_token().await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Retrieving identity token failed: {e}");
                AuthWorkflowResult::Failed
            }
        };

        let token = match result {
            AuthWorkflowResult::Succeeded { token } => {
                let persist = self.dialogs.login_succeeded(&token).await.unwrap_or_else(|e| {
                    tracing::warn!("Success dialog failed: {e}");
                    false
                });
                if let Err(e) = self.commands.persist_login_changed(persist).await {
                    tracing::warn!("Could not record persist-login choice: {e}");
                }
                Some(token)
            }
            AuthWorkflowResult::Failed => {
                if let Err(e) = self.dialogs.login_failed().await {
                    tracing::warn!("Failure dialog failed: {e}");
                }
                None
            }
        };

        let outcome = if token.is_some() {
            BeginAuthOutcome::Authenticated
        } else {
            BeginAuthOutcome::Failed
        };
        self.store
            .dispatch(AuthAction::TokenChanged(token.map(IdentityToken::into_string)));
        Ok(outcome)
    }
}

/// [`RemoteCommands`] served by a workflow in this process.
pub struct InProcessCommands {
    workflow: AuthWorkflow,
    redirect_uri: String,
    store: Arc<dyn AuthStore>,
}

impl InProcessCommands {
    pub fn new(workflow: AuthWorkflow, redirect_uri: impl Into<String>, store: Arc<dyn AuthStore>) -> Self {
        Self {
            workflow,
            redirect_uri: redirect_uri.into(),
            store,
        }
    }
}

#[async_trait]
impl RemoteCommands for InProcessCommands {
    async fn retrieve_identity_token(&self) -> Result<AuthWorkflowResult> {
        Ok(self
            .workflow
            .enter_auth_workflow(false, &self.redirect_uri)
            .await)
    }

    async fn persist_login_changed(&self, persist: bool) -> Result<()> {
        self.store.dispatch(AuthAction::PersistLoginChanged(persist));
        Ok(())
    }
}
