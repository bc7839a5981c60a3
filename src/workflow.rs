//! Sign-in and sign-out workflows
//!
//! Both workflows are small async state machines over a
//! [`SurfaceController`]. Every transition is logged at `debug`; outcomes at
//! `info`. Neither workflow returns an error: sign-in failures of any kind
//! collapse to [`AuthWorkflowResult::Failed`], and sign-out always resolves.
//!
//! ```text
//! sign-in:  Idle ─▶ SurfaceOpen ─▶ AwaitingRedirect ─▶ Validating ─▶ Succeeded
//!                        │                 │                 └──────▶ Failed
//!                        └─────────────────┴─────────────────────────▶ Failed
//!
//! sign-out: Idle ─▶ SurfaceOpen ─▶ AwaitingConfirmation ─▶ Done
//! ```

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::auth::token::IdentityToken;
use crate::auth::validator::TokenValidator;
use crate::surface::controller::SurfaceController;

/// Outcome of a sign-in attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AuthWorkflowResult {
    Succeeded { token: IdentityToken },
    Failed,
}

impl AuthWorkflowResult {
    pub fn token(&self) -> Option<&IdentityToken> {
        match self {
            Self::Succeeded { token } => Some(token),
            Self::Failed => None,
        }
    }

    pub fn into_token(self) -> Option<IdentityToken> {
        match self {
            Self::Succeeded { token } => Some(token),
            Self::Failed => None,
        }
    }
}

/// How a sign-out resolved. Both outcomes count as success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignOutOutcome {
    /// The provider redirected back to the local redirect.
    Confirmed,
    /// No confirmation arrived in time (or the user closed the surface).
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginState {
    Idle,
    SurfaceOpen,
    AwaitingRedirect,
    Validating,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignOutState {
    Idle,
    SurfaceOpen,
    AwaitingConfirmation,
    Done,
}

/// Logs transitions of one workflow run.
struct Transitions<S> {
    workflow: &'static str,
    state: S,
}

impl<S: fmt::Debug + Copy> Transitions<S> {
    fn start(workflow: &'static str, state: S) -> Self {
        tracing::debug!("{workflow}: {state:?}");
        Self { workflow, state }
    }

    fn to(&mut self, next: S) {
        tracing::debug!("{}: {:?} -> {:?}", self.workflow, self.state, next);
        self.state = next;
    }
}

/// Runs sign-in and sign-out on interactive surfaces.
#[derive(Debug, Clone)]
pub struct AuthWorkflow {
    controller: SurfaceController,
    validator: TokenValidator,
    sign_out_timeout: Duration,
}

impl AuthWorkflow {
    pub fn new(
        controller: SurfaceController,
        validator: TokenValidator,
        sign_out_timeout: Duration,
    ) -> Self {
        Self {
            controller,
            validator,
            sign_out_timeout,
        }
    }

    /// Runs one interactive sign-in.
    ///
    /// `renew` asks the provider not to prompt (`prompt=none`). The returned
    /// token has been signature-checked against the provider's keys.
    pub async fn enter_auth_workflow(&self, renew: bool, redirect_uri: &str) -> AuthWorkflowResult {
        let mut state = Transitions::start("sign-in", LoginState::Idle);

        let mut surface = match self.controller.open_auth_surface(renew, redirect_uri).await {
            Ok(surface) => surface,
            Err(e) => {
                tracing::warn!("Could not open sign-in surface: {e}");
                state.to(LoginState::Failed);
                return AuthWorkflowResult::Failed;
            }
        };
        state.to(LoginState::SurfaceOpen);
        state.to(LoginState::AwaitingRedirect);

        let resolution = self.controller.wait_for_token(&mut surface).await;
        surface.close();

        let token = match resolution {
            Ok(token) => token,
            Err(e) => {
                tracing::info!("Sign-in did not complete: {e}");
                state.to(LoginState::Failed);
                return AuthWorkflowResult::Failed;
            }
        };

        state.to(LoginState::Validating);
        if self.validator.validate(&token).await {
            state.to(LoginState::Succeeded);
            tracing::info!("Sign-in succeeded");
            AuthWorkflowResult::Succeeded { token }
        } else {
            state.to(LoginState::Failed);
            tracing::info!("Sign-in failed: token did not validate");
            AuthWorkflowResult::Failed
        }
    }

    /// Runs one sign-out; `prompt = false` asks the provider not to prompt.
    ///
    /// Resolves on the first relevant navigation or after the configured
    /// timeout, whichever comes first.
    pub async fn enter_sign_out_workflow(&self, prompt: bool) -> SignOutOutcome {
        let mut state = Transitions::start("sign-out", SignOutState::Idle);

        let mut surface = match self.controller.open_sign_out_surface(prompt).await {
            Ok(surface) => surface,
            Err(e) => {
                tracing::warn!("Could not open sign-out surface: {e}");
                state.to(SignOutState::Done);
                return SignOutOutcome::TimedOut;
            }
        };
        state.to(SignOutState::SurfaceOpen);
        state.to(SignOutState::AwaitingConfirmation);

        let outcome = tokio::select! {
            confirmed = self.controller.wait_for_sign_out(&mut surface) => match confirmed {
                Ok(()) => SignOutOutcome::Confirmed,
                Err(e) => {
                    tracing::debug!("Sign-out surface ended without confirmation: {e}");
                    SignOutOutcome::TimedOut
                }
            },
            _ = tokio::time::sleep(self.sign_out_timeout) => SignOutOutcome::TimedOut,
        };
        surface.close();

        state.to(SignOutState::Done);
        tracing::info!("Sign-out finished: {outcome:?}");
        outcome
    }
}
