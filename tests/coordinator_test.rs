//! Auth coordinator integration tests
//!
//! Dialogs and remote commands are mocked with `mockall`; the last test runs
//! the coordinator end to end over in-process commands and fake surfaces.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockall::mock;
use mockall::predicate::eq;
use tokio::sync::Notify;
use wiremock::MockServer;

use idgate::auth::IdentityToken;
use idgate::config::Config;
use idgate::coordinator::{
    AuthCoordinator, BeginAuthOutcome, DialogService, InProcessCommands, RemoteCommands,
};
use idgate::error::Result;
use idgate::state::{pending_sentinel, AuthState, AuthStore, MemoryAuthStore};
use idgate::surface::controller::SurfaceController;
use idgate::surface::fake::FakeSurfaceFactory;
use idgate::surface::SurfaceEvent;
use idgate::workflow::{AuthWorkflow, AuthWorkflowResult};

use common::*;

mock! {
    pub Dialogs {}

    #[async_trait]
    impl DialogService for Dialogs {
        async fn confirm_login(&self) -> Result<bool>;
        async fn login_succeeded(&self, token: &IdentityToken) -> Result<bool>;
        async fn login_failed(&self) -> Result<()>;
    }
}

mock! {
    pub Commands {}

    #[async_trait]
    impl RemoteCommands for Commands {
        async fn retrieve_identity_token(&self) -> Result<AuthWorkflowResult>;
        async fn persist_login_changed(&self, persist: bool) -> Result<()>;
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn store_with(token: Option<String>) -> Arc<MemoryAuthStore> {
    Arc::new(MemoryAuthStore::new(AuthState {
        token,
        persist_login: false,
    }))
}

fn succeeded(token: &str) -> AuthWorkflowResult {
    AuthWorkflowResult::Succeeded {
        token: IdentityToken::new(token),
    }
}

/// Commands whose token retrieval waits until released.
struct GatedCommands {
    started: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl RemoteCommands for GatedCommands {
    async fn retrieve_identity_token(&self) -> Result<AuthWorkflowResult> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(succeeded("a.b.c"))
    }

    async fn persist_login_changed(&self, _persist: bool) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Short circuits
// ---------------------------------------------------------------------------

/// A real token already stored: nothing is asked, nothing is opened.
#[tokio::test]
async fn test_begin_auth_with_real_token_is_noop() {
    let store = store_with(Some("header.claims.signature".to_string()));
    let mut dialogs = MockDialogs::new();
    dialogs.expect_confirm_login().never();
    let mut commands = MockCommands::new();
    commands.expect_retrieve_identity_token().never();

    let coordinator = AuthCoordinator::new(store.clone(), Arc::new(dialogs), Arc::new(commands));
    let outcome = coordinator.begin_auth().await.unwrap();

    assert_eq!(outcome, BeginAuthOutcome::AlreadySatisfied);
    assert_eq!(
        store.snapshot().token.as_deref(),
        Some("header.claims.signature")
    );
}

/// The in-process path opens no surface either.
#[tokio::test]
async fn test_begin_auth_with_real_token_opens_no_surface() {
    let server = MockServer::start().await;
    let factory = FakeSurfaceFactory::new();
    let store = store_with(Some("header.claims.signature".to_string()));
    let commands = InProcessCommands::new(
        workflow(&factory, &server),
        "http://localhost:3000/cb",
        store.clone(),
    );
    let mut dialogs = MockDialogs::new();
    dialogs.expect_confirm_login().never();

    let coordinator = AuthCoordinator::new(store, Arc::new(dialogs), Arc::new(commands));

    assert_eq!(
        coordinator.begin_auth().await.unwrap(),
        BeginAuthOutcome::AlreadySatisfied
    );
    assert!(factory.log().created.is_empty());
}

#[tokio::test]
async fn test_declined_leaves_state_untouched() {
    let store = store_with(None);
    let mut dialogs = MockDialogs::new();
    dialogs.expect_confirm_login().times(1).returning(|| Ok(false));
    let mut commands = MockCommands::new();
    commands.expect_retrieve_identity_token().never();

    let coordinator = AuthCoordinator::new(store.clone(), Arc::new(dialogs), Arc::new(commands));

    assert_eq!(
        coordinator.begin_auth().await.unwrap(),
        BeginAuthOutcome::Declined
    );
    assert_eq!(store.snapshot(), AuthState::default());
}

/// A pending sentinel does not count as signed in.
#[tokio::test]
async fn test_pending_sentinel_still_runs() {
    let store = store_with(Some(pending_sentinel()));
    let mut dialogs = MockDialogs::new();
    dialogs.expect_confirm_login().times(1).returning(|| Ok(false));
    let commands = MockCommands::new();

    let coordinator = AuthCoordinator::new(store, Arc::new(dialogs), Arc::new(commands));

    assert_eq!(
        coordinator.begin_auth().await.unwrap(),
        BeginAuthOutcome::Declined
    );
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_success_publishes_token_and_persist_choice() {
    let store = store_with(None);
    let mut dialogs = MockDialogs::new();
    dialogs.expect_confirm_login().times(1).returning(|| Ok(true));
    dialogs
        .expect_login_succeeded()
        .times(1)
        .returning(|token| Ok(token.as_str() == "a.b.c"));
    dialogs.expect_login_failed().never();
    let mut commands = MockCommands::new();
    commands
        .expect_retrieve_identity_token()
        .times(1)
        .returning(|| Ok(succeeded("a.b.c")));
    commands
        .expect_persist_login_changed()
        .with(eq(true))
        .times(1)
        .returning(|_| Ok(()));

    let coordinator = AuthCoordinator::new(store.clone(), Arc::new(dialogs), Arc::new(commands));

    assert_eq!(
        coordinator.begin_auth().await.unwrap(),
        BeginAuthOutcome::Authenticated
    );
    assert_eq!(store.snapshot().token.as_deref(), Some("a.b.c"));
}

#[tokio::test]
async fn test_failure_clears_token_and_reports() {
    let store = store_with(None);
    let mut dialogs = MockDialogs::new();
    dialogs.expect_confirm_login().returning(|| Ok(true));
    dialogs.expect_login_succeeded().never();
    dialogs.expect_login_failed().times(1).returning(|| Ok(()));
    let mut commands = MockCommands::new();
    commands
        .expect_retrieve_identity_token()
        .returning(|| Ok(AuthWorkflowResult::Failed));
    commands.expect_persist_login_changed().never();

    let coordinator = AuthCoordinator::new(store.clone(), Arc::new(dialogs), Arc::new(commands));

    assert_eq!(
        coordinator.begin_auth().await.unwrap(),
        BeginAuthOutcome::Failed
    );
    let state = store.snapshot();
    assert_eq!(state.token, None);
    assert!(!state.is_pending());
}

// ---------------------------------------------------------------------------
// Single flight
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_concurrent_begin_auth_is_single_flight() {
    let store = store_with(None);
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let commands = GatedCommands {
        started: started.clone(),
        release: release.clone(),
    };
    let mut dialogs = MockDialogs::new();
    dialogs.expect_confirm_login().times(1).returning(|| Ok(true));
    dialogs.expect_login_succeeded().returning(|_| Ok(false));

    let coordinator = Arc::new(AuthCoordinator::new(
        store.clone(),
        Arc::new(dialogs),
        Arc::new(commands),
    ));

    let first = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.begin_auth().await }
    });
    started.notified().await;
    assert!(store.snapshot().is_pending(), "attempt should be marked pending");

    assert_eq!(
        coordinator.begin_auth().await.unwrap(),
        BeginAuthOutcome::AlreadyInProgress
    );

    release.notify_one();
    assert_eq!(
        first.await.unwrap().unwrap(),
        BeginAuthOutcome::Authenticated
    );
    assert_eq!(store.snapshot().token.as_deref(), Some("a.b.c"));
}

// ---------------------------------------------------------------------------
// End to end
// ---------------------------------------------------------------------------

fn workflow(factory: &FakeSurfaceFactory, server: &MockServer) -> AuthWorkflow {
    let config = Config::default();
    let discovery = preloaded_discovery(server);
    let controller =
        SurfaceController::new(Arc::new(factory.clone()), discovery.clone(), &config).unwrap();
    AuthWorkflow::new(
        controller,
        validator(discovery),
        config.workflow.sign_out_timeout(),
    )
}

#[tokio::test]
async fn test_in_process_sign_in_updates_store() {
    let server = MockServer::start().await;
    mount_jwks(&server, jwks(&[(PRIMARY_KEY_ID, PRIMARY_MODULUS)])).await;
    let token = sign_token(PRIMARY_KEY_PEM, PRIMARY_KEY_ID, &claims());

    let factory = FakeSurfaceFactory::new().on_show(vec![(
        Duration::from_millis(5),
        SurfaceEvent::Navigated(format!("http://localhost:3000/cb#id_token={token}")),
    )]);
    let store = store_with(None);
    let commands = InProcessCommands::new(
        workflow(&factory, &server),
        "http://localhost:3000/cb",
        store.clone(),
    );
    let mut dialogs = MockDialogs::new();
    dialogs.expect_confirm_login().returning(|| Ok(true));
    dialogs.expect_login_succeeded().returning(|_| Ok(true));

    let coordinator = AuthCoordinator::new(store.clone(), Arc::new(dialogs), Arc::new(commands));

    assert_eq!(
        coordinator.begin_auth().await.unwrap(),
        BeginAuthOutcome::Authenticated
    );
    let state = store.snapshot();
    assert_eq!(state.token.as_deref(), Some(token.as_str()));
    assert!(state.persist_login);
    assert_eq!(factory.log().closed, 1);
}
