//! Shared authentication state
//!
//! [`AuthState`] is a plain value transformed by [`AuthState::reduce`]. An
//! [`AuthStore`] owns the current value and is the only place it changes.
//!
//! While a sign-in is outstanding the token slot holds a sentinel
//! (`invalid__<n>`), so a second "begin auth" signal can tell a pending
//! attempt apart from a satisfied one.

use std::sync::Mutex;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Reserved prefix of the pending-sign-in sentinel.
pub const SENTINEL_PREFIX: &str = "invalid__";

/// A fresh pending-sign-in sentinel.
pub fn pending_sentinel() -> String {
    let n: u32 = rand::rng().random_range(0..9999);
    format!("{SENTINEL_PREFIX}{n}")
}

/// Whether `token` is a pending-sign-in sentinel rather than a real token.
pub fn is_sentinel(token: &str) -> bool {
    token.starts_with(SENTINEL_PREFIX)
}

/// Current token and the user's persist-login choice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    pub token: Option<String>,
    pub persist_login: bool,
}

impl AuthState {
    /// Whether a real (non-sentinel) token is stored.
    pub fn is_authenticated(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !is_sentinel(t))
    }

    /// Whether a sign-in attempt is outstanding.
    pub fn is_pending(&self) -> bool {
        self.token.as_deref().is_some_and(is_sentinel)
    }

    /// Applies one action and returns the resulting state.
    pub fn reduce(mut self, action: AuthAction) -> Self {
        match action {
            AuthAction::BeginAuthWorkflow => self.token = Some(pending_sentinel()),
            AuthAction::TokenChanged(token) => self.token = token,
            AuthAction::PersistLoginChanged(persist) => self.persist_login = persist,
        }
        self
    }
}

/// Changes an [`AuthStore`] accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthAction {
    /// A sign-in is starting; replaces the token with a fresh sentinel.
    BeginAuthWorkflow,
    /// A sign-in finished; `None` clears the token.
    TokenChanged(Option<String>),
    PersistLoginChanged(bool),
}

/// Owner of the shared [`AuthState`].
pub trait AuthStore: Send + Sync {
    /// A copy of the current state.
    fn snapshot(&self) -> AuthState;

    /// Applies `action` to the current state.
    fn dispatch(&self, action: AuthAction);
}

/// In-memory [`AuthStore`].
#[derive(Debug, Default)]
pub struct MemoryAuthStore {
    state: Mutex<AuthState>,
}

impl MemoryAuthStore {
    pub fn new(initial: AuthState) -> Self {
        Self {
            state: Mutex::new(initial),
        }
    }
}

impl AuthStore for MemoryAuthStore {
    fn snapshot(&self) -> AuthState {
        match self.state.lock() {
            Ok(state) => state.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn dispatch(&self, action: AuthAction) {
        tracing::debug!("Auth state action: {}", describe(&action));
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        *state = std::mem::take(&mut *state).reduce(action);
    }
}

/// Log-safe description of an action; tokens are never printed.
fn describe(action: &AuthAction) -> &'static str {
    match action {
        AuthAction::BeginAuthWorkflow => "begin auth workflow",
        AuthAction::TokenChanged(Some(_)) => "token set",
        AuthAction::TokenChanged(None) => "token cleared",
        AuthAction::PersistLoginChanged(true) => "persist login on",
        AuthAction::PersistLoginChanged(false) => "persist login off",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_shape() {
        for _ in 0..100 {
            let sentinel = pending_sentinel();
            assert!(is_sentinel(&sentinel));
            let n: u32 = sentinel[SENTINEL_PREFIX.len()..].parse().unwrap();
            assert!(n < 9999);
        }
        assert!(!is_sentinel("eyJhbGciOiJSUzI1NiJ9.e30.sig"));
    }

    #[test]
    fn test_begin_auth_sets_sentinel() {
        let state = AuthState {
            token: Some("real.token.value".to_string()),
            persist_login: true,
        }
        .reduce(AuthAction::BeginAuthWorkflow);

        assert!(state.is_pending());
        assert!(!state.is_authenticated());
        assert!(state.persist_login);
    }

    #[test]
    fn test_token_changed_replaces_or_clears() {
        let state = AuthState::default().reduce(AuthAction::TokenChanged(Some("a.b.c".into())));
        assert!(state.is_authenticated());

        let state = state.reduce(AuthAction::TokenChanged(None));
        assert_eq!(state.token, None);
        assert!(!state.is_authenticated());
        assert!(!state.is_pending());
    }

    #[test]
    fn test_memory_store_dispatch() {
        let store = MemoryAuthStore::default();
        store.dispatch(AuthAction::PersistLoginChanged(true));
        store.dispatch(AuthAction::TokenChanged(Some("a.b.c".into())));

        assert_eq!(
            store.snapshot(),
            AuthState {
                token: Some("a.b.c".to_string()),
                persist_login: true,
            }
        );
    }
}
