//! Opening sign-in / sign-out surfaces and reading their navigations
//!
//! # Sign-in
//!
//! [`SurfaceController::open_auth_surface`] points a new surface at the
//! provider's authorization endpoint with `response_type=id_token`. After the
//! user signs in, the provider redirects to our local redirect URI with the
//! token in the URL fragment:
//!
//! ```text
//! http://localhost:3000/cb#state=...&id_token=<token>&session_state=...
//! ```
//!
//! [`SurfaceController::wait_for_token`] watches navigations until one lands
//! on the local redirect host and carries either `id_token` or `error`.
//!
//! # Sign-out
//!
//! [`SurfaceController::open_sign_out_surface`] loads the provider's logout
//! endpoint; any navigation to the local redirect host means the provider
//! finished.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use url::Url;
use uuid::Uuid;

use crate::auth::discovery::DiscoveryCache;
use crate::auth::token::IdentityToken;
use crate::config::{Config, ProviderConfig, SurfaceConfig};
use crate::error::{IdgateError, Result};
use crate::surface::{Surface, SurfaceEvent, SurfaceFactory, SurfaceOptions};

// ---------------------------------------------------------------------------
// Redirect parsing
// ---------------------------------------------------------------------------

/// What a single sign-in navigation tells us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginNavigation {
    /// Not our redirect host; ignore it.
    Irrelevant,
    /// Our redirect host, but neither a token nor an error yet.
    Pending,
    /// The provider delivered a token.
    Token(IdentityToken),
    /// The provider delivered an error.
    Error(String),
}

/// Returns the parsed URL when its host contains `host_marker`.
pub fn local_redirect(url: &str, host_marker: &str) -> Option<Url> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    host.contains(&host_marker.to_lowercase()).then_some(parsed)
}

/// Classifies one navigation of the sign-in surface.
///
/// The fragment is scanned pair by pair; the first key containing
/// `id_token` or `error` decides. Values are returned verbatim.
///
/// # Examples
///
/// ```
/// use idgate::surface::controller::{parse_login_redirect, LoginNavigation};
///
/// let nav = parse_login_redirect(
///     "http://localhost:3000/cb#state=s1&id_token=abc.def.ghi&other=1",
///     "localhost",
/// );
/// assert_eq!(nav, LoginNavigation::Token("abc.def.ghi".into()));
/// ```
pub fn parse_login_redirect(url: &str, host_marker: &str) -> LoginNavigation {
    let Some(parsed) = local_redirect(url, host_marker) else {
        return LoginNavigation::Irrelevant;
    };
    let Some(fragment) = parsed.fragment() else {
        return LoginNavigation::Pending;
    };

    for pair in fragment.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if key.contains("id_token") {
            if value.is_empty() {
                return LoginNavigation::Error("empty id_token".to_string());
            }
            return LoginNavigation::Token(IdentityToken::new(value));
        }
        if key.contains("error") {
            return LoginNavigation::Error(value.to_string());
        }
    }
    LoginNavigation::Pending
}

// ---------------------------------------------------------------------------
// OpenSurface
// ---------------------------------------------------------------------------

/// A shown surface together with its event subscription.
///
/// The surface is closed exactly once: by [`close`](Self::close), or on drop
/// if `close` was never called.
#[derive(Debug)]
pub struct OpenSurface {
    surface: Box<dyn Surface>,
    events: broadcast::Receiver<SurfaceEvent>,
    backlog: VecDeque<SurfaceEvent>,
    closed: bool,
}

impl OpenSurface {
    fn new(surface: Box<dyn Surface>) -> Self {
        let events = surface.subscribe();
        Self {
            surface,
            events,
            backlog: VecDeque::new(),
            closed: false,
        }
    }

    /// Next event, or `None` once the surface can no longer emit any.
    pub async fn next_event(&mut self) -> Option<SurfaceEvent> {
        if let Some(event) = self.backlog.pop_front() {
            return Some(event);
        }
        loop {
            match self.events.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Surface event subscriber lagged; {skipped} events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Waits for [`SurfaceEvent::Ready`], keeping earlier navigations.
    async fn wait_ready(&mut self) -> Result<()> {
        loop {
            match self.events.recv().await {
                Ok(SurfaceEvent::Ready) => return Ok(()),
                Ok(SurfaceEvent::Closed) | Err(RecvError::Closed) => {
                    return Err(IdgateError::UserCancelled.into())
                }
                Ok(event) => self.backlog.push_back(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Surface event subscriber lagged; {skipped} events dropped");
                }
            }
        }
    }

    /// Closes the surface.
    pub fn close(mut self) {
        self.close_once();
    }

    fn close_once(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.surface.close() {
            tracing::warn!("Failed to close surface: {e}");
        }
    }
}

impl Drop for OpenSurface {
    fn drop(&mut self) {
        self.close_once();
    }
}

// ---------------------------------------------------------------------------
// SurfaceController
// ---------------------------------------------------------------------------

/// Builds provider URLs and drives surfaces created by a [`SurfaceFactory`].
#[derive(Debug, Clone)]
pub struct SurfaceController {
    factory: Arc<dyn SurfaceFactory>,
    discovery: Arc<DiscoveryCache>,
    provider: ProviderConfig,
    surfaces: SurfaceConfig,
    logout_endpoint: Url,
    post_logout_redirect_uri: String,
    host_marker: String,
}

impl SurfaceController {
    /// Creates a controller from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`IdgateError::Config`] if the logout endpoint is not a URL.
    pub fn new(
        factory: Arc<dyn SurfaceFactory>,
        discovery: Arc<DiscoveryCache>,
        config: &Config,
    ) -> Result<Self> {
        Ok(Self {
            factory,
            discovery,
            provider: config.provider.clone(),
            surfaces: config.surface.clone(),
            logout_endpoint: config.logout_endpoint()?,
            post_logout_redirect_uri: config.redirect.post_logout_redirect_uri.clone(),
            host_marker: config.redirect.host_marker.clone(),
        })
    }

    /// The host marker identifying local redirects.
    pub fn host_marker(&self) -> &str {
        &self.host_marker
    }

    /// Opens and shows a sign-in surface.
    ///
    /// # Errors
    ///
    /// - [`IdgateError::DiscoveryUnavailable`] if the authorization endpoint
    ///   cannot be discovered.
    /// - [`IdgateError::Surface`] if the surface cannot be created or loaded.
    /// - [`IdgateError::UserCancelled`] if it is closed before becoming ready.
    pub async fn open_auth_surface(&self, renew: bool, redirect_uri: &str) -> Result<OpenSurface> {
        let config = self.discovery.get_config().await?;
        let url = self.authorization_url(&config.authorization_endpoint, renew, redirect_uri);
        tracing::debug!("Opening sign-in surface (renew={renew})");
        self.present(SurfaceOptions::modal("Sign in", self.surfaces.login), &url)
            .await
    }

    /// Opens and shows a sign-out surface.
    ///
    /// # Errors
    ///
    /// Same as [`open_auth_surface`](Self::open_auth_surface), minus discovery.
    pub async fn open_sign_out_surface(&self, prompt: bool) -> Result<OpenSurface> {
        let url = self.sign_out_url(prompt);
        tracing::debug!("Opening sign-out surface (prompt={prompt})");
        self.present(SurfaceOptions::modal("Sign out", self.surfaces.sign_out), &url)
            .await
    }

    /// Builds the implicit-flow authorization URL.
    ///
    /// `state` and `client-request-id` are fresh per call; `nonce` is derived
    /// from the configured namespace and is the same on every call.
    pub fn authorization_url(&self, endpoint: &Url, renew: bool, redirect_uri: &str) -> Url {
        let nonce = Uuid::new_v3(&Uuid::NAMESPACE_URL, self.provider.nonce_namespace.as_bytes());

        let mut url = endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("response_type", "id_token");
            query.append_pair("client_id", &self.provider.client_id);
            query.append_pair("redirect_uri", redirect_uri);
            query.append_pair("state", &Uuid::new_v4().to_string());
            query.append_pair("client-request-id", &Uuid::new_v4().to_string());
            query.append_pair("nonce", &nonce.to_string());
            query.append_pair("x-client-SKU", &self.provider.client_sku);
            query.append_pair("x-client-Ver", &self.provider.client_version);
            if renew {
                query.append_pair("prompt", "none");
            }
        }
        url
    }

    /// Builds the logout URL; `prompt=false` asks the provider not to prompt.
    pub fn sign_out_url(&self, prompt: bool) -> Url {
        let mut url = self.logout_endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("post_logout_redirect_uri", &self.post_logout_redirect_uri);
            query.append_pair("x-client-SKU", &self.provider.client_sku);
            query.append_pair("x-client-Ver", &self.provider.client_version);
            if !prompt {
                query.append_pair("prompt", "none");
            }
        }
        url
    }

    /// Waits until the sign-in surface lands on the redirect with a token.
    ///
    /// # Errors
    ///
    /// - [`IdgateError::UserCancelled`] if the surface is closed first.
    /// - [`IdgateError::ProviderError`] if the redirect carries an error.
    pub async fn wait_for_token(&self, surface: &mut OpenSurface) -> Result<IdentityToken> {
        loop {
            let url = match surface.next_event().await {
                None | Some(SurfaceEvent::Closed) => {
                    return Err(IdgateError::UserCancelled.into())
                }
                Some(SurfaceEvent::Ready) => continue,
                Some(SurfaceEvent::Navigated(url)) => url,
            };

            match parse_login_redirect(&url, &self.host_marker) {
                LoginNavigation::Irrelevant => {}
                LoginNavigation::Pending => {
                    tracing::debug!("Redirect reached without token or error; still waiting");
                }
                LoginNavigation::Token(token) => return Ok(token),
                LoginNavigation::Error(error) => {
                    return Err(IdgateError::ProviderError(error).into())
                }
            }
        }
    }

    /// Waits until the sign-out surface lands on the local redirect.
    ///
    /// # Errors
    ///
    /// Returns [`IdgateError::UserCancelled`] if the surface is closed first.
    pub async fn wait_for_sign_out(&self, surface: &mut OpenSurface) -> Result<()> {
        loop {
            match surface.next_event().await {
                None | Some(SurfaceEvent::Closed) => {
                    return Err(IdgateError::UserCancelled.into())
                }
                Some(SurfaceEvent::Navigated(url))
                    if local_redirect(&url, &self.host_marker).is_some() =>
                {
                    return Ok(())
                }
                Some(_) => {}
            }
        }
    }

    /// Creates a hidden surface, loads `url`, and shows it once ready.
    async fn present(&self, options: SurfaceOptions, url: &Url) -> Result<OpenSurface> {
        let mut open = OpenSurface::new(self.factory.create(options)?);
        open.surface.load_url(url).await?;
        open.wait_ready().await?;
        open.surface.show()?;
        Ok(open)
    }
}
