//! OpenID Connect discovery
//!
//! The provider publishes its endpoints in a well-known JSON document. Only
//! two of them matter for the implicit flow: the authorization endpoint the
//! sign-in surface is pointed at, and the key-set endpoint used to verify
//! identity tokens.
//!
//! [`DiscoveryCache`] fetches the document on first use and keeps it for the
//! lifetime of the cache. There is no expiry and no invalidation; key
//! rotation is handled by refetching the key set on every validation (see
//! [`super::keys`]), not by refreshing discovery.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use url::Url;

use crate::error::{IdgateError, Result};

// ---------------------------------------------------------------------------
// DiscoveryDocument
// ---------------------------------------------------------------------------

/// The subset of an OIDC discovery document used by the sign-in workflows.
///
/// Unknown fields in the published document are ignored.
///
/// # Examples
///
/// ```
/// use idgate::auth::discovery::DiscoveryDocument;
///
/// let json = r#"{
///     "issuer": "https://login.example.com/tenant/v2.0",
///     "authorization_endpoint": "https://login.example.com/oauth2/authorize",
///     "jwks_uri": "https://login.example.com/discovery/keys"
/// }"#;
///
/// let doc: DiscoveryDocument = serde_json::from_str(json).unwrap();
/// assert_eq!(doc.jwks_uri.path(), "/discovery/keys");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryDocument {
    /// Where the sign-in surface is pointed.
    pub authorization_endpoint: Url,

    /// Where the provider's current signing keys are published.
    pub jwks_uri: Url,
}

// ---------------------------------------------------------------------------
// DiscoveryCache
// ---------------------------------------------------------------------------

/// Compute-once cache for the provider's [`DiscoveryDocument`].
///
/// Share one instance (behind an [`Arc`]) between every component that needs
/// provider endpoints. The first successful [`get_config`](Self::get_config)
/// populates the cache; concurrent first callers wait on the same fetch.
/// A failed fetch leaves the cache empty so the next call retries.
#[derive(Debug)]
pub struct DiscoveryCache {
    http: Arc<reqwest::Client>,
    discovery_url: Url,
    document: OnceCell<DiscoveryDocument>,
}

impl DiscoveryCache {
    /// Creates an empty cache that will fetch from `discovery_url`.
    pub fn new(http: Arc<reqwest::Client>, discovery_url: Url) -> Self {
        Self {
            http,
            discovery_url,
            document: OnceCell::new(),
        }
    }

    /// Creates a cache already holding `document`; it never issues a request.
    ///
    /// # Examples
    ///
    /// ```
    /// use idgate::auth::discovery::{DiscoveryCache, DiscoveryDocument};
    /// use url::Url;
    ///
    /// # #[tokio::main]
    /// # async fn main() {
    /// let doc = DiscoveryDocument {
    ///     authorization_endpoint: Url::parse("https://idp.example.com/authorize").unwrap(),
    ///     jwks_uri: Url::parse("https://idp.example.com/keys").unwrap(),
    /// };
    /// let cache = DiscoveryCache::preloaded(doc.clone());
    /// assert_eq!(cache.get_config().await.unwrap(), doc);
    /// # }
    /// ```
    pub fn preloaded(document: DiscoveryDocument) -> Self {
        Self {
            http: Arc::new(reqwest::Client::new()),
            // Never fetched; the cell is already initialized.
            discovery_url: document.authorization_endpoint.clone(),
            document: OnceCell::new_with(Some(document)),
        }
    }

    /// Returns the discovery document, fetching it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`IdgateError::DiscoveryUnavailable`] if the request fails,
    /// the provider answers with a non-success status, or the body is not a
    /// JSON object carrying both `authorization_endpoint` and `jwks_uri`.
    pub async fn get_config(&self) -> Result<DiscoveryDocument> {
        let document = self
            .document
            .get_or_try_init(|| fetch_discovery_document(&self.http, &self.discovery_url))
            .await?;
        Ok(document.clone())
    }

    /// Returns the cached document without fetching.
    pub fn cached(&self) -> Option<&DiscoveryDocument> {
        self.document.get()
    }
}

/// Fetches and parses the discovery document at `url`.
async fn fetch_discovery_document(
    http: &reqwest::Client,
    url: &Url,
) -> Result<DiscoveryDocument> {
    tracing::debug!("Fetching discovery document from {}", url);

    let resp = http
        .get(url.clone())
        .send()
        .await
        .map_err(|e| IdgateError::DiscoveryUnavailable(format!("request failed: {e}")))?;

    if !resp.status().is_success() {
        return Err(IdgateError::DiscoveryUnavailable(format!(
            "{} returned {}",
            url,
            resp.status()
        ))
        .into());
    }

    let document: DiscoveryDocument = resp.json().await.map_err(|e| {
        IdgateError::DiscoveryUnavailable(format!("failed to parse discovery document: {e}"))
    })?;

    tracing::info!(
        "Discovered authorization endpoint {}",
        document.authorization_endpoint
    );
    Ok(document)
}
