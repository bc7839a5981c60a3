//! Signing-key set resolution
//!
//! Identity tokens name the key that signed them in their header, either by
//! certificate thumbprint (`x5t`) or by key id (`kid`). [`KeySetResolver`]
//! fetches the provider's published key set and finds that key.
//!
//! The key set is fetched on every call. Providers rotate keys without
//! notice, and a stale set would reject freshly issued tokens.

use std::sync::Arc;

use base64::Engine as _;
use serde::Deserialize;
use url::Url;

use crate::error::{IdgateError, Result};

/// One RSA public key from the provider's key set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningKey {
    /// The `kid` member.
    pub key_id: String,

    /// The `x5t` certificate thumbprint, when published.
    pub thumbprint: Option<String>,

    /// Big-endian RSA modulus.
    pub modulus: Vec<u8>,

    /// Big-endian RSA public exponent.
    pub exponent: Vec<u8>,

    /// DER certificates from `x5c`; empty when the provider omits them.
    pub cert_chain: Vec<Vec<u8>>,
}

impl SigningKey {
    /// Whether `identifier` names this key, by thumbprint or key id.
    pub fn matches(&self, identifier: &str) -> bool {
        self.thumbprint.as_deref() == Some(identifier) || self.key_id == identifier
    }
}

/// Wire shape of one JWKS entry.
#[derive(Debug, Deserialize)]
struct RawJwk {
    #[serde(default)]
    kid: Option<String>,
    #[serde(default)]
    x5t: Option<String>,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
    #[serde(default)]
    x5c: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawJwks {
    keys: Vec<RawJwk>,
}

impl RawJwk {
    /// Decodes the entry; `None` for non-RSA or undecodable keys.
    fn into_signing_key(self) -> Option<SigningKey> {
        let b64url = base64::engine::general_purpose::URL_SAFE_NO_PAD;
        let modulus = b64url.decode(self.n?.trim_end_matches('=')).ok()?;
        let exponent = b64url.decode(self.e?.trim_end_matches('=')).ok()?;
        let cert_chain = self
            .x5c
            .iter()
            .filter_map(|cert| base64::engine::general_purpose::STANDARD.decode(cert).ok())
            .collect();

        Some(SigningKey {
            key_id: self.kid.or_else(|| self.x5t.clone()).unwrap_or_default(),
            thumbprint: self.x5t,
            modulus,
            exponent,
            cert_chain,
        })
    }
}

/// The provider's current signing keys.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: Vec<SigningKey>,
}

impl KeySet {
    /// Parses a JWKS document. Entries that are not usable RSA keys are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not a JSON object with a `keys` array.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        let raw: RawJwks = serde_json::from_slice(body)?;
        let keys = raw
            .keys
            .into_iter()
            .filter_map(RawJwk::into_signing_key)
            .collect();
        Ok(Self { keys })
    }

    /// Finds the key named by `identifier`.
    pub fn find(&self, identifier: &str) -> Option<&SigningKey> {
        self.keys.iter().find(|key| key.matches(identifier))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Fetches key sets and picks out individual signing keys.
#[derive(Debug, Clone)]
pub struct KeySetResolver {
    http: Arc<reqwest::Client>,
}

impl KeySetResolver {
    pub fn new(http: Arc<reqwest::Client>) -> Self {
        Self { http }
    }

    /// Fetches the key set at `key_set_endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`IdgateError::KeySetUnavailable`] if the request fails, the
    /// status is not a success, or the body is not a JWKS document.
    pub async fn fetch(&self, key_set_endpoint: &Url) -> Result<KeySet> {
        let resp = self
            .http
            .get(key_set_endpoint.clone())
            .send()
            .await
            .map_err(|e| IdgateError::KeySetUnavailable(format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(IdgateError::KeySetUnavailable(format!(
                "{} returned {}",
                key_set_endpoint,
                resp.status()
            ))
            .into());
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| IdgateError::KeySetUnavailable(format!("failed to read body: {e}")))?;

        KeySet::from_json(&body).map_err(|e| {
            IdgateError::KeySetUnavailable(format!("failed to parse key set: {e}")).into()
        })
    }

    /// Fetches the current key set and returns the key named by `key_id`.
    ///
    /// # Errors
    ///
    /// Returns [`IdgateError::KeySetUnavailable`] when the fetch fails and
    /// [`IdgateError::KeyNotFound`] when no key matches.
    pub async fn resolve_key(&self, key_set_endpoint: &Url, key_id: &str) -> Result<SigningKey> {
        let key_set = self.fetch(key_set_endpoint).await?;
        tracing::debug!("Fetched {} signing keys", key_set.len());

        key_set
            .find(key_id)
            .cloned()
            .ok_or_else(|| IdgateError::KeyNotFound(key_id.to_string()).into())
    }
}
