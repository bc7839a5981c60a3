//! Identity token signature verification
//!
//! [`TokenValidator::validate`] answers one question: did the provider sign
//! this token with one of its currently published keys? Every failure along
//! the way (bad header, unknown key, network trouble, bad signature) is
//! logged and reported as `false`.

use std::collections::HashSet;
use std::sync::Arc;

use base64::Engine as _;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use crate::auth::discovery::DiscoveryCache;
use crate::auth::keys::KeySetResolver;
use crate::auth::token::IdentityToken;
use crate::error::{IdgateError, Result};

/// Verifies identity tokens against the provider's published signing keys.
#[derive(Debug, Clone)]
pub struct TokenValidator {
    discovery: Arc<DiscoveryCache>,
    keys: KeySetResolver,
}

impl TokenValidator {
    pub fn new(discovery: Arc<DiscoveryCache>, keys: KeySetResolver) -> Self {
        Self { discovery, keys }
    }

    /// Returns `true` only if the token carries a valid provider signature.
    pub async fn validate(&self, token: &IdentityToken) -> bool {
        match self.verify(token).await {
            Ok(()) => {
                tracing::debug!("Token {} verified", token.redacted());
                true
            }
            Err(e) => {
                tracing::warn!("Token {} rejected: {e}", token.redacted());
                false
            }
        }
    }

    /// Like [`validate`](Self::validate) but reports why verification failed.
    ///
    /// # Errors
    ///
    /// - [`IdgateError::TokenMalformed`] for a bad header, a missing key
    ///   identifier, or a non-RSA algorithm.
    /// - [`IdgateError::DiscoveryUnavailable`], [`IdgateError::KeySetUnavailable`],
    ///   [`IdgateError::KeyNotFound`] from key resolution.
    /// - [`IdgateError::SignatureInvalid`] when the signature (or `exp` /
    ///   `nbf`) does not check out.
    pub async fn verify(&self, token: &IdentityToken) -> Result<()> {
        let header = token.header()?;
        let algorithm = rsa_algorithm(&header.alg)?;
        let key_id = header.key_identifier().ok_or_else(|| {
            IdgateError::TokenMalformed("header names neither x5t nor kid".to_string())
        })?;

        let config = self.discovery.get_config().await?;
        let signing_key = self.keys.resolve_key(&config.jwks_uri, key_id).await?;

        let b64url = base64::engine::general_purpose::URL_SAFE_NO_PAD;
        let decoding_key = DecodingKey::from_rsa_components(
            &b64url.encode(&signing_key.modulus),
            &b64url.encode(&signing_key.exponent),
        )
        .map_err(|e| IdgateError::KeyNotFound(format!("{key_id}: unusable RSA key: {e}")))?;

        jsonwebtoken::decode::<serde_json::Value>(
            token.as_str(),
            &decoding_key,
            &signature_only(algorithm),
        )
        .map_err(|e| IdgateError::SignatureInvalid(e.to_string()))?;

        Ok(())
    }
}

/// Maps the header's `alg` to an RSA algorithm; provider keys are RSA.
fn rsa_algorithm(alg: &str) -> Result<Algorithm> {
    let algorithm = match alg {
        "RS256" => Algorithm::RS256,
        "RS384" => Algorithm::RS384,
        "RS512" => Algorithm::RS512,
        "PS256" => Algorithm::PS256,
        "PS384" => Algorithm::PS384,
        "PS512" => Algorithm::PS512,
        other => {
            return Err(IdgateError::TokenMalformed(format!(
                "unsupported signing algorithm '{other}'"
            ))
            .into())
        }
    };
    Ok(algorithm)
}

/// Signature check with time claims enforced only when present.
///
/// Audience and issuer are not checked: the client id and provider are fixed
/// by configuration.
fn signature_only(algorithm: Algorithm) -> Validation {
    let mut validation = Validation::new(algorithm);
    validation.required_spec_claims = HashSet::new();
    validation.validate_aud = false;
    validation.validate_nbf = true;
    validation
}
