//! Error types for idgate
//!
//! This module defines all error types used throughout the crate,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for idgate operations
///
/// The first group of variants is the sign-in failure taxonomy. Workflow
/// boundaries collapse all of them into a single failed outcome; they stay
/// distinct so that logs and lower-level callers can tell them apart.
#[derive(Error, Debug)]
pub enum IdgateError {
    /// The provider's discovery document could not be fetched or parsed
    #[error("Discovery document unavailable: {0}")]
    DiscoveryUnavailable(String),

    /// The provider's signing-key set could not be fetched or parsed
    #[error("Key set unavailable: {0}")]
    KeySetUnavailable(String),

    /// No key in the fetched set matched the token's key identifier
    #[error("Signing key not found: {0}")]
    KeyNotFound(String),

    /// The identity token is not a well-formed compact token
    #[error("Malformed token: {0}")]
    TokenMalformed(String),

    /// The token's signature did not verify under the resolved key
    #[error("Invalid token signature: {0}")]
    SignatureInvalid(String),

    /// The user closed the interactive surface before completion
    #[error("Sign-in cancelled by user")]
    UserCancelled,

    /// The provider redirected back with an error marker
    #[error("Provider returned an error: {0}")]
    ProviderError(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Surface adapter errors (window toolkit, loopback relay)
    #[error("Surface error: {0}")]
    Surface(String),

    /// Dialog layer errors (terminal prompts)
    #[error("Dialog error: {0}")]
    Dialog(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for idgate operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation. Callers that
/// need the failure kind downcast to [`IdgateError`].
pub type Result<T> = anyhow::Result<T>;
