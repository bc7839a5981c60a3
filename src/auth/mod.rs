//! Provider metadata, signing keys and identity token verification
//!
//! # Module Layout
//!
//! - [`discovery`] -- OIDC discovery document and its compute-once cache
//! - [`keys`]      -- signing-key set fetching and key lookup
//! - [`token`]     -- the compact identity token and its header
//! - [`validator`] -- signature verification against the published keys

pub mod discovery;
pub mod keys;
pub mod token;
pub mod validator;

pub use discovery::{DiscoveryCache, DiscoveryDocument};
pub use keys::{KeySet, KeySetResolver, SigningKey};
pub use token::{IdentityToken, TokenHeader};
pub use validator::TokenValidator;
