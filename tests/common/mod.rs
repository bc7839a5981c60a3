use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use idgate::auth::{DiscoveryCache, DiscoveryDocument, KeySetResolver, TokenValidator};

pub const PRIMARY_KEY_PEM: &[u8] = include_bytes!("../fixtures/signing_key_primary.pem");
pub const ROTATED_KEY_PEM: &[u8] = include_bytes!("../fixtures/signing_key_rotated.pem");

pub const PRIMARY_KEY_ID: &str = "primary-2048";
pub const ROTATED_KEY_ID: &str = "rotated-2048";

/// base64url modulus of `signing_key_primary.pem`.
pub const PRIMARY_MODULUS: &str = "otyY2AJe7nILdfVGRJJ0MXAI8X-7ETLbAYFEZ_Y2FoCO3KFx40GWSaeKcEcvDFcRdy7Sgeazs1NZ50P2Fsm6idlbJIKUyI3CMVvyPzlyBn7WbZGUkqH8b6fYRpY5Tx4Mjb0kNYq5NBAMTtu3iJTMydeenoLClIbdGTF52afdlQJceJfOp6oR2Icc_6t3y810ZcxSdiHf0u6AazzM5ecZ-oMnQqON0QvvWkRIwkcKCjNCR1-Znuoz6F2Tgzf69NotNp4s59RUbxS8sdgUsc_5hQqiUhZq7Pq2AeErUYWF4ddx1WEP5OZR1ptq_1r2EqaqLGBsIWCpi1F6NNb0jfHjVQ";

/// base64url modulus of `signing_key_rotated.pem`.
pub const ROTATED_MODULUS: &str = "8s6z3MGjc-7hWE632-9lN21HxwLymelMjkyUvfZgHpfhf4MlgkPDtMMt0AhWiq0sN9UkyeBIRe7f_A3_OFL9jNPTW-Ta1ShuSTk5vxljUiZHpw-mk34LZJmidp5bsGhZU34WYQQRf3m6plsDbDLgGgBSafhU_t3Xpwu7CNkU_tYc3U9TuITeHSSceXL8l_ybXd9GEHnpJE_uuhSkf06LPFW2erJvqCcCr06JSPA5boGZ35R2yIu1yvACvnC_wL6BMGoex6Phe-FSb1GEIvw7o75A2lZdF9tD0mY9yyHkldzKdOXfl8ZVH807XPtsJs1seoy8g3XMTpB2lyIhowjCaw";

pub const EXPONENT: &str = "AQAB";

pub const DISCOVERY_PATH: &str = "/common/.well-known/openid-configuration";
pub const KEYS_PATH: &str = "/common/discovery/keys";

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_secs()
}

/// Claims of a token that is valid for the next hour.
#[allow(dead_code)]
pub fn claims() -> serde_json::Value {
    let now = unix_now();
    serde_json::json!({
        "iss": "https://idp.example.com/common/v2.0",
        "aud": "4f28e5eb-6b7f-49e6-ac0e-f992b622da57",
        "sub": "user-1",
        "iat": now,
        "nbf": now,
        "exp": now + 3600,
    })
}

/// Claims of a token that expired an hour ago.
#[allow(dead_code)]
pub fn expired_claims() -> serde_json::Value {
    let now = unix_now();
    serde_json::json!({
        "sub": "user-1",
        "iat": now - 7200,
        "exp": now - 3600,
    })
}

/// Signs `claims` with the RSA key in `pem`, naming `key_id` as both `kid`
/// and `x5t`.
#[allow(dead_code)]
pub fn sign_token(pem: &[u8], key_id: &str, claims: &serde_json::Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(key_id.to_string());
    header.x5t = Some(key_id.to_string());
    let key = EncodingKey::from_rsa_pem(pem).expect("fixture key is valid PEM");
    jsonwebtoken::encode(&header, claims, &key).expect("token encodes")
}

/// A JWKS body with one RSA entry per `(key_id, modulus)`.
#[allow(dead_code)]
pub fn jwks(entries: &[(&str, &str)]) -> serde_json::Value {
    let keys: Vec<_> = entries
        .iter()
        .map(|(key_id, modulus)| {
            serde_json::json!({
                "kty": "RSA",
                "use": "sig",
                "kid": key_id,
                "x5t": key_id,
                "n": modulus,
                "e": EXPONENT,
            })
        })
        .collect();
    serde_json::json!({ "keys": keys })
}

/// Discovery body pointing at endpoints on `base_url`.
#[allow(dead_code)]
pub fn discovery_body(base_url: &str) -> serde_json::Value {
    serde_json::json!({
        "issuer": format!("{base_url}/common/v2.0"),
        "authorization_endpoint": format!("{base_url}/common/oauth2/authorize"),
        "jwks_uri": format!("{base_url}{KEYS_PATH}"),
        "response_types_supported": ["code", "id_token"],
    })
}

/// Serves the discovery document; expects it to be fetched `times` times.
#[allow(dead_code)]
pub async fn mount_discovery(server: &MockServer, times: u64) {
    Mock::given(method("GET"))
        .and(path(DISCOVERY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(discovery_body(&server.uri())))
        .expect(times)
        .mount(server)
        .await;
}

/// Serves `body` as the key set.
#[allow(dead_code)]
pub async fn mount_jwks(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(KEYS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[allow(dead_code)]
pub fn http() -> Arc<reqwest::Client> {
    Arc::new(reqwest::Client::new())
}

/// An empty discovery cache pointed at `server`.
#[allow(dead_code)]
pub fn discovery(server: &MockServer) -> Arc<DiscoveryCache> {
    let url = Url::parse(&format!("{}{DISCOVERY_PATH}", server.uri())).expect("valid url");
    Arc::new(DiscoveryCache::new(http(), url))
}

/// A discovery cache already holding `server`'s endpoints.
#[allow(dead_code)]
pub fn preloaded_discovery(server: &MockServer) -> Arc<DiscoveryCache> {
    let base = server.uri();
    Arc::new(DiscoveryCache::preloaded(DiscoveryDocument {
        authorization_endpoint: Url::parse(&format!("{base}/common/oauth2/authorize"))
            .expect("valid url"),
        jwks_uri: Url::parse(&format!("{base}{KEYS_PATH}")).expect("valid url"),
    }))
}

#[allow(dead_code)]
pub fn validator(discovery: Arc<DiscoveryCache>) -> TokenValidator {
    TokenValidator::new(discovery, KeySetResolver::new(http()))
}
