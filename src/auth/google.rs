//! Federated sign-in: verification of Google ID tokens against Google's
//! published JWKS, with the key set cached in-process.

use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::{AppError, AppResult};

const JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const JWKS_TTL: Duration = Duration::from_secs(3600);
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kid: String,
    n: String,
    e: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

impl Jwks {
    fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid == kid)
    }
}

#[derive(Debug, Deserialize)]
struct GoogleClaims {
    email: Option<String>,
    name: Option<String>,
}

/// Verified identity delivered by Google.
#[derive(Debug, Clone)]
pub struct GoogleProfile {
    pub email: String,
    pub name: Option<String>,
}

struct CachedKeys {
    fetched_at: Instant,
    jwks: Jwks,
}

#[derive(Clone)]
pub struct GoogleVerifier {
    client_id: Option<String>,
    client: reqwest::Client,
    keys: Arc<Mutex<Option<CachedKeys>>>,
}

impl GoogleVerifier {
    pub fn new(client_id: Option<String>) -> Self {
        Self {
            client_id,
            client: reqwest::Client::new(),
            keys: Arc::new(Mutex::new(None)),
        }
    }

    /// Verify an ID token: RS256 signature against Google's keys, audience
    /// equal to the configured client id, Google as issuer.
    pub async fn verify(&self, credential: &str) -> AppResult<GoogleProfile> {
        let client_id = self
            .client_id
            .as_deref()
            .ok_or_else(|| AppError::Internal("GOOGLE_CLIENT_ID is not configured".into()))?;

        let header = decode_header(credential).map_err(|_| AppError::Unauthorized)?;
        if header.alg != Algorithm::RS256 {
            return Err(AppError::Unauthorized);
        }
        let kid = header.kid.ok_or(AppError::Unauthorized)?;

        let jwk = self.key_for(&kid).await?;
        let decoding_key =
            DecodingKey::from_rsa_components(&jwk.n, &jwk.e).map_err(|_| AppError::Unauthorized)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[client_id]);
        validation.set_issuer(&["https://accounts.google.com", "accounts.google.com"]);

        let claims = decode::<GoogleClaims>(credential, &decoding_key, &validation)
            .map_err(|_| AppError::Unauthorized)?
            .claims;

        let email = claims.email.ok_or(AppError::Unauthorized)?;
        Ok(GoogleProfile {
            email,
            name: claims.name,
        })
    }

    /// Signing key for `kid`, refreshing the cached set when it is stale or
    /// does not know the kid (Google rotates keys).
    async fn key_for(&self, kid: &str) -> AppResult<Jwk> {
        let mut cache = self.keys.lock().await;

        if let Some(cached) = cache.as_ref() {
            if cached.fetched_at.elapsed() < JWKS_TTL {
                if let Some(jwk) = cached.jwks.find(kid) {
                    return Ok(jwk.clone());
                }
            }
        }

        let jwks: Jwks = self
            .client
            .get(JWKS_URL)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let jwk = jwks.find(kid).cloned();
        *cache = Some(CachedKeys {
            fetched_at: Instant::now(),
            jwks,
        });

        jwk.ok_or(AppError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwks_parses_and_finds_by_kid() {
        let jwks: Jwks = serde_json::from_str(
            r#"{
                "keys": [
                    {"kty": "RSA", "kid": "a1", "use": "sig", "alg": "RS256", "n": "xxx", "e": "AQAB"},
                    {"kty": "RSA", "kid": "b2", "use": "sig", "alg": "RS256", "n": "yyy", "e": "AQAB"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(jwks.find("b2").unwrap().n, "yyy");
        assert!(jwks.find("c3").is_none());
    }

    #[tokio::test]
    async fn missing_client_id_is_a_server_error() {
        let verifier = GoogleVerifier::new(None);
        let err = verifier.verify("whatever").await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn malformed_credential_is_rejected_before_any_fetch() {
        let verifier = GoogleVerifier::new(Some("client-id".into()));
        let err = verifier.verify("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }
}
