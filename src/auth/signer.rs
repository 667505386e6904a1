use super::key_file::ServiceAccountKey;
use crate::{Error, Result};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;
use std::fmt;

const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// RSA signing material of a service account.
#[derive(Clone)]
pub struct ServiceAccountSigner {
    client_email: String,
    key_id: Option<String>,
    key: EncodingKey,
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

impl ServiceAccountSigner {
    pub fn from_key(key: &ServiceAccountKey) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
            Error::Auth(format!(
                "Invalid private key for {}: {}",
                key.client_email, e
            ))
        })?;

        Ok(Self {
            client_email: key.client_email.clone(),
            key_id: key.private_key_id.clone(),
            key: encoding_key,
        })
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    /// RSASSA-PKCS1-v1_5 / SHA-256 signature over `message`.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let encoded = jsonwebtoken::crypto::sign(message, &self.key, Algorithm::RS256)
            .map_err(|e| Error::StorageAuth(format!("RSA signing failed: {}", e)))?;

        base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| Error::Invariant(format!("Signer returned invalid base64: {}", e)))
    }

    /// Self-signed JWT for the OAuth2 jwt-bearer grant.
    pub fn assertion<'a, I>(&self, scopes: I, audience: &str, now: DateTime<Utc>) -> Result<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let iat = now.timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: scopes
                .into_iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(" "),
            aud: audience,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();

        jsonwebtoken::encode(&header, &claims, &self.key)
            .map_err(|e| Error::Auth(format!("Failed to build JWT assertion: {}", e)))
    }
}

impl fmt::Debug for ServiceAccountSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountSigner")
            .field("client_email", &self.client_email)
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}
