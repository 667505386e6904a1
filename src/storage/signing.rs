//! V4 signed URLs (`GOOG4-RSA-SHA256`) for Cloud Storage.

use crate::auth::ServiceAccountSigner;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::{Digest, Sha256};
use std::time::Duration;

pub const SIGNING_ALGORITHM: &str = "GOOG4-RSA-SHA256";
pub const DEFAULT_SIGNING_HOST: &str = "storage.googleapis.com";

/// Longest validity Cloud Storage accepts for a V4 signature.
pub const MAX_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// RFC 3986 unreserved characters stay literal; everything else is escaped.
pub(crate) const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');
const PATH_SEGMENT: &AsciiSet = &UNRESERVED.remove(b'/');

/// Parameters of one URL to sign.
#[derive(Debug, Clone)]
pub struct SignRequest<'a> {
    pub host: &'a str,
    pub bucket: &'a str,
    pub object: &'a str,
    pub method: &'a str,
    pub ttl: Duration,
    pub timestamp: DateTime<Utc>,
}

impl SignRequest<'_> {
    fn datestamp(&self) -> String {
        self.timestamp.format("%Y%m%d").to_string()
    }

    fn request_timestamp(&self) -> String {
        self.timestamp.format("%Y%m%dT%H%M%SZ").to_string()
    }

    fn credential_scope(&self) -> String {
        format!("{}/auto/storage/goog4_request", self.datestamp())
    }

    fn canonical_uri(&self) -> String {
        format!(
            "/{}/{}",
            self.bucket,
            utf8_percent_encode(self.object, PATH_SEGMENT)
        )
    }

    pub(crate) fn canonical_query_string(&self, client_email: &str) -> String {
        let credential = format!("{}/{}", client_email, self.credential_scope());
        let mut params = [
            ("X-Goog-Algorithm", SIGNING_ALGORITHM.to_string()),
            ("X-Goog-Credential", credential),
            ("X-Goog-Date", self.request_timestamp()),
            ("X-Goog-Expires", self.ttl.as_secs().to_string()),
            ("X-Goog-SignedHeaders", "host".to_string()),
        ];
        params.sort_by(|a, b| a.0.cmp(&b.0));

        params
            .iter()
            .map(|(key, value)| {
                format!(
                    "{}={}",
                    utf8_percent_encode(key, UNRESERVED),
                    utf8_percent_encode(value, UNRESERVED)
                )
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    pub(crate) fn canonical_request(&self, client_email: &str) -> String {
        let canonical_uri = self.canonical_uri();
        let canonical_query = self.canonical_query_string(client_email);
        let canonical_headers = format!("host:{}\n", self.host);
        [
            self.method,
            canonical_uri.as_str(),
            canonical_query.as_str(),
            canonical_headers.as_str(),
            "host",
            "UNSIGNED-PAYLOAD",
        ]
        .join("\n")
    }

    pub(crate) fn string_to_sign(&self, client_email: &str) -> String {
        let digest = hex::encode(Sha256::digest(self.canonical_request(client_email).as_bytes()));
        let timestamp = self.request_timestamp();
        let scope = self.credential_scope();
        [
            SIGNING_ALGORITHM,
            timestamp.as_str(),
            scope.as_str(),
            digest.as_str(),
        ]
        .join("\n")
    }
}

/// Build a V4 signed URL for `request` using the service account's key.
pub fn sign_url(signer: &ServiceAccountSigner, request: &SignRequest<'_>) -> Result<String> {
    if request.ttl.is_zero() || request.ttl > MAX_TTL {
        return Err(Error::InvalidInput(format!(
            "Signed URL ttl must be between 1 second and 7 days, got {:?}",
            request.ttl
        )));
    }

    let client_email = signer.client_email();
    let signature = signer.sign(request.string_to_sign(client_email).as_bytes())?;

    Ok(format!(
        "https://{}{}?{}&X-Goog-Signature={}",
        request.host,
        request.canonical_uri(),
        request.canonical_query_string(client_email),
        hex::encode(signature)
    ))
}
