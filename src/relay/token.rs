//! Relay session tokens: compact JWS signed with HMAC-SHA256.
//!
//! The relay mints a short bearer token after a successful Google exchange
//! so the frontend can talk to the API without replaying the Google
//! credential. Seven-day expiry by default, configurable.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const ALG: &str = "HS256";
const TYP: &str = "JWT";

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid key length")]
    KeyLength,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionTokenHeader {
    pub alg: String,
    pub typ: String,
}

impl SessionTokenHeader {
    fn hs256() -> Self {
        Self {
            alg: ALG.to_string(),
            typ: TYP.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionTokenClaims {
    /// Identity row id (subject).
    pub sub: String,
    pub email: String,
    pub provider: String,
    pub iat: i64,
    pub exp: i64,
}

impl SessionTokenClaims {
    #[must_use]
    pub fn new(sub: String, email: String, provider: String, ttl_days: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub,
            email,
            provider,
            iat: now,
            exp: now + ttl_days * 24 * 60 * 60,
        }
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(segment).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn mac(secret: &[u8], signing_input: &str) -> Result<HmacSha256, Error> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| Error::KeyLength)?;
    mac.update(signing_input.as_bytes());
    Ok(mac)
}

/// Signs claims into a compact `header.payload.signature` token.
///
/// # Errors
/// Fails on serialization or an unusable key.
pub fn sign(claims: &SessionTokenClaims, secret: &[u8]) -> Result<String, Error> {
    let header = b64e_json(&SessionTokenHeader::hs256())?;
    let payload = b64e_json(claims)?;
    let signing_input = format!("{header}.{payload}");

    let signature = mac(secret, &signing_input)?.finalize().into_bytes();
    let signature = Base64UrlUnpadded::encode_string(&signature);

    Ok(format!("{signing_input}.{signature}"))
}

/// Verifies signature and expiry, returning the claims.
///
/// # Errors
/// Fails on malformed tokens, wrong algorithm, bad signature, or expiry.
pub fn verify(token: &str, secret: &[u8]) -> Result<SessionTokenClaims, Error> {
    let mut segments = token.split('.');
    let (header, payload, signature) = match (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) {
        (Some(header), Some(payload), Some(signature), None) => (header, payload, signature),
        _ => return Err(Error::TokenFormat),
    };

    let parsed_header: SessionTokenHeader = b64d_json(header)?;
    if parsed_header.alg != ALG {
        return Err(Error::UnsupportedAlg(parsed_header.alg));
    }

    let signature = Base64UrlUnpadded::decode_vec(signature).map_err(|_| Error::Base64)?;
    let signing_input = format!("{header}.{payload}");
    mac(secret, &signing_input)?
        .verify_slice(&signature)
        .map_err(|_| Error::InvalidSignature)?;

    let claims: SessionTokenClaims = b64d_json(payload)?;
    if claims.exp <= Utc::now().timestamp() {
        return Err(Error::Expired);
    }

    Ok(claims)
}
