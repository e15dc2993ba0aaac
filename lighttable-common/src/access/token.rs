//! Session tokens
//!
//! Compact HS256 JSON Web Tokens carrying the user record plus `iat`/`exp`.
//! Validity is signature + expiry only: there is no refresh and no
//! revocation list.
//!
//! # Algorithm
//!
//! 1. Header `{"alg":"HS256","typ":"JWT"}` and claims are serialized as JSON
//! 2. Both are base64url encoded without padding and joined with `.`
//! 3. HMAC-SHA256 over that string with the session secret
//! 4. Signature appended base64url encoded

use super::User;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Session lifetime: 7 days
pub const SESSION_TTL_SECS: i64 = 7 * 24 * 60 * 60;

const ALGORITHM: &str = "HS256";

// ========================================
// Types
// ========================================

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// Claims carried by a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(flatten)]
    pub user: User,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expires at (Unix seconds)
    pub exp: i64,
}

/// Token verification failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Malformed token")]
    Malformed,

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Token expired at {0}")]
    Expired(i64),
}

// ========================================
// Issue / verify
// ========================================

/// Sign a session token for `user`, valid for [`SESSION_TTL_SECS`] from `now`
pub fn issue_token(user: &User, secret: &[u8], now: DateTime<Utc>) -> String {
    let iat = now.timestamp();
    let claims = SessionClaims {
        user: user.clone(),
        iat,
        exp: iat + SESSION_TTL_SECS,
    };
    let header = Header {
        alg: ALGORITHM.to_string(),
        typ: "JWT".to_string(),
    };

    // Serializing these plain structs cannot fail
    let header_json = serde_json::to_vec(&header).unwrap_or_default();
    let claims_json = serde_json::to_vec(&claims).unwrap_or_default();

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header_json),
        URL_SAFE_NO_PAD.encode(claims_json)
    );
    let signature = URL_SAFE_NO_PAD.encode(sign(signing_input.as_bytes(), secret));
    format!("{}.{}", signing_input, signature)
}

/// Verify a token and return its claims
pub fn verify_token(token: &str, secret: &[u8], now: DateTime<Utc>) -> Result<SessionClaims, TokenError> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed);
    };

    let header: Header = decode_json(header_b64)?;
    if header.alg != ALGORITHM {
        return Err(TokenError::UnsupportedAlgorithm(header.alg));
    }

    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| TokenError::Malformed)?;
    let signing_input = &token[..header_b64.len() + 1 + claims_b64.len()];
    let mut mac = new_mac(secret);
    mac.update(signing_input.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| TokenError::InvalidSignature)?;

    let claims: SessionClaims = decode_json(claims_b64)?;
    if claims.exp <= now.timestamp() {
        return Err(TokenError::Expired(claims.exp));
    }
    Ok(claims)
}

/// Map a token to its user, or `None` when it is not valid
pub fn authenticate(token: &str, secret: &[u8], now: DateTime<Utc>) -> Option<User> {
    verify_token(token, secret, now).ok().map(|claims| claims.user)
}

fn new_mac(secret: &[u8]) -> HmacSha256 {
    <HmacSha256 as Mac>::new_from_slice(secret).expect("HMAC accepts any key length")
}

fn sign(input: &[u8], secret: &[u8]) -> Vec<u8> {
    let mut mac = new_mac(secret);
    mac.update(input);
    mac.finalize().into_bytes().to_vec()
}

fn decode_json<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}
