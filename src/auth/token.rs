//! Compact HS256 bearer tokens.
//!
//! Format: `base64url(header).base64url(payload).base64url(signature)` where the
//! signature is HMAC-SHA256 over `header.payload`. The payload carries one member
//! per claim type (repeated types become arrays of strings) and `exp` in unix
//! seconds. Issuer and audience are neither written nor checked.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, TimeDelta, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::Sha256;
use thiserror::Error;

use super::{
    claims::{Claim, ClaimType, find_email},
    error::AuthError,
};

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "HS256";
pub const EXPIRATION_CLAIM: &str = "exp";
pub const DEFAULT_LIFETIME_DAYS: i64 = 365;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token format")]
    Format,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("missing expiration")]
    MissingExpiration,
    #[error("expiration out of range")]
    ExpirationRange,
    #[error("token expired")]
    Expired,
    #[error("claim type is reserved: {0}")]
    ReservedClaim(String),
    #[error("invalid signing key")]
    Key,
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Key => Self::Configuration("invalid signing key".to_string()),
            _ => Self::ExpiredOrInvalidToken,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TokenHeader {
    alg: String,
    typ: String,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: ALGORITHM.to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Claims carried by a validated token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub claims: Vec<Claim>,
    pub exp: i64,
}

impl TokenClaims {
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        find_email(&self.claims)
    }

    #[must_use]
    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    fn to_payload(&self) -> Result<Map<String, Value>, TokenError> {
        let mut payload = Map::new();
        for claim in &self.claims {
            let key = claim.kind.as_str();
            if key == EXPIRATION_CLAIM {
                return Err(TokenError::ReservedClaim(key.to_string()));
            }
            let value = Value::String(claim.value.clone());
            match payload.get_mut(key) {
                None => {
                    payload.insert(key.to_string(), value);
                }
                Some(Value::Array(values)) => values.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
            }
        }
        payload.insert(EXPIRATION_CLAIM.to_string(), Value::from(self.exp));
        Ok(payload)
    }

    fn from_payload(payload: Map<String, Value>) -> Result<Self, TokenError> {
        let mut exp = None;
        let mut claims = Vec::new();
        for (key, value) in payload {
            if key == EXPIRATION_CLAIM {
                exp = value.as_i64();
                continue;
            }
            let kind = ClaimType::from(key);
            match value {
                Value::Array(values) => {
                    for item in values {
                        if let Some(text) = claim_text(item) {
                            claims.push(Claim::new(kind.clone(), text));
                        }
                    }
                }
                other => {
                    if let Some(text) = claim_text(other) {
                        claims.push(Claim::new(kind, text));
                    }
                }
            }
        }
        Ok(Self {
            claims,
            exp: exp.ok_or(TokenError::MissingExpiration)?,
        })
    }
}

fn claim_text(value: Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// A freshly minted token and its absolute expiration.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expiration: DateTime<Utc>,
}

/// Builds and validates tokens with one process-wide signing key.
pub struct TokenIssuer {
    signing_key: SecretString,
    lifetime: TimeDelta,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("signing_key", &"***")
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

impl TokenIssuer {
    /// # Errors
    /// Returns [`AuthError::Configuration`] when the key is empty or the
    /// lifetime is not positive.
    pub fn new(signing_key: SecretString, lifetime: TimeDelta) -> Result<Self, AuthError> {
        if signing_key.expose_secret().is_empty() {
            return Err(AuthError::Configuration(
                "token signing key must not be empty".to_string(),
            ));
        }
        if lifetime <= TimeDelta::zero() {
            return Err(AuthError::Configuration(
                "token lifetime must be positive".to_string(),
            ));
        }
        Ok(Self {
            signing_key,
            lifetime,
        })
    }

    #[must_use]
    pub const fn lifetime(&self) -> TimeDelta {
        self.lifetime
    }

    /// Issue a token expiring `lifetime` from now.
    ///
    /// # Errors
    /// Returns an error if a claim uses a reserved name or encoding fails.
    pub fn issue(&self, claims: Vec<Claim>) -> Result<IssuedToken, TokenError> {
        self.issue_at(claims, Utc::now())
    }

    /// Issue a token expiring `lifetime` after `now`.
    ///
    /// # Errors
    /// Returns an error if a claim uses a reserved name, the expiration
    /// overflows, or encoding fails.
    pub fn issue_at(&self, claims: Vec<Claim>, now: DateTime<Utc>) -> Result<IssuedToken, TokenError> {
        let expiration = now
            .checked_add_signed(self.lifetime)
            .ok_or(TokenError::ExpirationRange)?;
        self.issue_expiring(claims, expiration)
    }

    /// Issue a token with an explicit expiration, truncated to whole seconds.
    ///
    /// # Errors
    /// Returns an error if a claim uses a reserved name or encoding fails.
    pub fn issue_expiring(
        &self,
        claims: Vec<Claim>,
        expiration: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let exp = expiration.timestamp();
        let expiration = DateTime::from_timestamp(exp, 0).ok_or(TokenError::ExpirationRange)?;
        let body = TokenClaims { claims, exp };

        let header_b64 = b64e_json(&TokenHeader::hs256())?;
        let payload_b64 = b64e_json(&body.to_payload()?)?;
        let signing_input = format!("{header_b64}.{payload_b64}");

        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_b64 = Base64UrlUnpadded::encode_string(&signature);

        Ok(IssuedToken {
            token: format!("{signing_input}.{signature_b64}"),
            expiration,
        })
    }

    /// Validate structure, algorithm, signature and expiration, then return the claims.
    ///
    /// Expiration is checked with zero clock skew.
    ///
    /// # Errors
    /// Returns a [`TokenError`] describing the first check that failed.
    pub fn decode(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, TokenError> {
        let mut parts = token.split('.');
        let header_b64 = parts.next().ok_or(TokenError::Format)?;
        let payload_b64 = parts.next().ok_or(TokenError::Format)?;
        let sig_b64 = parts.next().ok_or(TokenError::Format)?;
        if parts.next().is_some() {
            return Err(TokenError::Format);
        }

        let header: TokenHeader = b64d_json(header_b64)?;
        if header.alg != ALGORITHM {
            return Err(TokenError::UnsupportedAlg(header.alg));
        }

        let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| TokenError::Base64)?;
        let mut mac = self.mac()?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let payload: Map<String, Value> = b64d_json(payload_b64)?;
        let claims = TokenClaims::from_payload(payload)?;
        if claims.exp <= now.timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        <HmacSha256 as Mac>::new_from_slice(self.signing_key.expose_secret().as_bytes())
            .map_err(|_| TokenError::Key)
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| TokenError::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}
