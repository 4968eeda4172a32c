//! Authenticated principal extraction from `Authorization: Bearer` tokens.
//!
//! Flow Overview: read the bearer token, validate signature and expiration
//! with the shared issuer, and hand handlers a principal carrying the token's
//! claims. Routes that stay anonymous simply do not extract a principal.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

use super::{
    claims::{Claim, ClaimType},
    error::AuthError,
    policy::{Decision, PolicyTable},
    state::AuthState,
    token::TokenClaims,
};

#[derive(Clone, Debug)]
pub struct Principal {
    pub email: String,
    pub claims: Vec<Claim>,
    pub expiration: Option<DateTime<Utc>>,
}

impl Principal {
    /// # Errors
    /// Returns [`AuthError::ExpiredOrInvalidToken`] when the token has no email claim.
    pub fn from_claims(token: TokenClaims) -> Result<Self, AuthError> {
        let email = token
            .email()
            .map(str::to_string)
            .ok_or(AuthError::ExpiredOrInvalidToken)?;
        let expiration = token.expiration();
        Ok(Self {
            email,
            claims: token.claims,
            expiration,
        })
    }

    #[must_use]
    pub fn has_claim(&self, kind: &ClaimType) -> bool {
        self.claims.iter().any(|claim| &claim.kind == kind)
    }

    #[must_use]
    pub fn evaluate(&self, policies: &PolicyTable, policy: &str) -> Decision {
        policies.evaluate(&self.claims, policy)
    }

    /// # Errors
    /// Returns [`AuthError::PolicyDenied`] when the policy is not satisfied.
    pub fn ensure(&self, policies: &PolicyTable, policy: &str) -> Result<(), AuthError> {
        policies.ensure(&self.claims, policy)
    }
}

/// Pull the raw token out of `Authorization: Bearer <token>`.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() { None } else { Some(token) }
}

/// Validate the bearer token in `headers` into a principal.
///
/// # Errors
/// Returns [`AuthError::ExpiredOrInvalidToken`] for a missing, malformed,
/// badly signed or expired token.
pub fn authenticate(state: &AuthState, headers: &HeaderMap) -> Result<Principal, AuthError> {
    let token = bearer_token(headers).ok_or(AuthError::ExpiredOrInvalidToken)?;
    let claims = state.issuer().decode(token, Utc::now()).map_err(|err| {
        debug!("Bearer token rejected: {err}");
        AuthError::from(err)
    })?;
    Principal::from_claims(claims)
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = parts
            .extensions
            .get::<Arc<AuthState>>()
            .cloned()
            .ok_or_else(|| AuthError::Configuration("auth state extension missing".to_string()))?;
        authenticate(&auth_state, &parts.headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthConfig, policy::IS_ADMIN_POLICY};
    use axum::http::HeaderValue;
    use secrecy::SecretString;

    fn state() -> Result<AuthState, AuthError> {
        AuthState::from_config(
            AuthConfig::new(SecretString::from("principal-test-key")).with_kdf_iterations(1_000),
        )
    }

    fn headers_with(value: &str) -> anyhow::Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value)?);
        Ok(headers)
    }

    #[test]
    fn bearer_token_parses_scheme_case_insensitively() -> anyhow::Result<()> {
        assert_eq!(bearer_token(&headers_with("Bearer abc")?), Some("abc"));
        assert_eq!(bearer_token(&headers_with("bearer abc")?), Some("abc"));
        assert_eq!(bearer_token(&headers_with("Basic abc")?), None);
        assert_eq!(bearer_token(&headers_with("Bearer ")?), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
        Ok(())
    }

    #[test]
    fn authenticate_accepts_issued_token() -> anyhow::Result<()> {
        let state = state()?;
        let issued = state
            .issuer()
            .issue(vec![Claim::email("a@x.com"), Claim::admin()])?;
        let principal = authenticate(&state, &headers_with(&format!("Bearer {}", issued.token))?)?;
        assert_eq!(principal.email, "a@x.com");
        assert!(principal.has_claim(&ClaimType::IsAdmin));
        assert_eq!(
            principal.evaluate(state.policies(), IS_ADMIN_POLICY),
            Decision::Allow
        );
        Ok(())
    }

    #[test]
    fn authenticate_rejects_missing_and_garbage_tokens() -> anyhow::Result<()> {
        let state = state()?;
        assert!(matches!(
            authenticate(&state, &HeaderMap::new()),
            Err(AuthError::ExpiredOrInvalidToken)
        ));
        assert!(matches!(
            authenticate(&state, &headers_with("Bearer not.a.token")?),
            Err(AuthError::ExpiredOrInvalidToken)
        ));
        Ok(())
    }

    #[test]
    fn token_without_email_is_rejected() -> anyhow::Result<()> {
        let state = state()?;
        let issued = state.issuer().issue(vec![Claim::admin()])?;
        assert!(matches!(
            authenticate(&state, &headers_with(&format!("Bearer {}", issued.token))?),
            Err(AuthError::ExpiredOrInvalidToken)
        ));
        Ok(())
    }

    #[test]
    fn ensure_denies_without_admin_claim() -> anyhow::Result<()> {
        let state = state()?;
        let issued = state.issuer().issue(vec![Claim::email("a@x.com")])?;
        let principal = authenticate(&state, &headers_with(&format!("Bearer {}", issued.token))?)?;
        assert!(matches!(
            principal.ensure(state.policies(), IS_ADMIN_POLICY),
            Err(AuthError::PolicyDenied)
        ));
        Ok(())
    }
}
