//! Token composition against the claims store.
//!
//! Flow Overview:
//! 1) Start from the identity's email claim.
//! 2) Append whatever the claims store currently holds for that identity.
//! 3) Sign the concatenation with the process-wide issuer.
//!
//! Renewal runs the same composition for the email of an already validated
//! token, so claim changes since the original issuance are reflected.

use chrono::{DateTime, TimeDelta, Utc};
use std::future::Future;

use super::{
    claims::Claim,
    error::AuthError,
    principal::Principal,
    token::{IssuedToken, TokenError, TokenIssuer},
};

/// Identity-keyed claim persistence.
pub trait ClaimsStore: Send + Sync {
    /// Claims currently attached to the identity. Unknown identities have none.
    fn claims(&self, email: &str) -> impl Future<Output = Result<Vec<Claim>, AuthError>> + Send;

    /// Attach a claim. Returns `false` when the identity does not exist.
    fn add_claim(
        &self,
        email: &str,
        claim: &Claim,
    ) -> impl Future<Output = Result<bool, AuthError>> + Send;

    /// Detach every claim equal to `claim`. Returns `false` when the identity does not exist.
    fn remove_claim(
        &self,
        email: &str,
        claim: &Claim,
    ) -> impl Future<Output = Result<bool, AuthError>> + Send;
}

/// `[email] ++ store claims`, duplicates kept.
///
/// # Errors
/// Propagates claims store failures.
pub async fn compose_claims<S: ClaimsStore>(
    store: &S,
    email: &str,
) -> Result<Vec<Claim>, AuthError> {
    let mut claims = vec![Claim::email(email)];
    claims.extend(store.claims(email).await?);
    Ok(claims)
}

/// Issue a token for an identity whose credentials were already verified.
///
/// # Errors
/// Propagates claims store and signing failures.
pub async fn build_token<S: ClaimsStore>(
    issuer: &TokenIssuer,
    store: &S,
    email: &str,
) -> Result<IssuedToken, AuthError> {
    let claims = compose_claims(store, email).await?;
    Ok(issuer.issue(claims)?)
}

/// Re-issue for the authenticated caller with current claims.
///
/// The new expiration is `now + lifetime`, and always at least one second past
/// the presented token's, since `exp` has whole-second resolution.
///
/// # Errors
/// Propagates claims store and signing failures.
pub async fn renew<S: ClaimsStore>(
    issuer: &TokenIssuer,
    store: &S,
    principal: &Principal,
) -> Result<IssuedToken, AuthError> {
    let claims = compose_claims(store, &principal.email).await?;
    let expiration = renewed_expiration(issuer, principal.expiration, Utc::now())?;
    Ok(issuer.issue_expiring(claims, expiration)?)
}

fn renewed_expiration(
    issuer: &TokenIssuer,
    previous: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, TokenError> {
    let fresh = now
        .checked_add_signed(issuer.lifetime())
        .ok_or(TokenError::ExpirationRange)?;
    let Some(previous) = previous else {
        return Ok(fresh);
    };
    let floor = previous
        .checked_add_signed(TimeDelta::seconds(1))
        .ok_or(TokenError::ExpirationRange)?;
    Ok(fresh.max(floor))
}


#[cfg(test)]
mod tests {
    use super::memory::MemoryClaimsStore;
    use super::*;
    use crate::auth::claims::ClaimType;
    use secrecy::SecretString;

    fn issuer() -> Result<TokenIssuer, AuthError> {
        TokenIssuer::new(SecretString::from("accounts-test-key"), TimeDelta::days(365))
    }

    #[tokio::test]
    async fn compose_puts_email_first_and_keeps_duplicates() -> Result<(), AuthError> {
        let store = MemoryClaimsStore::default();
        store.insert_user("a@x.com").await;
        store.add_claim("a@x.com", &Claim::admin()).await?;
        store.add_claim("a@x.com", &Claim::admin()).await?;
        store.add_claim("a@x.com", &Claim::email("a@x.com")).await?;

        let claims = compose_claims(&store, "a@x.com").await?;
        assert_eq!(claims[0], Claim::email("a@x.com"));
        assert_eq!(claims.len(), 4);
        assert_eq!(
            claims
                .iter()
                .filter(|claim| claim.kind == ClaimType::IsAdmin)
                .count(),
            2
        );
        Ok(())
    }

    #[tokio::test]
    async fn unknown_identity_gets_only_email() -> Result<(), AuthError> {
        let store = MemoryClaimsStore::default();
        let claims = compose_claims(&store, "ghost@x.com").await?;
        assert_eq!(claims, vec![Claim::email("ghost@x.com")]);
        assert!(!store.add_claim("ghost@x.com", &Claim::admin()).await?);
        Ok(())
    }

    #[tokio::test]
    async fn renewal_keeps_identity_and_extends_expiration() -> anyhow::Result<()> {
        let issuer = issuer()?;
        let store = MemoryClaimsStore::default();
        store.insert_user("a@x.com").await;

        let earlier = Utc::now() - TimeDelta::seconds(30);
        let original = issuer.issue_at(compose_claims(&store, "a@x.com").await?, earlier)?;
        let principal = Principal::from_claims(issuer.decode(&original.token, Utc::now())?)?;

        let renewed = renew(&issuer, &store, &principal).await?;
        let decoded = issuer.decode(&renewed.token, Utc::now())?;
        assert_eq!(decoded.email(), Some("a@x.com"));
        assert!(renewed.expiration > original.expiration);
        Ok(())
    }

    #[tokio::test]
    async fn immediate_renewal_is_strictly_later() -> anyhow::Result<()> {
        let issuer = issuer()?;
        let store = MemoryClaimsStore::default();
        store.insert_user("a@x.com").await;

        let mut current = build_token(&issuer, &store, "a@x.com").await?;
        for _ in 0..20 {
            let principal = Principal::from_claims(issuer.decode(&current.token, Utc::now())?)?;
            let renewed = renew(&issuer, &store, &principal).await?;
            assert!(renewed.expiration > current.expiration);
            current = renewed;
        }
        Ok(())
    }

    #[test]
    fn renewed_expiration_uses_lifetime_or_previous_plus_one_second() -> anyhow::Result<()> {
        let issuer = issuer()?;
        let now = Utc::now();
        let fresh = now + TimeDelta::days(365);

        assert_eq!(renewed_expiration(&issuer, None, now)?, fresh);
        assert_eq!(
            renewed_expiration(&issuer, Some(now - TimeDelta::days(1)), now)?,
            fresh
        );
        assert_eq!(
            renewed_expiration(&issuer, Some(fresh), now)?,
            fresh + TimeDelta::seconds(1)
        );
        Ok(())
    }

    #[tokio::test]
    async fn renewal_reflects_claim_changes() -> anyhow::Result<()> {
        let issuer = issuer()?;
        let store = MemoryClaimsStore::default();
        store.insert_user("a@x.com").await;

        let original = build_token(&issuer, &store, "a@x.com").await?;
        let principal = Principal::from_claims(issuer.decode(&original.token, Utc::now())?)?;
        assert!(!principal.has_claim(&ClaimType::IsAdmin));

        store.add_claim("a@x.com", &Claim::admin()).await?;
        let renewed = renew(&issuer, &store, &principal).await?;
        let decoded = issuer.decode(&renewed.token, Utc::now())?;
        assert!(decoded.claims.contains(&Claim::admin()));

        store.remove_claim("a@x.com", &Claim::admin()).await?;
        let renewed = renew(&issuer, &store, &principal).await?;
        let decoded = issuer.decode(&renewed.token, Utc::now())?;
        assert!(!decoded.claims.contains(&Claim::admin()));
        Ok(())
    }
}
