//! Claim-presence authorization policies.
//!
//! A policy names a claim type that must be present on the caller; the value of
//! the claim is irrelevant. The table is built once at startup and never mutated.

use std::collections::HashMap;

use super::{
    claims::{Claim, ClaimType},
    error::AuthError,
};

pub const IS_ADMIN_POLICY: &str = "IsAdmin";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }
}

#[derive(Clone, Debug)]
pub struct PolicyTable {
    required: HashMap<String, ClaimType>,
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self {
            required: HashMap::from([(IS_ADMIN_POLICY.to_string(), ClaimType::IsAdmin)]),
        }
    }
}

impl PolicyTable {
    /// Build a table from `(policy, required claim type)` pairs.
    ///
    /// # Errors
    /// Returns [`AuthError::Configuration`] for empty names or duplicate policies.
    pub fn from_pairs<I, P, C>(pairs: I) -> Result<Self, AuthError>
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        let mut required = HashMap::new();
        for (policy, claim_type) in pairs {
            let policy = policy.into();
            let claim_type = claim_type.into();
            if policy.trim().is_empty() || claim_type.trim().is_empty() {
                return Err(AuthError::Configuration(
                    "policy and claim type names must not be empty".to_string(),
                ));
            }
            if required.contains_key(&policy) {
                return Err(AuthError::Configuration(format!(
                    "duplicate policy: {policy}"
                )));
            }
            required.insert(policy, ClaimType::from(claim_type));
        }
        Ok(Self { required })
    }

    #[must_use]
    pub fn required_claim(&self, policy: &str) -> Option<&ClaimType> {
        self.required.get(policy)
    }

    /// Allow iff a claim of the policy's required type is present.
    /// Unknown policies deny.
    #[must_use]
    pub fn evaluate(&self, claims: &[Claim], policy: &str) -> Decision {
        match self.required.get(policy) {
            Some(required) if claims.iter().any(|claim| &claim.kind == required) => {
                Decision::Allow
            }
            _ => Decision::Deny,
        }
    }

    /// [`Self::evaluate`] as a `Result` for handlers.
    ///
    /// # Errors
    /// Returns [`AuthError::PolicyDenied`] on deny.
    pub fn ensure(&self, claims: &[Claim], policy: &str) -> Result<(), AuthError> {
        if self.evaluate(claims, policy).is_allowed() {
            Ok(())
        } else {
            Err(AuthError::PolicyDenied)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_claim_allows_is_admin() {
        let table = PolicyTable::default();
        let claims = vec![Claim::email("a@x.com"), Claim::admin()];
        assert_eq!(table.evaluate(&claims, IS_ADMIN_POLICY), Decision::Allow);
    }

    #[test]
    fn claim_value_is_irrelevant() {
        let table = PolicyTable::default();
        let claims = vec![Claim::new(ClaimType::IsAdmin, "")];
        assert_eq!(table.evaluate(&claims, IS_ADMIN_POLICY), Decision::Allow);
    }

    #[test]
    fn missing_claim_denies() {
        let table = PolicyTable::default();
        let claims = vec![Claim::email("a@x.com"), Claim::new("isadmin", "1")];
        assert_eq!(table.evaluate(&claims, IS_ADMIN_POLICY), Decision::Deny);
        assert_eq!(table.evaluate(&[], IS_ADMIN_POLICY), Decision::Deny);
    }

    #[test]
    fn unknown_policy_denies() {
        let table = PolicyTable::default();
        assert_eq!(table.evaluate(&[Claim::admin()], "IsSeller"), Decision::Deny);
    }

    #[test]
    fn allow_iff_required_type_present() {
        let table = PolicyTable::from_pairs([("IsAdmin", "isAdmin"), ("IsSeller", "isSeller")])
            .unwrap_or_default();
        let sets: Vec<Vec<Claim>> = vec![
            vec![],
            vec![Claim::admin()],
            vec![Claim::new("isSeller", "yes")],
            vec![Claim::admin(), Claim::new("isSeller", "yes")],
            vec![Claim::email("a@x.com"), Claim::admin(), Claim::admin()],
        ];
        for claims in &sets {
            for policy in ["IsAdmin", "IsSeller"] {
                let required = table.required_claim(policy);
                let expected = claims.iter().any(|claim| Some(&claim.kind) == required);
                assert_eq!(
                    table.evaluate(claims, policy).is_allowed(),
                    expected,
                    "{policy} with {claims:?}"
                );
            }
        }
    }

    #[test]
    fn ensure_maps_deny_to_policy_denied() {
        let table = PolicyTable::default();
        assert!(table.ensure(&[Claim::admin()], IS_ADMIN_POLICY).is_ok());
        assert!(matches!(
            table.ensure(&[], IS_ADMIN_POLICY),
            Err(AuthError::PolicyDenied)
        ));
    }

    #[test]
    fn from_pairs_rejects_malformed_tables() {
        assert!(matches!(
            PolicyTable::from_pairs([("", "isAdmin")]),
            Err(AuthError::Configuration(_))
        ));
        assert!(matches!(
            PolicyTable::from_pairs([("IsAdmin", " ")]),
            Err(AuthError::Configuration(_))
        ));
        assert!(matches!(
            PolicyTable::from_pairs([("IsAdmin", "isAdmin"), ("IsAdmin", "other")]),
            Err(AuthError::Configuration(_))
        ));
    }
}
