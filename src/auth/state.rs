//! Auth configuration and the immutable state shared by every request.

use chrono::TimeDelta;
use secrecy::SecretString;

use super::{
    error::AuthError,
    password::{DEFAULT_ITERATIONS, PasswordHasher},
    policy::PolicyTable,
    token::{DEFAULT_LIFETIME_DAYS, TokenIssuer},
};

#[derive(Clone, Debug)]
pub struct AuthConfig {
    signing_key: SecretString,
    token_lifetime_days: i64,
    kdf_iterations: u32,
    policies: PolicyTable,
    bootstrap_admins: Vec<String>,
}

impl AuthConfig {
    #[must_use]
    pub fn new(signing_key: SecretString) -> Self {
        Self {
            signing_key,
            token_lifetime_days: DEFAULT_LIFETIME_DAYS,
            kdf_iterations: DEFAULT_ITERATIONS,
            policies: PolicyTable::default(),
            bootstrap_admins: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_token_lifetime_days(mut self, days: i64) -> Self {
        self.token_lifetime_days = days;
        self
    }

    #[must_use]
    pub fn with_kdf_iterations(mut self, iterations: u32) -> Self {
        self.kdf_iterations = iterations;
        self
    }

    #[must_use]
    pub fn with_policies(mut self, policies: PolicyTable) -> Self {
        self.policies = policies;
        self
    }

    /// Emails that receive the admin claim when they register.
    #[must_use]
    pub fn with_bootstrap_admins(mut self, emails: Vec<String>) -> Self {
        self.bootstrap_admins = emails
            .into_iter()
            .map(|email| email.trim().to_lowercase())
            .filter(|email| !email.is_empty())
            .collect();
        self
    }

    #[must_use]
    pub const fn token_lifetime_days(&self) -> i64 {
        self.token_lifetime_days
    }
}

/// Hasher, issuer and policy table, built once at startup.
#[derive(Debug)]
pub struct AuthState {
    hasher: PasswordHasher,
    issuer: TokenIssuer,
    policies: PolicyTable,
    bootstrap_admins: Vec<String>,
}

impl AuthState {
    /// # Errors
    /// Returns [`AuthError::Configuration`] for an empty signing key, a
    /// non-positive token lifetime or zero KDF iterations.
    pub fn from_config(config: AuthConfig) -> Result<Self, AuthError> {
        if config.kdf_iterations == 0 {
            return Err(AuthError::Configuration(
                "KDF iteration count must be positive".to_string(),
            ));
        }
        let lifetime = TimeDelta::try_days(config.token_lifetime_days).ok_or_else(|| {
            AuthError::Configuration("token lifetime out of range".to_string())
        })?;
        let issuer = TokenIssuer::new(config.signing_key, lifetime)?;
        Ok(Self {
            hasher: PasswordHasher::new(config.kdf_iterations),
            issuer,
            policies: config.policies,
            bootstrap_admins: config.bootstrap_admins,
        })
    }

    #[must_use]
    pub const fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    #[must_use]
    pub const fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    #[must_use]
    pub const fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    #[must_use]
    pub fn is_bootstrap_admin(&self, email_normalized: &str) -> bool {
        self.bootstrap_admins
            .iter()
            .any(|email| email == email_normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_long_lived_tokens() -> Result<(), AuthError> {
        let config = AuthConfig::new(SecretString::from("key"));
        assert_eq!(config.token_lifetime_days(), 365);
        let state = AuthState::from_config(config)?;
        assert_eq!(state.issuer().lifetime(), TimeDelta::days(365));
        assert_eq!(state.hasher().iterations(), 10_000);
        Ok(())
    }

    #[test]
    fn empty_signing_key_fails_startup() {
        let result = AuthState::from_config(AuthConfig::new(SecretString::from("")));
        assert!(matches!(result, Err(AuthError::Configuration(_))));
    }

    #[test]
    fn zero_lifetime_fails_startup() {
        let config = AuthConfig::new(SecretString::from("key")).with_token_lifetime_days(0);
        assert!(matches!(
            AuthState::from_config(config),
            Err(AuthError::Configuration(_))
        ));
    }

    #[test]
    fn zero_iterations_fail_startup() {
        let config = AuthConfig::new(SecretString::from("key")).with_kdf_iterations(0);
        assert!(matches!(
            AuthState::from_config(config),
            Err(AuthError::Configuration(_))
        ));
    }

    #[test]
    fn bootstrap_admins_are_normalized() -> Result<(), AuthError> {
        let config = AuthConfig::new(SecretString::from("key")).with_bootstrap_admins(vec![
            " Admin@Example.com ".to_string(),
            String::new(),
        ]);
        let state = AuthState::from_config(config)?;
        assert!(state.is_bootstrap_admin("admin@example.com"));
        assert!(!state.is_bootstrap_admin(""));
        Ok(())
    }
}
