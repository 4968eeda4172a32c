//! Credential authentication and claims-driven authorization.
//!
//! - [`password`]: PBKDF2 hashing and constant-time verification.
//! - [`token`]: HS256 compact token issuance and validation.
//! - [`policy`]: claim-presence policies evaluated against a fixed table.
//! - [`accounts`]: token composition with the claims store, and renewal.
//!
//! > **Note:** tokens default to a one year lifetime and there is no revocation
//! > list. Expiry is a timestamp comparison made when a token is presented.

pub mod accounts;
pub mod claims;
pub mod error;
pub mod password;
pub mod policy;
pub mod principal;
pub mod state;
pub mod token;

pub use accounts::ClaimsStore;
pub use claims::{Claim, ClaimType};
pub use error::AuthError;
pub use password::{HashedSecret, PasswordHasher, SecretVerifier};
pub use policy::{Decision, IS_ADMIN_POLICY, PolicyTable};
pub use principal::Principal;
pub use state::{AuthConfig, AuthState};
pub use token::{IssuedToken, TokenClaims, TokenIssuer};
