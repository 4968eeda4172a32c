use serde::{Deserialize, Serialize};
use std::fmt;

pub const EMAIL: &str = "email";
pub const IS_ADMIN: &str = "isAdmin";

/// Claim type tag: the well-known ones plus arbitrary extension claims.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ClaimType {
    Email,
    IsAdmin,
    Custom(String),
}

impl ClaimType {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Email => EMAIL,
            Self::IsAdmin => IS_ADMIN,
            Self::Custom(name) => name,
        }
    }
}

impl From<&str> for ClaimType {
    fn from(value: &str) -> Self {
        match value {
            EMAIL => Self::Email,
            IS_ADMIN => Self::IsAdmin,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<String> for ClaimType {
    fn from(value: String) -> Self {
        match value.as_str() {
            EMAIL => Self::Email,
            IS_ADMIN => Self::IsAdmin,
            _ => Self::Custom(value),
        }
    }
}

impl From<ClaimType> for String {
    fn from(value: ClaimType) -> Self {
        match value {
            ClaimType::Custom(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ClaimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Claim {
    #[serde(rename = "type")]
    pub kind: ClaimType,
    pub value: String,
}

impl Claim {
    #[must_use]
    pub fn new(kind: impl Into<ClaimType>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn email(value: impl Into<String>) -> Self {
        Self::new(ClaimType::Email, value)
    }

    /// The admin flag; only its presence matters to policies.
    #[must_use]
    pub fn admin() -> Self {
        Self::new(ClaimType::IsAdmin, "1")
    }
}

/// First email claim in a claim list, if any.
#[must_use]
pub fn find_email(claims: &[Claim]) -> Option<&str> {
    claims
        .iter()
        .find(|claim| claim.kind == ClaimType::Email)
        .map(|claim| claim.value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_tags_parse() {
        assert_eq!(ClaimType::from("email"), ClaimType::Email);
        assert_eq!(ClaimType::from("isAdmin"), ClaimType::IsAdmin);
        assert_eq!(
            ClaimType::from("tier"),
            ClaimType::Custom("tier".to_string())
        );
    }

    #[test]
    fn tags_are_case_sensitive() {
        assert_eq!(
            ClaimType::from("IsAdmin"),
            ClaimType::Custom("IsAdmin".to_string())
        );
    }

    #[test]
    fn claim_serializes_with_type_field() -> Result<(), serde_json::Error> {
        let json = serde_json::to_value(Claim::admin())?;
        assert_eq!(json, serde_json::json!({"type": "isAdmin", "value": "1"}));
        Ok(())
    }

    #[test]
    fn find_email_returns_first_match() {
        let claims = vec![
            Claim::admin(),
            Claim::email("a@x.com"),
            Claim::email("b@x.com"),
        ];
        assert_eq!(find_email(&claims), Some("a@x.com"));
        assert_eq!(find_email(&[Claim::admin()]), None);
    }
}
