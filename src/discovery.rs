//! Navigable affordances for the API root.
//!
//! The set depends only on whether the caller satisfies the admin policy, so it
//! is decided here without touching the router.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Affordance {
    pub href: String,
    pub rel: String,
    pub method: String,
}

impl Affordance {
    fn new(base: &str, path: &str, rel: &str, method: &str) -> Self {
        Self {
            href: format!("{}{path}", base.trim_end_matches('/')),
            rel: rel.to_string(),
            method: method.to_string(),
        }
    }
}

/// Links for the root document: 4 for admins, 2 for everyone else.
#[must_use]
pub fn affordances(base: &str, is_admin: bool) -> Vec<Affordance> {
    let mut links = vec![
        Affordance::new(base, "/v1", "self", "GET"),
        Affordance::new(base, "/v1/authors", "authors", "GET"),
    ];

    if is_admin {
        links.push(Affordance::new(base, "/v1/authors", "author-create", "POST"));
        links.push(Affordance::new(base, "/v1/books", "book-create", "POST"));
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_gets_four_links() {
        assert_eq!(affordances("", true).len(), 4);
    }

    #[test]
    fn anonymous_gets_two_links() {
        let links = affordances("", false);
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|link| link.method == "GET"));
    }

    #[test]
    fn anonymous_set_is_a_subset_of_admin_set() {
        let admin = affordances("https://api.test", true);
        for link in affordances("https://api.test", false) {
            assert!(admin.contains(&link));
        }
    }

    #[test]
    fn base_trailing_slash_is_trimmed() {
        let links = affordances("https://api.test/", false);
        assert_eq!(links[0].href, "https://api.test/v1");
    }
}
