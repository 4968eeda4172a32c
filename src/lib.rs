//! # Autores (authors and books catalog API)
//!
//! A small CRUD service for authors and books with claims-based access control.
//!
//! ## Authentication
//!
//! Passwords are stored as PBKDF2-HMAC-SHA256 hashes with a per-user random
//! salt. A successful register or login returns an HS256-signed bearer token
//! carrying the user's email plus every claim stored for that user. Tokens are
//! renewed by presenting a valid one; renewal re-reads the claims store.
//!
//! ## Authorization
//!
//! Policies map a name to a required claim type, for example `IsAdmin` requires
//! `isAdmin`. Reading the author and book lists is anonymous; managing authors,
//! creating books and granting admin require `IsAdmin`.
//!
//! ## Pagination
//!
//! List endpoints take `page` and `page_size` query parameters. The total
//! number of records travels in the `x-total-count` response header.

pub mod api;
pub mod auth;
pub mod cli;
pub mod discovery;
pub mod pagination;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
