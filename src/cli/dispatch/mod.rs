//! Command-line argument dispatch.
//!
//! Parses validated CLI matches into the server action with its full
//! configuration.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{auth, server};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let server_opts = server::Options::parse(matches)?;
    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port: server_opts.port,
        dsn: server_opts.dsn,
        allowed_origin: server_opts.allowed_origin,
        jwt_key: auth_opts.jwt_key,
        token_lifetime_days: auth_opts.token_lifetime_days,
        bootstrap_admins: auth_opts.bootstrap_admins,
    }))
}
