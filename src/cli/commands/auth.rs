use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;

use crate::auth::token::DEFAULT_LIFETIME_DAYS;

pub const ARG_JWT_KEY: &str = "jwt-key";
pub const ARG_TOKEN_LIFETIME_DAYS: &str = "token-lifetime-days";
pub const ARG_BOOTSTRAP_ADMIN: &str = "bootstrap-admin";

pub struct Options {
    pub jwt_key: SecretString,
    pub token_lifetime_days: i64,
    pub bootstrap_admins: Vec<String>,
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("jwt_key", &"***")
            .field("token_lifetime_days", &self.token_lifetime_days)
            .field("bootstrap_admins", &self.bootstrap_admins)
            .finish()
    }
}

impl Options {
    /// Parse token signing arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the signing key is missing or blank.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let jwt_key = matches
            .get_one::<String>(ARG_JWT_KEY)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_JWT_KEY}"))?;

        let token_lifetime_days = matches
            .get_one::<i64>(ARG_TOKEN_LIFETIME_DAYS)
            .copied()
            .unwrap_or(DEFAULT_LIFETIME_DAYS);

        let bootstrap_admins = matches
            .get_many::<String>(ARG_BOOTSTRAP_ADMIN)
            .map(|values| {
                values
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            jwt_key: SecretString::from(jwt_key.clone()),
            token_lifetime_days,
            bootstrap_admins,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_KEY)
                .long(ARG_JWT_KEY)
                .help("HMAC-SHA256 key used to sign and verify bearer tokens")
                .env("AUTORES_JWT_KEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_TOKEN_LIFETIME_DAYS)
                .long(ARG_TOKEN_LIFETIME_DAYS)
                .help("Bearer token lifetime in days")
                .env("AUTORES_TOKEN_LIFETIME_DAYS")
                .default_value("365")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_BOOTSTRAP_ADMIN)
                .long(ARG_BOOTSTRAP_ADMIN)
                .help("Emails granted the admin claim when they register (comma separated)")
                .env("AUTORES_BOOTSTRAP_ADMIN")
                .value_delimiter(',')
                .action(ArgAction::Append),
        )
}
