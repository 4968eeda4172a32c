use anyhow::{Context, Result, anyhow};
use axum::http::HeaderValue;
use clap::{Arg, ArgMatches, Command};
use url::Url;

pub const ARG_PORT: &str = "port";
pub const ARG_DSN: &str = "dsn";
pub const ARG_ALLOWED_ORIGIN: &str = "allowed-origin";

#[derive(Debug)]
pub struct Options {
    pub port: u16,
    pub dsn: String,
    pub allowed_origin: HeaderValue,
}

impl Options {
    /// Parse listener, database and CORS arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the DSN is missing or the allowed origin is not an absolute URL.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
        let dsn = matches
            .get_one::<String>(ARG_DSN)
            .cloned()
            .filter(|v| !v.trim().is_empty())
            .context("missing required argument: --dsn")?;
        let allowed_origin = matches
            .get_one::<String>(ARG_ALLOWED_ORIGIN)
            .map(String::as_str)
            .unwrap_or(DEFAULT_ALLOWED_ORIGIN);

        Ok(Self {
            port,
            dsn,
            allowed_origin: origin_header(allowed_origin)?,
        })
    }
}

const DEFAULT_ALLOWED_ORIGIN: &str = "https://apirequest.io";

/// Reduce a URL to `scheme://host[:port]` for the CORS allow list.
fn origin_header(url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(url).with_context(|| format!("Invalid allowed origin: {url}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Allowed origin must include a valid host: {url}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build allowed origin header")
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("AUTORES_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long(ARG_DSN)
                .help("Database connection string")
                .env("AUTORES_DSN")
                .required(true),
        )
        .arg(
            Arg::new(ARG_ALLOWED_ORIGIN)
                .long(ARG_ALLOWED_ORIGIN)
                .help("Origin allowed by CORS")
                .env("AUTORES_ALLOWED_ORIGIN")
                .default_value(DEFAULT_ALLOWED_ORIGIN),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_header_strips_path() -> Result<()> {
        assert_eq!(
            origin_header("https://apirequest.io/some/path")?,
            HeaderValue::from_static("https://apirequest.io")
        );
        assert_eq!(
            origin_header("http://localhost:3000/")?,
            HeaderValue::from_static("http://localhost:3000")
        );
        Ok(())
    }

    #[test]
    fn origin_header_rejects_relative() {
        assert!(origin_header("apirequest.io").is_err());
    }
}
