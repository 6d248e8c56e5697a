//! Maps validated CLI matches to an action.

use crate::cli::actions::{server, Action};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let required = |name: &str| -> Result<String> {
        matches
            .get_one::<String>(name)
            .cloned()
            .with_context(|| format!("missing required argument: --{name}"))
    };

    Ok(Action::Server(server::Args {
        port: matches.get_one::<u16>("port").copied().unwrap_or(5000),
        backend_url: required("backend-url")?,
        service_key: SecretString::from(required("service-key")?),
        google_client_id: required("google-client-id")?,
        google_client_secret: SecretString::from(required("google-client-secret")?),
        session_secret: SecretString::from(required("session-secret")?),
        session_ttl_days: matches
            .get_one::<i64>("session-ttl-days")
            .copied()
            .unwrap_or(crate::cli::globals::DEFAULT_SESSION_TTL_DAYS),
        allowed_origins: matches
            .get_many::<String>("allowed-origin")
            .map(|values| values.cloned().collect())
            .unwrap_or_default(),
    }))
}
