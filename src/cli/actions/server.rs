use crate::cli::{actions::Action, globals::GlobalArgs};
use crate::relay;
use anyhow::Result;
use secrecy::SecretString;

/// Everything the server action needs, resolved from CLI/env.
#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub backend_url: String,
    pub service_key: SecretString,
    pub google_client_id: String,
    pub google_client_secret: SecretString,
    pub session_secret: SecretString,
    pub session_ttl_days: i64,
    pub allowed_origins: Vec<String>,
}

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    let Action::Server(args) = action;

    let mut globals = GlobalArgs::new(args.backend_url);
    globals.service_key = args.service_key;
    globals.google_client_id = args.google_client_id;
    globals.google_client_secret = args.google_client_secret;
    globals.session_secret = args.session_secret;
    globals.session_ttl_days = args.session_ttl_days;
    if !args.allowed_origins.is_empty() {
        globals.allowed_origins = args.allowed_origins;
    }

    relay::new(args.port, globals).await?;

    Ok(())
}
