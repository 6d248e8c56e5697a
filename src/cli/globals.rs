use secrecy::SecretString;

/// Default CORS allow-list: the local development frontends.
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 4] = [
    "http://localhost:5174",
    "http://127.0.0.1:5174",
    "http://localhost:5173",
    "http://127.0.0.1:5173",
];

pub const DEFAULT_SESSION_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone)]
pub struct GlobalArgs {
    /// Base URL of the hosted auth/database service.
    pub backend_url: String,
    /// Service-role API key for row operations.
    pub service_key: SecretString,
    pub google_client_id: String,
    pub google_client_secret: SecretString,
    /// Signs relay session tokens.
    pub session_secret: SecretString,
    pub session_ttl_days: i64,
    pub allowed_origins: Vec<String>,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(backend_url: String) -> Self {
        Self {
            backend_url,
            service_key: SecretString::default(),
            google_client_id: String::new(),
            google_client_secret: SecretString::default(),
            session_secret: SecretString::default(),
            session_ttl_days: DEFAULT_SESSION_TTL_DAYS,
            allowed_origins: DEFAULT_ALLOWED_ORIGINS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}
