//! Authentication core: session state, orchestrated operations, guards.

pub mod capability;
pub mod classify;
pub mod client;
pub mod guards;
pub mod recovery;
pub mod service;
pub mod state;
pub mod types;
pub mod validate;

pub use self::capability::{AuthBackend, BackendError};
pub use self::classify::AuthError;
pub use self::client::HostedAuthClient;
pub use self::guards::{route, AuthPhase, RouteAction};
pub use self::recovery::RecoveryTokens;
pub use self::service::{AuthService, SignUpOutcome, CONFIRMATION_PENDING_MESSAGE};
pub use self::state::{SessionChanges, SessionState, SessionStore};
pub use self::types::{AuthChange, AuthUser, Session, SignUpPayload};
pub use self::validate::{FieldValidation, PasswordChecks, PasswordStrength};
