//! Translation of provider error wording into user-facing categories.
//!
//! The hosted service reports failures as free-text messages, so the
//! mapping is substring-based and coupled to the provider's wording. Every
//! pattern lives in the tables below; call sites never match on message
//! text themselves. Unmatched messages pass through verbatim so changed
//! provider wording surfaces instead of being silently bucketed.

use crate::auth::capability::BackendError;
use thiserror::Error;

/// User-facing authentication failure. `Display` is the exact message the
/// UI renders.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error(
        "This email is already registered. Please sign in instead or use a different email address."
    )]
    AlreadyRegistered,
    #[error("Please enter a valid email address.")]
    InvalidEmail,
    #[error("Password is too weak. Please choose a stronger password with at least 8 characters.")]
    WeakPassword,
    #[error("Too many attempts. Please wait a few minutes before trying again.")]
    RateLimited,
    #[error("Username is already taken")]
    UsernameTaken,
    #[error("Invalid email or password. Please check your credentials and try again.")]
    InvalidCredentials,
    #[error("Please check your email and click the confirmation link before signing in.")]
    EmailUnconfirmed,
    #[error("Account not found. Please check your email or create a new account.")]
    AccountNotFound,
    #[error("Your account has been disabled. Please contact support for assistance.")]
    AccountDisabled,
    /// Passthrough: the raw provider message, rendered unchanged.
    #[error("{0}")]
    Backend(String),
}

/// Postgres unique-violation code reported by the row API.
const UNIQUE_VIOLATION: &str = "23505";

struct Rule {
    needles: &'static [&'static str],
    /// When true every needle must match; otherwise any one suffices.
    all: bool,
    category: fn() -> AuthError,
}

const SIGN_UP_RULES: &[Rule] = &[
    Rule {
        needles: &["User already registered", "already exists"],
        all: false,
        category: || AuthError::AlreadyRegistered,
    },
    Rule {
        needles: &["Invalid email"],
        all: false,
        category: || AuthError::InvalidEmail,
    },
    Rule {
        needles: &["Password", "weak"],
        all: true,
        category: || AuthError::WeakPassword,
    },
    Rule {
        needles: &["Too many requests", "rate limit"],
        all: false,
        category: || AuthError::RateLimited,
    },
];

const SIGN_IN_RULES: &[Rule] = &[
    Rule {
        needles: &["Invalid login credentials", "Invalid email or password"],
        all: false,
        category: || AuthError::InvalidCredentials,
    },
    Rule {
        needles: &["Email not confirmed"],
        all: false,
        category: || AuthError::EmailUnconfirmed,
    },
    Rule {
        needles: &["User not found", "does not exist"],
        all: false,
        category: || AuthError::AccountNotFound,
    },
    Rule {
        needles: &["Too many requests", "rate limit"],
        all: false,
        category: || AuthError::RateLimited,
    },
    Rule {
        needles: &["Account disabled"],
        all: false,
        category: || AuthError::AccountDisabled,
    },
];

fn apply(rules: &[Rule], message: &str) -> AuthError {
    for rule in rules {
        let hit = if rule.all {
            rule.needles.iter().all(|needle| message.contains(needle))
        } else {
            rule.needles.iter().any(|needle| message.contains(needle))
        };
        if hit {
            return (rule.category)();
        }
    }
    AuthError::Backend(message.to_string())
}

#[must_use]
pub fn classify_sign_up(error: &BackendError) -> AuthError {
    apply(SIGN_UP_RULES, error.message())
}

#[must_use]
pub fn classify_sign_in(error: &BackendError) -> AuthError {
    apply(SIGN_IN_RULES, error.message())
}

/// Username-uniqueness conflict on the identity row: either the unique
/// violation code or wording that names the username column.
#[must_use]
pub fn is_username_conflict(error: &BackendError) -> bool {
    if error.code() == Some(UNIQUE_VIOLATION) {
        return true;
    }
    let message = error.message();
    message.contains("username")
        && (message.contains("duplicate") || message.contains("already exists"))
}

/// Generic passthrough for operations without a dedicated ladder.
#[must_use]
pub fn passthrough(error: &BackendError) -> AuthError {
    AuthError::Backend(error.message().to_string())
}
