//! Stateless credential format checks used for live form feedback.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Per-field validation outcome shown next to the input.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldValidation {
    pub available: bool,
    pub message: Option<String>,
}

impl FieldValidation {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            available: true,
            message: None,
        }
    }

    #[must_use]
    pub fn rejected(message: &str) -> Self {
        Self {
            available: false,
            message: Some(message.to_string()),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PasswordChecks {
    pub length: bool,
    pub uppercase: bool,
    pub lowercase: bool,
    pub number: bool,
    pub special: bool,
}

/// Local password score: 20 points per satisfied rule, valid at 80+.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PasswordStrength {
    pub score: u8,
    pub is_valid: bool,
    pub checks: PasswordChecks,
}

pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").map_or(false, |re| re.is_match(email))
}

/// Usernames start with a letter and run 3-30 alphanumeric characters.
pub fn valid_username(username: &str) -> bool {
    Regex::new(r"^[A-Za-z][A-Za-z0-9]{2,29}$").map_or(false, |re| re.is_match(username))
}

#[must_use]
pub fn email_format(email: &str) -> FieldValidation {
    if valid_email(email) {
        FieldValidation::ok()
    } else {
        FieldValidation::rejected("Invalid email format")
    }
}

#[must_use]
pub fn username_format(username: &str) -> FieldValidation {
    if valid_username(username) {
        FieldValidation::ok()
    } else {
        FieldValidation::rejected(
            "Username must start with a letter and be 3-30 alphanumeric characters",
        )
    }
}

#[must_use]
pub fn password_strength(password: &str) -> PasswordStrength {
    let checks = PasswordChecks {
        length: password.len() >= 8,
        uppercase: password.chars().any(|c| c.is_ascii_uppercase()),
        lowercase: password.chars().any(|c| c.is_ascii_lowercase()),
        number: password.chars().any(|c| c.is_ascii_digit()),
        special: password.chars().any(|c| r#"!@#$%^&*(),.?":{}|<>"#.contains(c)),
    };

    let satisfied = [
        checks.length,
        checks.uppercase,
        checks.lowercase,
        checks.number,
        checks.special,
    ]
    .iter()
    .filter(|&&check| check)
    .count();

    let score = (satisfied as u8) * 20;

    PasswordStrength {
        score,
        is_valid: score >= 80,
        checks,
    }
}
