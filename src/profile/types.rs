//! Profile row shape and the questionnaire mapping.
//!
//! The questionnaire collects free-text and choice answers; the row API
//! stores normalized columns. Mapping is forgiving on the way in (bad
//! numbers become NULL, unknown tri-state answers become NULL, missing
//! lists become empty) and string-shaped on the way out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One row of the identity/profile table, keyed uniquely by `user_id`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ProfileRecord {
    #[serde(default)]
    pub id: Option<i64>,
    pub user_id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub google_id: Option<String>,
    #[serde(default)]
    pub picture_url: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub household_members: Option<i32>,
    #[serde(default)]
    pub monthly_income: Option<f64>,
    #[serde(default)]
    pub has_debt: Option<bool>,
    #[serde(default)]
    pub debt_amount: Option<f64>,
    #[serde(default)]
    pub savings_goal: Option<String>,
    #[serde(default)]
    pub primary_expenses: Option<Vec<String>>,
    #[serde(default)]
    pub budgeting_experience: Option<String>,
    #[serde(default)]
    pub financial_goals: Option<Vec<String>>,
    #[serde(default)]
    pub onboarding_completed: Option<bool>,
    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Partial row used as an upsert/update body; absent fields stay untouched.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ProfileChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub household_members: Option<Option<i32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_income: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_debt: Option<Option<bool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debt_amount: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub savings_goal: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_expenses: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budgeting_experience: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub financial_goals: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onboarding_completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProfileChanges {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Questionnaire answers as the form holds them: strings and string lists.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionnaireForm {
    pub household_members: String,
    pub monthly_income: String,
    /// `"yes"`, `"no"`, or empty for unanswered.
    pub has_debt: String,
    pub debt_amount: String,
    pub savings_goal: String,
    pub primary_expenses: Vec<String>,
    pub budgeting_experience: String,
    pub financial_goals: Vec<String>,
}

fn parse_integer(value: &str) -> Option<i32> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse().ok()
}

fn parse_decimal(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse().ok().filter(|n: &f64| n.is_finite())
}

fn parse_tristate(value: &str) -> Option<bool> {
    match value {
        "yes" => Some(true),
        "no" => Some(false),
        _ => None,
    }
}

/// Form → partial row. `set_onboarding` is only passed by the save path;
/// plain updates leave the flag alone.
#[must_use]
pub fn form_to_changes(
    form: &QuestionnaireForm,
    user_id: Uuid,
    set_onboarding: bool,
) -> ProfileChanges {
    let mut changes = ProfileChanges {
        user_id: Some(user_id),
        household_members: Some(parse_integer(&form.household_members)),
        monthly_income: Some(parse_decimal(&form.monthly_income)),
        has_debt: Some(parse_tristate(&form.has_debt)),
        debt_amount: Some(parse_decimal(&form.debt_amount)),
        savings_goal: Some(if form.savings_goal.is_empty() {
            None
        } else {
            Some(form.savings_goal.clone())
        }),
        primary_expenses: Some(form.primary_expenses.clone()),
        budgeting_experience: Some(if form.budgeting_experience.is_empty() {
            None
        } else {
            Some(form.budgeting_experience.clone())
        }),
        financial_goals: Some(form.financial_goals.clone()),
        ..ProfileChanges::default()
    };

    if set_onboarding {
        changes.onboarding_completed = Some(true);
    }

    changes
}

/// Row → form, with empty-string defaults for NULL columns.
#[must_use]
pub fn record_to_form(record: &ProfileRecord) -> QuestionnaireForm {
    QuestionnaireForm {
        household_members: record
            .household_members
            .map(|n| n.to_string())
            .unwrap_or_default(),
        monthly_income: record
            .monthly_income
            .map(|n| n.to_string())
            .unwrap_or_default(),
        has_debt: match record.has_debt {
            Some(true) => "yes".to_string(),
            Some(false) => "no".to_string(),
            None => String::new(),
        },
        debt_amount: record
            .debt_amount
            .map(|n| n.to_string())
            .unwrap_or_default(),
        savings_goal: record.savings_goal.clone().unwrap_or_default(),
        primary_expenses: record.primary_expenses.clone().unwrap_or_default(),
        budgeting_experience: record.budgeting_experience.clone().unwrap_or_default(),
        financial_goals: record.financial_goals.clone().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_form() -> QuestionnaireForm {
        QuestionnaireForm {
            household_members: "3".to_string(),
            monthly_income: "4200.5".to_string(),
            has_debt: "yes".to_string(),
            debt_amount: "1200".to_string(),
            savings_goal: "Emergency fund".to_string(),
            primary_expenses: vec!["rent".to_string(), "food".to_string()],
            budgeting_experience: "beginner".to_string(),
            financial_goals: vec!["save".to_string()],
        }
    }

    #[test]
    fn numeric_fields_parse_with_invalid_to_null() {
        let mut form = sample_form();
        form.household_members = "not-a-number".to_string();
        form.monthly_income = "".to_string();
        form.debt_amount = "12oo".to_string();

        let changes = form_to_changes(&form, Uuid::new_v4(), false);
        assert_eq!(changes.household_members, Some(None));
        assert_eq!(changes.monthly_income, Some(None));
        assert_eq!(changes.debt_amount, Some(None));
    }

    #[test]
    fn tristate_debt_flag() {
        let mut form = sample_form();
        assert_eq!(
            form_to_changes(&form, Uuid::new_v4(), false).has_debt,
            Some(Some(true))
        );

        form.has_debt = "no".to_string();
        assert_eq!(
            form_to_changes(&form, Uuid::new_v4(), false).has_debt,
            Some(Some(false))
        );

        form.has_debt = String::new();
        assert_eq!(
            form_to_changes(&form, Uuid::new_v4(), false).has_debt,
            Some(None)
        );
    }

    #[test]
    fn onboarding_flag_only_on_save_path() {
        let form = sample_form();
        let saved = form_to_changes(&form, Uuid::new_v4(), true);
        assert_eq!(saved.onboarding_completed, Some(true));

        let updated = form_to_changes(&form, Uuid::new_v4(), false);
        assert_eq!(updated.onboarding_completed, None);
    }

    #[test]
    fn absent_fields_never_serialize() {
        let changes = ProfileChanges {
            user_id: Some(Uuid::new_v4()),
            last_login_at: Some(Utc::now()),
            ..ProfileChanges::default()
        };

        let body = serde_json::to_value(&changes).expect("json");
        let object = body.as_object().expect("object");
        assert_eq!(object.len(), 2);
        assert!(object.contains_key("user_id"));
        assert!(object.contains_key("last_login_at"));
    }

    #[test]
    fn round_trip_through_record() {
        let form = sample_form();
        let changes = form_to_changes(&form, Uuid::new_v4(), true);

        let record = ProfileRecord {
            user_id: changes.user_id.expect("user_id"),
            household_members: changes.household_members.flatten(),
            monthly_income: changes.monthly_income.flatten(),
            has_debt: changes.has_debt.flatten(),
            debt_amount: changes.debt_amount.flatten(),
            savings_goal: changes.savings_goal.clone().flatten(),
            primary_expenses: changes.primary_expenses.clone(),
            budgeting_experience: changes.budgeting_experience.clone().flatten(),
            financial_goals: changes.financial_goals.clone(),
            onboarding_completed: changes.onboarding_completed,
            ..ProfileRecord::default()
        };

        assert_eq!(record_to_form(&record), form);
    }

    #[test]
    fn record_with_nulls_maps_to_empty_form() {
        let record = ProfileRecord {
            user_id: Uuid::new_v4(),
            ..ProfileRecord::default()
        };

        assert_eq!(record_to_form(&record), QuestionnaireForm::default());
    }
}
