//! Required-field checks run before any remote call.

use crate::error::{SecretaryError, SecretaryResult};

/// Fails with `{field} cannot be empty` when `value` is missing or blank.
pub fn validate_required(value: Option<&str>, field: &str) -> SecretaryResult<()> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(SecretaryError::validation(format!("{field} cannot be empty"))),
    }
}

pub fn validate_calendar_name(name: &str) -> SecretaryResult<()> {
    validate_required(Some(name), "Calendar name")
}

pub fn validate_task_summary(summary: &str) -> SecretaryResult<()> {
    validate_required(Some(summary), "Task summary")
}

pub fn validate_event_summary(summary: &str) -> SecretaryResult<()> {
    validate_required(Some(summary), "Event summary")
}

pub fn validate_journal_summary(summary: &str) -> SecretaryResult<()> {
    validate_required(Some(summary), "Journal summary")
}

pub fn validate_journal_description(description: &str) -> SecretaryResult<()> {
    validate_required(Some(description), "Journal description")
}

pub fn validate_new_description(description: &str) -> SecretaryResult<()> {
    validate_required(Some(description), "New description")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_text() {
        assert!(validate_required(Some("x"), "Field").is_ok());
        assert!(validate_calendar_name("  Work ").is_ok());
    }

    #[test]
    fn rejects_missing_and_blank() {
        for value in [None, Some(""), Some("   "), Some("\t\n")] {
            let err = validate_required(value, "Field").unwrap_err();
            assert_eq!(err, SecretaryError::validation("Field cannot be empty"));
        }
    }

    #[test]
    fn field_names() {
        let cases: [(fn(&str) -> SecretaryResult<()>, &str); 6] = [
            (validate_calendar_name, "Calendar name"),
            (validate_task_summary, "Task summary"),
            (validate_event_summary, "Event summary"),
            (validate_journal_summary, "Journal summary"),
            (validate_journal_description, "Journal description"),
            (validate_new_description, "New description"),
        ];
        for (check, field) in cases {
            assert_eq!(check(" ").unwrap_err().to_string(), format!("{field} cannot be empty"));
        }
    }
}
