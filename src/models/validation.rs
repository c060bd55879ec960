use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("valid regex")
});

/// One rejected input field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Collects every field error instead of stopping at the first one.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) -> &mut Self {
        if !ok {
            self.errors.push(FieldError::new(field, message));
        }
        self
    }

    pub fn require(&mut self, field: &str, value: &str, message: &str) -> &mut Self {
        self.check(!value.trim().is_empty(), field, message)
    }

    pub fn range(
        &mut self,
        field: &str,
        value: f64,
        min: f64,
        max: f64,
        message: &str,
    ) -> &mut Self {
        let within = value.is_finite() && value >= min && value <= max;
        self.check(within, field, message)
    }

    pub fn optional_range(
        &mut self,
        field: &str,
        value: Option<f64>,
        min: f64,
        max: f64,
        message: &str,
    ) -> &mut Self {
        match value {
            Some(v) => self.range(field, v, min, max, message),
            None => self,
        }
    }

    pub fn merge(&mut self, other: Result<(), Vec<FieldError>>) -> &mut Self {
        if let Err(errors) = other {
            self.errors.extend(errors);
        }
        self
    }

    pub fn finish(&mut self) -> Result<(), Vec<FieldError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }
}

/// Trim and lower-case an email address; `None` if it is not well formed.
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    EMAIL_RE.is_match(&email).then_some(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_normalized_to_lower_case() {
        assert_eq!(
            normalize_email("  Ravi.Kumar@Plant.IO "),
            Some("ravi.kumar@plant.io".to_string())
        );
    }

    #[test]
    fn malformed_email_rejected() {
        assert_eq!(normalize_email("ravi@"), None);
        assert_eq!(normalize_email("no-at-sign.com"), None);
        assert_eq!(normalize_email("a@b"), None);
    }

    #[test]
    fn validator_collects_all_errors() {
        let result = Validator::new()
            .require("firstName", "", "First name is required")
            .range(
                "heartRate",
                20.0,
                30.0,
                250.0,
                "Heart rate must be between 30 and 250",
            )
            .range("temperature", 98.6, 90.0, 110.0, "unused")
            .finish();
        let errors = result.unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "firstName");
        assert_eq!(errors[1].field, "heartRate");
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let check = |v| Validator::new().range("x", v, 30.0, 250.0, "m").finish();
        assert!(check(30.0).is_ok());
        assert!(check(250.0).is_ok());
        assert!(check(f64::NAN).is_err());
    }
}
