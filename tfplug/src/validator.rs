//! Attribute validators run by `Schema::validate`

use crate::types::{AttributePath, Diagnostic, Dynamic};

pub trait Validator: Send + Sync {
    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>);
}

pub struct StringLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl Validator for StringLengthValidator {
    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        if let Some(s) = value.as_string() {
            let len = s.chars().count();
            if let Some(min) = self.min {
                if len < min {
                    diagnostics.push(
                        Diagnostic::error(
                            format!("{} must have minimum length of {}", path, min),
                            format!("Got length {}", len),
                        )
                        .with_attribute(path.clone()),
                    );
                }
            }
            if let Some(max) = self.max {
                if len > max {
                    diagnostics.push(
                        Diagnostic::error(
                            format!("{} must have maximum length of {}", path, max),
                            format!("Got length {}", len),
                        )
                        .with_attribute(path.clone()),
                    );
                }
            }
        }
    }
}

pub struct StringPatternValidator {
    pub pattern: regex::Regex,
    pub description: String,
}

impl StringPatternValidator {
    /// Loose address check: something@something.tld, no whitespace
    pub fn email() -> Self {
        Self {
            pattern: regex::Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
                .expect("static e-mail pattern compiles"),
            description: "an e-mail address".to_string(),
        }
    }
}

impl Validator for StringPatternValidator {
    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        if let Some(s) = value.as_string() {
            if !self.pattern.is_match(s) {
                diagnostics.push(
                    Diagnostic::error(
                        format!("{} must be {}", path, self.description),
                        format!("Value '{}' does not match pattern", s),
                    )
                    .with_attribute(path.clone()),
                );
            }
        }
    }
}

/// Accepts RFC 3339 timestamps such as `2024-03-01T09:00:00Z`
pub struct Rfc3339Validator;

impl Validator for Rfc3339Validator {
    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        if let Some(s) = value.as_string() {
            if let Err(e) = chrono::DateTime::parse_from_rfc3339(s) {
                diagnostics.push(
                    Diagnostic::error(
                        format!("{} must be an RFC 3339 timestamp", path),
                        format!("Value '{}' could not be parsed: {}", s, e),
                    )
                    .with_attribute(path.clone()),
                );
            }
        }
    }
}

pub struct OneOfValidator {
    pub values: Vec<String>,
}

impl Validator for OneOfValidator {
    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        if let Some(s) = value.as_string() {
            if !self.values.iter().any(|v| v == s) {
                diagnostics.push(
                    Diagnostic::error(
                        format!("{} must be one of: {}", path, self.values.join(", ")),
                        format!("Got '{}'", s),
                    )
                    .with_attribute(path.clone()),
                );
            }
        }
    }
}
