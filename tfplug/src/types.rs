//! Core type system for tfplug
//!
//! This module provides the core types used throughout the framework,
//! including Dynamic values, attribute paths and diagnostics.

use crate::error::{Result, TfplugError};
use std::collections::HashMap;
use std::fmt;

/// Dynamic represents Terraform values that can be of any type
/// This is the core type for all configuration and state data
/// Prefer the type-safe accessors on DynamicValue over matching directly
#[derive(Debug, Clone, PartialEq)]
pub enum Dynamic {
    /// Explicit null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Number value (all numbers are f64 to match Terraform)
    Number(f64),
    /// String value
    String(String),
    /// List of values (ordered, allows duplicates)
    List(Vec<Dynamic>),
    /// Map of string keys to values (objects are represented as Maps)
    Map(HashMap<String, Dynamic>),
    /// Value not yet known (during planning)
    Unknown,
}

impl Dynamic {
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Dynamic::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Dynamic::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Dynamic::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Dynamic::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Dynamic::Unknown)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Dynamic::Null => "null",
            Dynamic::Bool(_) => "bool",
            Dynamic::Number(_) => "number",
            Dynamic::String(_) => "string",
            Dynamic::List(_) => "list",
            Dynamic::Map(_) => "map",
            Dynamic::Unknown => "unknown",
        }
    }
}

/// DynamicValue wraps Dynamic with path-based accessors
/// This is what gets passed between Terraform and the provider
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicValue {
    pub value: Dynamic,
}

impl DynamicValue {
    pub fn new(value: Dynamic) -> Self {
        Self { value }
    }

    /// Empty object, the usual starting point for building state
    pub fn object() -> Self {
        Self {
            value: Dynamic::Map(HashMap::new()),
        }
    }

    pub fn null() -> Self {
        Self {
            value: Dynamic::Null,
        }
    }

    pub fn unknown() -> Self {
        Self {
            value: Dynamic::Unknown,
        }
    }

    /// Raw access to the value at `path`
    pub fn get(&self, path: &AttributePath) -> Result<&Dynamic> {
        self.navigate_path(path)
    }

    pub fn get_string(&self, path: &AttributePath) -> Result<String> {
        let value = self.navigate_path(path)?;
        match value {
            Dynamic::String(s) => Ok(s.clone()),
            _ => Err(type_mismatch("string", value)),
        }
    }

    pub fn get_number(&self, path: &AttributePath) -> Result<f64> {
        let value = self.navigate_path(path)?;
        match value {
            Dynamic::Number(n) => Ok(*n),
            _ => Err(type_mismatch("number", value)),
        }
    }

    pub fn get_bool(&self, path: &AttributePath) -> Result<bool> {
        let value = self.navigate_path(path)?;
        match value {
            Dynamic::Bool(b) => Ok(*b),
            _ => Err(type_mismatch("bool", value)),
        }
    }

    pub fn get_list(&self, path: &AttributePath) -> Result<Vec<Dynamic>> {
        let value = self.navigate_path(path)?;
        match value {
            Dynamic::List(l) => Ok(l.clone()),
            _ => Err(type_mismatch("list", value)),
        }
    }

    pub fn get_map(&self, path: &AttributePath) -> Result<HashMap<String, Dynamic>> {
        let value = self.navigate_path(path)?;
        match value {
            Dynamic::Map(m) => Ok(m.clone()),
            _ => Err(type_mismatch("map", value)),
        }
    }

    /// Optional attributes: a missing or null value yields `Ok(None)`,
    /// a value of another type is still an error
    pub fn get_optional_string(&self, path: &AttributePath) -> Result<Option<String>> {
        self.get_optional(path, "string", |v| v.as_string().map(str::to_string))
    }

    pub fn get_optional_bool(&self, path: &AttributePath) -> Result<Option<bool>> {
        self.get_optional(path, "bool", Dynamic::as_bool)
    }

    pub fn get_optional_number(&self, path: &AttributePath) -> Result<Option<f64>> {
        self.get_optional(path, "number", Dynamic::as_number)
    }

    fn get_optional<T>(
        &self,
        path: &AttributePath,
        expected: &str,
        extract: impl Fn(&Dynamic) -> Option<T>,
    ) -> Result<Option<T>> {
        match self.navigate_path(path) {
            Ok(Dynamic::Null) => Ok(None),
            Err(e) if e.is_missing() => Ok(None),
            Ok(value) => extract(value)
                .map(Some)
                .ok_or_else(|| type_mismatch(expected, value)),
            Err(e) => Err(e),
        }
    }

    /// True when the attribute is present and not yet known
    pub fn is_unknown_at(&self, path: &AttributePath) -> bool {
        matches!(self.navigate_path(path), Ok(Dynamic::Unknown))
    }

    /// True when the attribute is absent or explicitly null
    pub fn is_null_at(&self, path: &AttributePath) -> bool {
        match self.navigate_path(path) {
            Ok(value) => value.is_null(),
            Err(e) => e.is_missing(),
        }
    }

    pub fn set_string(&mut self, path: &AttributePath, value: String) -> Result<()> {
        self.set_value(path, Dynamic::String(value))
    }

    pub fn set_number(&mut self, path: &AttributePath, value: f64) -> Result<()> {
        self.set_value(path, Dynamic::Number(value))
    }

    pub fn set_bool(&mut self, path: &AttributePath, value: bool) -> Result<()> {
        self.set_value(path, Dynamic::Bool(value))
    }

    pub fn set_list(&mut self, path: &AttributePath, value: Vec<Dynamic>) -> Result<()> {
        self.set_value(path, Dynamic::List(value))
    }

    pub fn set_map(&mut self, path: &AttributePath, value: HashMap<String, Dynamic>) -> Result<()> {
        self.set_value(path, Dynamic::Map(value))
    }

    pub fn set_null(&mut self, path: &AttributePath) -> Result<()> {
        self.set_value(path, Dynamic::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self.value, Dynamic::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.value, Dynamic::Unknown)
    }

    /// Mark computed values as unknown during planning
    pub fn mark_unknown(&mut self, path: &AttributePath) -> Result<()> {
        self.set_value(path, Dynamic::Unknown)
    }

    fn navigate_path<'a>(&'a self, path: &AttributePath) -> Result<&'a Dynamic> {
        let mut current = &self.value;

        for step in &path.steps {
            current = match (current, step) {
                (Dynamic::Map(m), AttributePathStep::AttributeName(name))
                | (Dynamic::Map(m), AttributePathStep::ElementKeyString(name)) => m
                    .get(name)
                    .ok_or_else(|| TfplugError::AttributeNotFound(path.to_string()))?,
                (Dynamic::List(l), AttributePathStep::ElementKeyInt(idx)) => {
                    let idx = usize::try_from(*idx)
                        .map_err(|_| TfplugError::InvalidPath(path.to_string()))?;
                    l.get(idx)
                        .ok_or_else(|| TfplugError::AttributeNotFound(path.to_string()))?
                }
                // Walking into a null object behaves like a missing attribute
                (Dynamic::Null, _) => {
                    return Err(TfplugError::AttributeNotFound(path.to_string()))
                }
                _ => return Err(TfplugError::InvalidPath(path.to_string())),
            };
        }

        Ok(current)
    }

    fn set_value(&mut self, path: &AttributePath, new_value: Dynamic) -> Result<()> {
        let Some((last, parents)) = path.steps.split_last() else {
            self.value = new_value;
            return Ok(());
        };

        if !matches!(self.value, Dynamic::Map(_)) {
            self.value = Dynamic::Map(HashMap::new());
        }

        let mut current = &mut self.value;
        for (idx, step) in parents.iter().enumerate() {
            let next_is_index = matches!(
                path.steps.get(idx + 1),
                Some(AttributePathStep::ElementKeyInt(_))
            );
            current = match (current, step) {
                (Dynamic::Map(m), AttributePathStep::AttributeName(name))
                | (Dynamic::Map(m), AttributePathStep::ElementKeyString(name)) => {
                    let entry = m.entry(name.clone()).or_insert(Dynamic::Null);
                    if entry.is_null() {
                        *entry = if next_is_index {
                            Dynamic::List(Vec::new())
                        } else {
                            Dynamic::Map(HashMap::new())
                        };
                    }
                    entry
                }
                (Dynamic::List(l), AttributePathStep::ElementKeyInt(idx)) => {
                    let idx = usize::try_from(*idx)
                        .map_err(|_| TfplugError::InvalidPath(path.to_string()))?;
                    l.get_mut(idx)
                        .ok_or_else(|| TfplugError::InvalidPath(path.to_string()))?
                }
                _ => return Err(TfplugError::InvalidPath(path.to_string())),
            };
        }

        match (current, last) {
            (Dynamic::Map(m), AttributePathStep::AttributeName(name))
            | (Dynamic::Map(m), AttributePathStep::ElementKeyString(name)) => {
                m.insert(name.clone(), new_value);
                Ok(())
            }
            (Dynamic::List(l), AttributePathStep::ElementKeyInt(idx)) => {
                let idx =
                    usize::try_from(*idx).map_err(|_| TfplugError::InvalidPath(path.to_string()))?;
                match idx.cmp(&l.len()) {
                    std::cmp::Ordering::Less => l[idx] = new_value,
                    std::cmp::Ordering::Equal => l.push(new_value),
                    std::cmp::Ordering::Greater => {
                        return Err(TfplugError::InvalidPath(path.to_string()))
                    }
                }
                Ok(())
            }
            _ => Err(TfplugError::InvalidPath(path.to_string())),
        }
    }
}

impl From<HashMap<String, Dynamic>> for DynamicValue {
    fn from(map: HashMap<String, Dynamic>) -> Self {
        Self::new(Dynamic::Map(map))
    }
}

fn type_mismatch(expected: &str, actual: &Dynamic) -> TfplugError {
    TfplugError::TypeMismatch {
        expected: expected.to_string(),
        actual: actual.type_name().to_string(),
    }
}

/// AttributePath represents a path to an attribute within a DynamicValue
#[derive(Debug, Clone, PartialEq)]
pub struct AttributePath {
    pub steps: Vec<AttributePathStep>,
}

impl AttributePath {
    pub fn new(name: &str) -> Self {
        Self {
            steps: vec![AttributePathStep::AttributeName(name.to_string())],
        }
    }

    pub fn root() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn attribute(mut self, name: &str) -> Self {
        self.steps
            .push(AttributePathStep::AttributeName(name.to_string()));
        self
    }

    pub fn index(mut self, idx: i64) -> Self {
        self.steps.push(AttributePathStep::ElementKeyInt(idx));
        self
    }

    pub fn key(mut self, key: &str) -> Self {
        self.steps
            .push(AttributePathStep::ElementKeyString(key.to_string()));
        self
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                AttributePathStep::AttributeName(name) if i == 0 => write!(f, "{}", name)?,
                AttributePathStep::AttributeName(name) => write!(f, ".{}", name)?,
                AttributePathStep::ElementKeyString(key) => write!(f, "[\"{}\"]", key)?,
                AttributePathStep::ElementKeyInt(idx) => write!(f, "[{}]", idx)?,
            }
        }
        Ok(())
    }
}

/// Individual step in an AttributePath
#[derive(Debug, Clone, PartialEq)]
pub enum AttributePathStep {
    /// Access attribute by name in object/map
    AttributeName(String),
    /// Access element by string key (for maps)
    ElementKeyString(String),
    /// Access element by integer index (for lists)
    ElementKeyInt(i64),
}

/// Diagnostic represents a warning or error from the provider
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub summary: String,
    pub detail: String,
    pub attribute: Option<AttributePath>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn with_attribute(mut self, path: AttributePath) -> Self {
        self.attribute = Some(path);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

/// Severity level for diagnostics
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiagnosticSeverity {
    Invalid,
    Error,
    Warning,
}

pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

/// Config represents configuration values
pub type Config = DynamicValue;

/// State represents resource state values
pub type State = DynamicValue;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_value_string_access() {
        let mut dv = DynamicValue::object();
        dv.set_string(&AttributePath::new("name"), "Q1-Launch".to_string())
            .unwrap();

        let result = dv.get_string(&AttributePath::new("name")).unwrap();
        assert_eq!(result, "Q1-Launch");
    }

    #[test]
    fn dynamic_value_nested_access() {
        let mut dv = DynamicValue::object();
        let path = AttributePath::new("schedule").attribute("run_at");
        dv.set_string(&path, "2024-01-01T10:00:00Z".to_string())
            .unwrap();

        let result = dv.get_string(&path).unwrap();
        assert_eq!(result, "2024-01-01T10:00:00Z");
    }

    #[test]
    fn optional_accessors_treat_missing_and_null_as_none() {
        let mut dv = DynamicValue::object();
        dv.set_null(&AttributePath::new("description")).unwrap();

        assert_eq!(
            dv.get_optional_string(&AttributePath::new("description"))
                .unwrap(),
            None
        );
        assert_eq!(
            dv.get_optional_string(&AttributePath::new("folder")).unwrap(),
            None
        );
        assert!(dv.is_null_at(&AttributePath::new("folder")));
    }

    #[test]
    fn optional_accessor_rejects_wrong_type() {
        let mut dv = DynamicValue::object();
        dv.set_bool(&AttributePath::new("name"), true).unwrap();

        let err = dv
            .get_optional_string(&AttributePath::new("name"))
            .unwrap_err();
        assert!(matches!(err, TfplugError::TypeMismatch { .. }));
    }

    #[test]
    fn list_elements_can_be_appended_by_index() {
        let mut dv = DynamicValue::object();
        let first = AttributePath::new("content").index(0).attribute("section");
        let second = AttributePath::new("content").index(1).attribute("section");
        dv.set_string(&first, "header".to_string()).unwrap_err();

        dv.set_list(&AttributePath::new("content"), vec![]).unwrap();
        dv.set_value(
            &AttributePath::new("content").index(0),
            Dynamic::Map(HashMap::new()),
        )
        .unwrap();
        dv.set_string(&first, "header".to_string()).unwrap();
        assert!(dv.get_string(&second).is_err());
        assert_eq!(dv.get_list(&AttributePath::new("content")).unwrap().len(), 1);
    }

    #[test]
    fn attribute_path_display() {
        let path = AttributePath::new("content").index(2).attribute("text");
        assert_eq!(path.to_string(), "content[2].text");

        let path = AttributePath::new("schedule")
            .attribute("tokens")
            .key("my.token");
        assert_eq!(path.to_string(), "schedule.tokens[\"my.token\"]");
    }
}
