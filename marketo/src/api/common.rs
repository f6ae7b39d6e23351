//! Common types and utilities for the Marketo REST API

use serde::{Deserialize, Deserializer};
use std::time::Duration;

use super::error::ApiError;

/// Every REST call answers with this envelope, usually with HTTP 200 even
/// when the call failed
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub errors: Vec<ApiErrorEntry>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default = "Vec::new")]
    pub result: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorEntry {
    #[serde(with = "string_or_number")]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Access token expired or invalid
pub const TOKEN_REJECTED_CODES: &[&str] = &["601", "602"];
/// Asset not found / requested resource not found
pub const NOT_FOUND_CODES: &[&str] = &["610", "702"];
/// Rate limit, concurrency limit, temporary unavailability, timeouts
pub const TRANSIENT_CODES: &[&str] = &["604", "606", "608", "611", "615", "713"];

/// How a failed envelope should be treated by the request loop
#[derive(Debug, PartialEq, Eq)]
pub enum EnvelopeFailure {
    TokenRejected,
    NotFound,
    Transient,
    Fatal,
}

pub fn classify_error_code(code: &str) -> EnvelopeFailure {
    if TOKEN_REJECTED_CODES.contains(&code) {
        EnvelopeFailure::TokenRejected
    } else if NOT_FOUND_CODES.contains(&code) {
        EnvelopeFailure::NotFound
    } else if TRANSIENT_CODES.contains(&code) {
        EnvelopeFailure::Transient
    } else {
        // 607 (daily quota) lands here: retrying before midnight is pointless
        EnvelopeFailure::Fatal
    }
}

pub fn describe_errors(errors: &[ApiErrorEntry]) -> String {
    if errors.is_empty() {
        return "request unsuccessful without error details".to_string();
    }
    errors
        .iter()
        .map(|e| format!("[{}] {}", e.code, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Seconds form of the Retry-After header; HTTP-date values are ignored
pub fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

impl ApiResponse<serde_json::Value> {
    /// Turn an unsuccessful envelope into the matching error
    pub fn into_error(self, status: u16, retry_after: Option<Duration>) -> ApiError {
        let message = describe_errors(&self.errors);
        let code = self.errors.first().map(|e| e.code.clone());

        match code.as_deref().map(classify_error_code) {
            Some(EnvelopeFailure::NotFound) => ApiError::NotFound(message),
            Some(EnvelopeFailure::Transient) => ApiError::Transient {
                message,
                retry_after,
            },
            Some(EnvelopeFailure::TokenRejected) => ApiError::Authentication(message),
            Some(EnvelopeFailure::Fatal) | None => ApiError::Validation {
                status,
                code,
                message,
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ApiQueryParams {
    params: Vec<(String, String)>,
}

impl ApiQueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn add_optional<K: Into<String>, V: ToString>(mut self, key: K, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.params.push((key.into(), v.to_string()));
        }
        self
    }

    pub fn to_query_string(&self) -> String {
        if self.params.is_empty() {
            String::new()
        } else {
            format!(
                "?{}",
                self.params
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
                    .collect::<Vec<_>>()
                    .join("&")
            )
        }
    }
}

/// Form-encoded body for asset create/update calls
#[derive(Debug, Clone, Default)]
pub struct FormParams {
    params: Vec<(String, String)>,
}

impl FormParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn add_optional<K: Into<String>, V: ToString>(mut self, key: K, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.params.push((key.into(), v.to_string()));
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.params
    }
}

/// Where an asset lives: inside a folder or directly under a program
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    Folder(String),
    Program(String),
}

impl Placement {
    pub fn id(&self) -> &str {
        match self {
            Placement::Folder(id) | Placement::Program(id) => id,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Placement::Folder(_) => "Folder",
            Placement::Program(_) => "Program",
        }
    }

    /// JSON parameter form: `{"id":1001,"type":"Folder"}`
    pub fn to_param(&self) -> String {
        let id = match self.id().parse::<u64>() {
            Ok(n) => serde_json::Value::from(n),
            Err(_) => serde_json::Value::from(self.id()),
        };
        serde_json::json!({ "id": id, "type": self.type_name() }).to_string()
    }
}

/// Folder reference as returned by the API. Assets report
/// `{type, value, folderName}`, folders and smart lists report `{id, type}`.
#[derive(Debug, Clone, Deserialize)]
pub struct FolderRef {
    #[serde(rename = "type", default)]
    pub folder_type: Option<String>,
    #[serde(alias = "value", with = "string_or_number")]
    pub id: String,
    #[serde(rename = "folderName", default)]
    pub folder_name: Option<String>,
}

impl FolderRef {
    pub fn placement(&self) -> Placement {
        match self.folder_type.as_deref() {
            Some(t) if t.eq_ignore_ascii_case("program") => Placement::Program(self.id.clone()),
            _ => Placement::Folder(self.id.clone()),
        }
    }
}

/// Email header fields come back as `{"type":"Text","value":"..."}` or as a
/// bare string depending on the endpoint
pub fn deserialize_text_value<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TextValue {
        Plain(String),
        Typed { value: Option<String> },
    }

    Ok(
        match Option::<TextValue>::deserialize(deserializer)? {
            Some(TextValue::Plain(s)) => Some(s),
            Some(TextValue::Typed { value }) => value,
            None => None,
        },
    )
}

/// Treat blank strings the way the API means them: unset
pub fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Ids arrive as JSON numbers; Terraform state keeps them as strings
pub mod string_or_number {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum StringOrNumber {
            String(String),
            U64(u64),
            I64(i64),
        }

        Ok(match StringOrNumber::deserialize(deserializer)? {
            StringOrNumber::String(s) => s,
            StringOrNumber::U64(u) => u.to_string(),
            StringOrNumber::I64(i) => i.to_string(),
        })
    }

    pub fn deserialize_optional<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum StringOrNumber {
            String(String),
            U64(u64),
            I64(i64),
        }

        Ok(
            Option::<StringOrNumber>::deserialize(deserializer)?.map(|v| match v {
                StringOrNumber::String(s) => s,
                StringOrNumber::U64(u) => u.to_string(),
                StringOrNumber::I64(i) => i.to_string(),
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_parses_failure() {
        let body = r#"{"success":false,"requestId":"e42b#14272d07d78","errors":[{"code":"702","message":"No data found for given search scenario"}]}"#;
        let envelope: ApiResponse<serde_json::Value> = serde_json::from_str(body).unwrap();

        assert!(!envelope.success);
        assert_eq!(envelope.request_id.as_deref(), Some("e42b#14272d07d78"));
        assert!(envelope.result.is_empty());
        assert!(envelope.into_error(200, None).is_not_found());
    }

    #[test]
    fn numeric_error_codes_are_accepted() {
        let body = r#"{"success":false,"errors":[{"code":606,"message":"Max rate limit '100' exceeded with in '20' secs"}]}"#;
        let envelope: ApiResponse<serde_json::Value> = serde_json::from_str(body).unwrap();

        let error = envelope.into_error(200, Some(Duration::from_secs(2)));
        match error {
            ApiError::Transient {
                message,
                retry_after,
            } => {
                assert!(message.starts_with("[606]"));
                assert_eq!(retry_after, Some(Duration::from_secs(2)));
            }
            other => panic!("Expected transient error, got {:?}", other),
        }
    }

    #[test]
    fn error_code_classes() {
        assert_eq!(classify_error_code("601"), EnvelopeFailure::TokenRejected);
        assert_eq!(classify_error_code("602"), EnvelopeFailure::TokenRejected);
        assert_eq!(classify_error_code("610"), EnvelopeFailure::NotFound);
        assert_eq!(classify_error_code("615"), EnvelopeFailure::Transient);
        assert_eq!(classify_error_code("607"), EnvelopeFailure::Fatal);
        assert_eq!(classify_error_code("1003"), EnvelopeFailure::Fatal);
    }

    #[test]
    fn placement_param_uses_numeric_ids() {
        assert_eq!(
            Placement::Folder("1001".to_string()).to_param(),
            r#"{"id":1001,"type":"Folder"}"#
        );
        assert_eq!(
            Placement::Program("abc".to_string()).to_param(),
            r#"{"id":"abc","type":"Program"}"#
        );
    }

    #[test]
    fn folder_ref_accepts_both_shapes() {
        let asset: FolderRef =
            serde_json::from_str(r#"{"type":"Program","value":1044,"folderName":"Q1"}"#).unwrap();
        assert_eq!(asset.placement(), Placement::Program("1044".to_string()));

        let folder: FolderRef = serde_json::from_str(r#"{"id":12,"type":"Folder"}"#).unwrap();
        assert_eq!(folder.placement(), Placement::Folder("12".to_string()));
    }

    #[test]
    fn query_and_form_params() {
        let query = ApiQueryParams::new()
            .add("name", "Q1 Launch & More")
            .add_optional("type", None::<String>)
            .to_query_string();
        assert_eq!(query, "?name=Q1%20Launch%20%26%20More");

        let form = FormParams::new()
            .add("name", "Q1-Launch")
            .add_optional("description", Some("launch"))
            .add_optional("channel", None::<&str>);
        assert_eq!(form.get("name"), Some("Q1-Launch"));
        assert_eq!(form.get("description"), Some("launch"));
        assert_eq!(form.pairs().len(), 2);
    }

    #[test]
    fn text_values_unwrap() {
        #[derive(Deserialize)]
        struct Header {
            #[serde(default, deserialize_with = "deserialize_text_value")]
            subject: Option<String>,
            #[serde(default, deserialize_with = "deserialize_text_value")]
            from_name: Option<String>,
        }

        let header: Header =
            serde_json::from_str(r#"{"subject":{"type":"Text","value":"Hello"},"from_name":"Team"}"#)
                .unwrap();
        assert_eq!(header.subject.as_deref(), Some("Hello"));
        assert_eq!(header.from_name.as_deref(), Some("Team"));
    }

    #[test]
    fn blank_strings_are_unset() {
        assert_eq!(non_empty(Some("  ")), None);
        assert_eq!(non_empty(Some("x")), Some("x".to_string()));
        assert_eq!(non_empty(None), None);
    }
}
