//! Provider configuration
//!
//! Each connection setting comes from the provider block first and falls
//! back to its `MARKETO_*` environment variable.

use std::ops::RangeInclusive;
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

use crate::api::RetryConfig;

pub const ENDPOINT_ENV: &str = "MARKETO_ENDPOINT";
pub const CLIENT_ID_ENV: &str = "MARKETO_ID";
pub const CLIENT_SECRET_ENV: &str = "MARKETO_SECRET";

/// Accepted `max_retries` values
pub const MAX_RETRIES_RANGE: RangeInclusive<u64> = 0..=10;
/// Accepted `request_timeout` values, in seconds
pub const REQUEST_TIMEOUT_RANGE: RangeInclusive<u64> = 1..=3600;

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub endpoint: String,
    pub client_id: String,
    pub client_secret: String,
    pub max_retries: Option<u32>,
    pub request_timeout: Option<u64>,
}

/// A connection setting after the environment fallback
enum Setting {
    Value(String),
    /// Depends on something Terraform hasn't computed yet
    Unknown,
    Missing,
}

fn resolve_setting(config: &DynamicValue, attribute: &str, env_var: &str) -> Setting {
    match config.get(&AttributePath::new(attribute)) {
        Ok(Dynamic::Unknown) => return Setting::Unknown,
        Ok(Dynamic::String(value)) if !value.trim().is_empty() => {
            return Setting::Value(value.trim().to_string())
        }
        _ => {}
    }

    match std::env::var(env_var) {
        Ok(value) if !value.trim().is_empty() => Setting::Value(value.trim().to_string()),
        _ => Setting::Missing,
    }
}

fn whole_number(
    config: &DynamicValue,
    attribute: &str,
    range: RangeInclusive<u64>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<u64> {
    let path = AttributePath::new(attribute);
    if config.is_unknown_at(&path) {
        return None;
    }
    let (min, max) = (*range.start(), *range.end());
    match config.get_optional_number(&path) {
        Ok(Some(n)) if n.fract() == 0.0 && n >= min as f64 && n <= max as f64 => Some(n as u64),
        Ok(Some(n)) => {
            diagnostics.push(
                Diagnostic::error(
                    format!("Invalid {}", attribute),
                    format!(
                        "{} must be a whole number between {} and {}, got {}",
                        attribute, min, max, n
                    ),
                )
                .with_attribute(path),
            );
            None
        }
        Ok(None) => None,
        Err(e) => {
            diagnostics.push(
                Diagnostic::error(format!("Invalid {}", attribute), e.to_string())
                    .with_attribute(path),
            );
            None
        }
    }
}

impl ProviderConfig {
    /// Resolve the provider block. `None` without errors means a setting is
    /// still unknown and the provider stays unconfigured for now.
    pub fn resolve(config: &DynamicValue) -> (Option<Self>, Vec<Diagnostic>) {
        let mut diagnostics = Vec::new();
        let mut values = Vec::with_capacity(3);
        let mut unknown = false;

        for (attribute, env_var, label) in [
            ("endpoint", ENDPOINT_ENV, "endpoint"),
            ("id", CLIENT_ID_ENV, "client ID"),
            ("secret", CLIENT_SECRET_ENV, "client secret"),
        ] {
            match resolve_setting(config, attribute, env_var) {
                Setting::Value(value) => values.push(value),
                Setting::Unknown => {
                    unknown = true;
                    diagnostics.push(
                        Diagnostic::warning(
                            format!("Unknown Marketo {}", label),
                            format!(
                                "The provider can't connect to Marketo until {} is known. \
                                 Set it to a static value or use the {} environment variable",
                                attribute, env_var
                            ),
                        )
                        .with_attribute(AttributePath::new(attribute)),
                    );
                }
                Setting::Missing => diagnostics.push(
                    Diagnostic::error(
                        format!("Missing Marketo {}", label),
                        format!(
                            "Set the {} attribute in the provider configuration or the {} environment variable",
                            attribute, env_var
                        ),
                    )
                    .with_attribute(AttributePath::new(attribute)),
                ),
            }
        }

        let max_retries = whole_number(config, "max_retries", MAX_RETRIES_RANGE, &mut diagnostics)
            .and_then(|n| u32::try_from(n).ok());
        let request_timeout =
            whole_number(config, "request_timeout", REQUEST_TIMEOUT_RANGE, &mut diagnostics);

        if unknown || tfplug::types::has_errors(&diagnostics) {
            return (None, diagnostics);
        }

        let [endpoint, client_id, client_secret]: [String; 3] = match values.try_into() {
            Ok(values) => values,
            Err(_) => return (None, diagnostics),
        };

        (
            Some(Self {
                endpoint,
                client_id,
                client_secret,
                max_retries,
                request_timeout,
            }),
            diagnostics,
        )
    }

    pub fn retry_config(&self) -> RetryConfig {
        let defaults = RetryConfig::default();
        RetryConfig {
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            timeout_seconds: self.request_timeout.unwrap_or(defaults.timeout_seconds),
            ..defaults
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        std::env::remove_var(ENDPOINT_ENV);
        std::env::remove_var(CLIENT_ID_ENV);
        std::env::remove_var(CLIENT_SECRET_ENV);
    }

    fn full_config() -> DynamicValue {
        let mut config = DynamicValue::object();
        config
            .set_string(
                &AttributePath::new("endpoint"),
                "https://123-ABC-456.mktorest.com".to_string(),
            )
            .unwrap();
        config
            .set_string(&AttributePath::new("id"), "client".to_string())
            .unwrap();
        config
            .set_string(&AttributePath::new("secret"), "secret".to_string())
            .unwrap();
        config
    }

    #[test]
    #[serial]
    fn attributes_take_precedence_over_env() {
        std::env::set_var(ENDPOINT_ENV, "https://other.mktorest.com");

        let (resolved, diags) = ProviderConfig::resolve(&full_config());

        assert!(diags.is_empty());
        assert_eq!(
            resolved.unwrap().endpoint,
            "https://123-ABC-456.mktorest.com"
        );
        clear_env();
    }

    #[test]
    #[serial]
    fn env_fills_missing_attributes() {
        std::env::set_var(ENDPOINT_ENV, "https://123-ABC-456.mktorest.com");
        std::env::set_var(CLIENT_ID_ENV, "env-client");
        std::env::set_var(CLIENT_SECRET_ENV, "env-secret");

        let (resolved, diags) = ProviderConfig::resolve(&DynamicValue::object());

        assert!(diags.is_empty());
        let resolved = resolved.unwrap();
        assert_eq!(resolved.client_id, "env-client");
        assert_eq!(resolved.client_secret, "env-secret");
        clear_env();
    }

    #[test]
    #[serial]
    fn empty_values_are_missing() {
        clear_env();
        let mut config = full_config();
        config
            .set_string(&AttributePath::new("secret"), "  ".to_string())
            .unwrap();

        let (resolved, diags) = ProviderConfig::resolve(&config);

        assert!(resolved.is_none());
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Missing Marketo client secret");
    }

    #[test]
    #[serial]
    fn unknown_value_warns_and_defers() {
        clear_env();
        let mut config = full_config();
        config.mark_unknown(&AttributePath::new("endpoint")).unwrap();

        let (resolved, diags) = ProviderConfig::resolve(&config);

        assert!(resolved.is_none());
        assert_eq!(diags.len(), 1);
        assert!(!diags[0].is_error());
    }

    #[test]
    #[serial]
    fn retry_settings_feed_retry_config() {
        clear_env();
        let mut config = full_config();
        config
            .set_number(&AttributePath::new("max_retries"), 5.0)
            .unwrap();
        config
            .set_number(&AttributePath::new("request_timeout"), 30.0)
            .unwrap();

        let (resolved, _) = ProviderConfig::resolve(&config);
        let retry = resolved.unwrap().retry_config();

        assert_eq!(retry.max_retries, 5);
        assert_eq!(retry.timeout_seconds, 30);
        assert_eq!(retry.initial_backoff_ms, RetryConfig::default().initial_backoff_ms);
    }

    #[test]
    #[serial]
    fn fractional_retries_are_rejected() {
        clear_env();
        let mut config = full_config();
        config
            .set_number(&AttributePath::new("max_retries"), 1.5)
            .unwrap();

        let (resolved, diags) = ProviderConfig::resolve(&config);

        assert!(resolved.is_none());
        assert_eq!(diags[0].attribute, Some(AttributePath::new("max_retries")));
    }

    #[test]
    #[serial]
    fn out_of_range_settings_are_rejected() {
        clear_env();
        let mut config = full_config();
        config
            .set_number(&AttributePath::new("max_retries"), 1e12)
            .unwrap();
        config
            .set_number(&AttributePath::new("request_timeout"), 1e30)
            .unwrap();

        let (resolved, diags) = ProviderConfig::resolve(&config);

        assert!(resolved.is_none());
        assert_eq!(diags.len(), 2);
        assert_eq!(diags[0].attribute, Some(AttributePath::new("max_retries")));
        assert!(diags[0].detail.contains("between 0 and 10"));
        assert_eq!(diags[1].attribute, Some(AttributePath::new("request_timeout")));
    }

    #[test]
    #[serial]
    fn range_limits_are_inclusive() {
        clear_env();
        let mut config = full_config();
        config
            .set_number(&AttributePath::new("max_retries"), 10.0)
            .unwrap();
        config
            .set_number(&AttributePath::new("request_timeout"), 3600.0)
            .unwrap();

        let (resolved, diags) = ProviderConfig::resolve(&config);

        assert!(diags.is_empty(), "{:?}", diags);
        let resolved = resolved.unwrap();
        assert_eq!(resolved.max_retries, Some(10));
        assert_eq!(resolved.request_timeout, Some(3600));
    }
}
