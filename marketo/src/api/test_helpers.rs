//! Test helpers for the Marketo API

#[cfg(test)]
use mockito::{Matcher, Mock, ServerGuard};

/// Client with short backoff so retry tests stay fast
#[cfg(test)]
#[allow(dead_code)]
pub fn create_test_client(url: &str) -> super::Client {
    super::Client::with_config(
        url,
        "test-client",
        "test-secret",
        super::RetryConfig {
            max_retries: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            timeout_seconds: 5,
            max_elapsed_seconds: 10,
        },
    )
    .unwrap()
}

/// Identity endpoint handing out `test-token`
#[cfg(test)]
#[allow(dead_code)]
pub async fn mock_token(server: &mut ServerGuard) -> Mock {
    server
        .mock("GET", "/identity/oauth/token")
        .match_query(Matcher::Any)
        .with_body(
            r#"{"access_token":"test-token","token_type":"bearer","expires_in":3599,"scope":"api@example.com"}"#,
        )
        .create_async()
        .await
}

#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_retry_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_backoff_ms, 200);
        assert_eq!(config.max_backoff_ms, 10000);
        assert_eq!(config.timeout_seconds, 10);
        assert_eq!(config.max_elapsed_seconds, 60);
    }

    #[test]
    fn test_asset_paths() {
        use assets::MarketoAsset;

        assert_eq!(
            assets::program::Program::resource_path("1001"),
            "/rest/asset/v1/program/1001.json"
        );
        assert_eq!(
            assets::email_template::EmailTemplate::delete_path("88"),
            "/rest/asset/v1/emailTemplate/88/delete.json"
        );
        assert_eq!(
            assets::smart_campaign::SmartCampaign::resource_path("a b"),
            "/rest/asset/v1/smartCampaign/a%20b.json"
        );
    }

    #[test]
    fn test_client_strips_rest_suffix() {
        let client = Client::new("https://123-ABC-456.mktorest.com/rest", "id", "secret").unwrap();
        assert_eq!(client.base_url(), "https://123-ABC-456.mktorest.com");
        assert_eq!(client.token_exchanges(), 0);
    }
}
