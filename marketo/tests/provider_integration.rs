//! End-to-end provider tests: the in-process host drives the Marketo
//! provider against a mocked Marketo instance

use marketo::MarketoProvider;
use mockito::{Matcher, Mock, Server, ServerGuard};
use std::collections::HashMap;
use std::time::Duration;
use tfplug::{
    AttributePath, DiagnosticSeverity, Dynamic, DynamicValue, HostConfig, ProviderHost,
};

const PROGRAM_BODY: &str = r#"{"success":true,"requestId":"a1","warnings":[],"errors":[],"result":[{"id":1001,"name":"Q1-Launch","description":"","type":"Default","channel":"Online Advertising","folder":{"type":"Folder","value":15,"folderName":"Marketing"}}]}"#;
const NOT_FOUND_BODY: &str = r#"{"success":true,"errors":[],"warnings":["No assets found for the given search criteria."],"result":[]}"#;

fn path(name: &str) -> AttributePath {
    AttributePath::new(name)
}

fn object(values: &[(&str, &str)]) -> DynamicValue {
    let mut value = DynamicValue::object();
    for (name, v) in values {
        value.set_string(&path(name), v.to_string()).unwrap();
    }
    value
}

async fn mock_identity(server: &mut ServerGuard) -> Mock {
    server
        .mock("GET", "/identity/oauth/token")
        .match_query(Matcher::Any)
        .with_body(
            r#"{"access_token":"it-token","token_type":"bearer","expires_in":3599,"scope":"api@example.com"}"#,
        )
        .create_async()
        .await
}

async fn configured_host(server: &ServerGuard) -> ProviderHost<MarketoProvider> {
    let host = ProviderHost::with_config(
        MarketoProvider::new(),
        HostConfig::new().with_operation_timeout(Duration::from_secs(5)),
    );

    let mut config = object(&[
        ("endpoint", &server.url()),
        ("id", "client"),
        ("secret", "secret"),
    ]);
    config.set_number(&path("max_retries"), 0.0).unwrap();

    let diags = host.configure(config).await;
    assert!(diags.is_empty(), "configure failed: {:?}", diags);
    host
}

#[tokio::test]
async fn unconfigured_provider_reports_error() {
    let host = ProviderHost::new(MarketoProvider::new());

    let outcome = host
        .create("marketo_program", object(&[("name", "Q1-Launch")]))
        .await;

    assert!(outcome.state.is_none());
    assert_eq!(outcome.diagnostics[0].summary, "Provider not configured");
}

#[tokio::test]
async fn unknown_credentials_leave_provider_unconfigured() {
    let host = ProviderHost::new(MarketoProvider::new());
    let mut config = object(&[
        ("endpoint", "https://123-ABC-456.mktorest.com"),
        ("id", "client"),
    ]);
    config.mark_unknown(&path("secret")).unwrap();

    let diags = host.configure(config).await;

    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].severity, DiagnosticSeverity::Warning);
    assert!(!host.is_configured().await);
}

#[tokio::test]
async fn program_lifecycle() {
    let mut server = Server::new_async().await;
    let _token = mock_identity(&mut server).await;
    let create = server
        .mock("POST", "/rest/asset/v1/programs.json")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("name".into(), "Q1-Launch".into()),
            Matcher::UrlEncoded("folder".into(), r#"{"id":15,"type":"Folder"}"#.into()),
            Matcher::UrlEncoded("type".into(), "Default".into()),
        ]))
        .with_body(PROGRAM_BODY)
        .expect(1)
        .create_async()
        .await;
    let _get = server
        .mock("GET", "/rest/asset/v1/program/1001.json")
        .with_body(PROGRAM_BODY)
        .create_async()
        .await;
    let update = server
        .mock("POST", "/rest/asset/v1/program/1001.json")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("name".into(), "Q1-Launch-v2".into()),
            Matcher::UrlEncoded("description".into(), "Spring campaign".into()),
        ]))
        .with_body(PROGRAM_BODY.replace("\"Q1-Launch\"", "\"Q1-Launch-v2\"").replace(
            "\"description\":\"\"",
            "\"description\":\"Spring campaign\"",
        ))
        .expect(1)
        .create_async()
        .await;
    let delete = server
        .mock("POST", "/rest/asset/v1/program/1001/delete.json")
        .with_body(r#"{"success":true,"errors":[],"warnings":[],"result":[{"id":1001}]}"#)
        .expect(1)
        .create_async()
        .await;

    let host = configured_host(&server).await;

    let created = host
        .create(
            "marketo_program",
            object(&[("name", "Q1-Launch"), ("folder", "15")]),
        )
        .await;
    assert!(!created.has_errors(), "{:?}", created.diagnostics);
    let state = created.state.unwrap();
    assert_eq!(state.get_string(&path("id")).unwrap(), "1001");
    assert_eq!(state.get_string(&path("type")).unwrap(), "Default");
    assert_eq!(
        state.get_string(&path("channel")).unwrap(),
        "Online Advertising"
    );
    assert!(state.is_null_at(&path("description")));
    assert!(state.get_string(&path("last_updated")).unwrap().ends_with("UTC"));
    create.assert_async().await;

    let read = host.read("marketo_program", state.clone()).await;
    let read_state = read.state.unwrap();
    assert_eq!(read_state.get_string(&path("name")).unwrap(), "Q1-Launch");

    let updated = host
        .update(
            "marketo_program",
            read_state,
            object(&[
                ("name", "Q1-Launch-v2"),
                ("folder", "15"),
                ("description", "Spring campaign"),
            ]),
        )
        .await;
    assert!(!updated.has_errors(), "{:?}", updated.diagnostics);
    let updated_state = updated.state.unwrap();
    assert_eq!(updated_state.get_string(&path("id")).unwrap(), "1001");
    assert_eq!(
        updated_state.get_string(&path("name")).unwrap(),
        "Q1-Launch-v2"
    );
    update.assert_async().await;

    assert!(host
        .delete("marketo_program", updated_state.clone())
        .await
        .is_empty());
    delete.assert_async().await;
    delete.remove_async().await;

    let _gone = server
        .mock("POST", "/rest/asset/v1/program/1001/delete.json")
        .with_body(r#"{"success":false,"errors":[{"code":"702","message":"1001 Program not found"}]}"#)
        .create_async()
        .await;
    assert!(host.delete("marketo_program", updated_state).await.is_empty());
}

#[tokio::test]
async fn read_of_deleted_program_drops_state() {
    let mut server = Server::new_async().await;
    let _token = mock_identity(&mut server).await;
    let _get = server
        .mock("GET", "/rest/asset/v1/program/1001.json")
        .with_body(NOT_FOUND_BODY)
        .create_async()
        .await;

    let host = configured_host(&server).await;
    let outcome = host
        .read(
            "marketo_program",
            object(&[("id", "1001"), ("name", "Q1-Launch")]),
        )
        .await;

    assert!(outcome.state.is_none());
    assert!(outcome.diagnostics.is_empty());
}

#[tokio::test]
async fn read_failure_names_the_asset() {
    let mut server = Server::new_async().await;
    let _token = mock_identity(&mut server).await;
    let _get = server
        .mock("GET", "/rest/asset/v1/program/1001.json")
        .with_body(r#"{"success":false,"errors":[{"code":"1003","message":"Access denied"}]}"#)
        .create_async()
        .await;

    let host = configured_host(&server).await;
    let outcome = host
        .read("marketo_program", object(&[("id", "1001")]))
        .await;

    assert!(outcome.has_errors());
    assert_eq!(outcome.diagnostics[0].summary, "Failed to read program");
    assert!(outcome.diagnostics[0]
        .detail
        .starts_with("Could not read program with ID 1001: "));
}

#[tokio::test]
async fn import_reads_program_back() {
    let mut server = Server::new_async().await;
    let _token = mock_identity(&mut server).await;
    let _get = server
        .mock("GET", "/rest/asset/v1/program/1001.json")
        .with_body(PROGRAM_BODY)
        .create_async()
        .await;
    let _missing = server
        .mock("GET", "/rest/asset/v1/program/999.json")
        .with_body(NOT_FOUND_BODY)
        .create_async()
        .await;

    let host = configured_host(&server).await;

    let imported = host.import("marketo_program", "1001").await;
    let state = imported.state.unwrap();
    assert_eq!(state.get_string(&path("name")).unwrap(), "Q1-Launch");
    assert_eq!(state.get_string(&path("folder")).unwrap(), "15");

    let missing = host.import("marketo_program", "999").await;
    assert!(missing.state.is_none());
    assert_eq!(
        missing.diagnostics[0].summary,
        "Cannot import non-existent remote object"
    );
}

#[tokio::test]
async fn changing_program_type_is_rejected() {
    let server = Server::new_async().await;
    let host = configured_host(&server).await;

    let mut prior = object(&[
        ("id", "1001"),
        ("name", "Q1-Launch"),
        ("type", "Default"),
        ("folder", "15"),
    ]);
    prior.set_null(&path("channel")).unwrap();

    let outcome = host
        .update(
            "marketo_program",
            prior,
            object(&[("name", "Q1-Launch"), ("type", "Event"), ("folder", "15")]),
        )
        .await;

    assert!(outcome.state.is_none());
    assert_eq!(outcome.diagnostics[0].summary, "Cannot change type");
}

#[tokio::test]
async fn conflicting_placement_fails_before_any_request() {
    let server = Server::new_async().await;
    let host = configured_host(&server).await;

    let outcome = host
        .create(
            "marketo_smart_list",
            object(&[
                ("name", "Engaged"),
                ("source", "77"),
                ("folder", "12"),
                ("program", "1001"),
            ]),
        )
        .await;

    assert!(outcome.state.is_none());
    assert_eq!(outcome.diagnostics[0].summary, "Conflicting placement");
}

#[tokio::test]
async fn email_create_fills_sections() {
    let mut server = Server::new_async().await;
    let _token = mock_identity(&mut server).await;
    let create = server
        .mock("POST", "/rest/asset/v1/emails.json")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("name".into(), "Welcome".into()),
            Matcher::UrlEncoded("folder".into(), r#"{"id":1001,"type":"Program"}"#.into()),
        ]))
        .with_body(r#"{"success":true,"errors":[],"warnings":[],"result":[{"id":501,"name":"Welcome","folder":{"type":"Program","value":1001},"subject":{"type":"Text","value":"Hello"},"fromName":{"type":"Text","value":"Team"},"fromEmail":{"type":"Text","value":"team@example.com"},"replyEmail":{"type":"Text","value":"reply@example.com"},"template":7,"operational":false,"textOnly":false}]}"#)
        .expect(1)
        .create_async()
        .await;
    let section = server
        .mock("POST", "/rest/asset/v1/email/501/content/body.json")
        .match_body(Matcher::UrlEncoded("type".into(), "Text".into()))
        .with_body(r#"{"success":true,"errors":[],"warnings":[],"result":[{"id":501}]}"#)
        .expect(1)
        .create_async()
        .await;

    let host = configured_host(&server).await;
    let mut config = object(&[
        ("name", "Welcome"),
        ("program", "1001"),
        ("template", "7"),
        ("subject", "Hello"),
        ("from_name", "Team"),
        ("from_email", "team@example.com"),
        ("reply_to", "reply@example.com"),
    ]);
    let block: HashMap<String, Dynamic> = [
        ("section", "body"),
        ("text", "<p>Welcome aboard</p>"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), Dynamic::String(v.to_string())))
    .collect();
    config
        .set_list(&path("content"), vec![Dynamic::Map(block)])
        .unwrap();

    let outcome = host.create("marketo_email", config).await;

    assert!(!outcome.has_errors(), "{:?}", outcome.diagnostics);
    let state = outcome.state.unwrap();
    assert_eq!(state.get_string(&path("id")).unwrap(), "501");
    assert_eq!(state.get_string(&path("program")).unwrap(), "1001");
    assert!(state.is_null_at(&path("folder")));
    assert_eq!(state.get_bool(&path("operational")).unwrap(), false);
    create.assert_async().await;
    section.assert_async().await;
}

const EMAIL_CREATED_BODY: &str = r#"{"success":true,"errors":[],"warnings":[],"result":[{"id":501,"name":"Welcome","folder":{"type":"Program","value":1001},"template":7}]}"#;
const CAMPAIGN_BODY: &str = r#"{"success":true,"errors":[],"warnings":[],"result":[{"id":3021,"name":"Nurture","folder":{"id":1001,"type":"Program"},"status":"Never Run","isActive":false}]}"#;

fn schedule_block(run_at: &str) -> HashMap<String, Dynamic> {
    let mut schedule = HashMap::new();
    schedule.insert("run_at".to_string(), Dynamic::String(run_at.to_string()));
    schedule
}

#[tokio::test]
async fn email_section_failure_keeps_created_email() {
    let mut server = Server::new_async().await;
    let _token = mock_identity(&mut server).await;
    let create = server
        .mock("POST", "/rest/asset/v1/emails.json")
        .with_body(EMAIL_CREATED_BODY)
        .expect(1)
        .create_async()
        .await;
    let section = server
        .mock("POST", "/rest/asset/v1/email/501/content/body.json")
        .with_body(r#"{"success":false,"errors":[{"code":"709","message":"Section not found"}]}"#)
        .expect(1)
        .create_async()
        .await;
    let delete = server
        .mock("POST", "/rest/asset/v1/email/501/delete.json")
        .with_body(r#"{"success":true,"errors":[],"warnings":[],"result":[{"id":501}]}"#)
        .expect(1)
        .create_async()
        .await;

    let host = configured_host(&server).await;
    let mut config = object(&[
        ("name", "Welcome"),
        ("program", "1001"),
        ("template", "7"),
        ("subject", "Hello"),
        ("from_name", "Team"),
        ("from_email", "team@example.com"),
        ("reply_to", "reply@example.com"),
    ]);
    let block: HashMap<String, Dynamic> = [("section", "body"), ("text", "<p>Hi</p>")]
        .iter()
        .map(|(k, v)| (k.to_string(), Dynamic::String(v.to_string())))
        .collect();
    config
        .set_list(&path("content"), vec![Dynamic::Map(block)])
        .unwrap();

    let outcome = host.create("marketo_email", config).await;

    assert!(outcome.has_errors());
    assert!(outcome.tainted);
    assert!(outcome.diagnostics[0].detail.contains("email 501 was created"));
    let state = outcome.state.unwrap();
    assert_eq!(state.get_string(&path("id")).unwrap(), "501");
    assert!(state.is_null_at(&path("last_updated")));
    create.assert_async().await;
    section.assert_async().await;

    // Replacing the tainted email starts by deleting it
    let diags = host.delete("marketo_email", state).await;
    assert!(diags.is_empty(), "{:?}", diags);
    delete.assert_async().await;
}

#[tokio::test]
async fn campaign_schedule_failure_keeps_created_campaign() {
    let mut server = Server::new_async().await;
    let _token = mock_identity(&mut server).await;
    let create = server
        .mock("POST", "/rest/asset/v1/smartCampaigns.json")
        .with_body(CAMPAIGN_BODY)
        .expect(1)
        .create_async()
        .await;
    let schedule = server
        .mock("POST", "/rest/v1/campaigns/3021/schedule.json")
        .with_body(r#"{"success":false,"errors":[{"code":"1003","message":"Run time is in the past"}]}"#)
        .expect(1)
        .create_async()
        .await;

    let host = configured_host(&server).await;
    let mut config = object(&[("name", "Nurture"), ("program", "1001")]);
    config
        .set_map(&path("schedule"), schedule_block("2024-03-01T09:00:00Z"))
        .unwrap();

    let outcome = host.create("marketo_smart_campaign", config).await;

    assert!(outcome.has_errors());
    assert!(outcome.tainted);
    let state = outcome.state.unwrap();
    assert_eq!(state.get_string(&path("id")).unwrap(), "3021");
    assert_eq!(state.get_string(&path("program")).unwrap(), "1001");
    create.assert_async().await;
    schedule.assert_async().await;
}

#[tokio::test]
async fn failed_create_without_remote_object_leaves_no_state() {
    let mut server = Server::new_async().await;
    let _token = mock_identity(&mut server).await;
    let _create = server
        .mock("POST", "/rest/asset/v1/smartCampaigns.json")
        .with_body(r#"{"success":false,"errors":[{"code":"709","message":"Campaign name already exists"}]}"#)
        .create_async()
        .await;

    let host = configured_host(&server).await;
    let outcome = host
        .create(
            "marketo_smart_campaign",
            object(&[("name", "Nurture"), ("program", "1001")]),
        )
        .await;

    assert!(outcome.has_errors());
    assert!(!outcome.tainted);
    assert!(outcome.state.is_none());
}

#[tokio::test]
async fn campaign_rename_keeps_schedule() {
    let mut server = Server::new_async().await;
    let _token = mock_identity(&mut server).await;
    let update = server
        .mock("POST", "/rest/asset/v1/smartCampaign/3021.json")
        .match_body(Matcher::UrlEncoded("name".into(), "Nurture v2".into()))
        .with_body(CAMPAIGN_BODY.replace("\"Nurture\"", "\"Nurture v2\""))
        .expect(1)
        .create_async()
        .await;
    let schedule = server
        .mock("POST", "/rest/v1/campaigns/3021/schedule.json")
        .with_body(r#"{"success":true,"result":[{"id":3021}]}"#)
        .expect(0)
        .create_async()
        .await;

    let host = configured_host(&server).await;
    let mut prior = object(&[
        ("id", "3021"),
        ("name", "Nurture"),
        ("program", "1001"),
        ("last_updated", "Friday, 01-Mar-24 08:00:00 UTC"),
    ]);
    prior.set_null(&path("folder")).unwrap();
    prior
        .set_map(&path("schedule"), schedule_block("2024-03-01T09:00:00Z"))
        .unwrap();
    let mut config = object(&[("name", "Nurture v2"), ("program", "1001")]);
    config
        .set_map(&path("schedule"), schedule_block("2024-03-01T09:00:00Z"))
        .unwrap();

    let outcome = host.update("marketo_smart_campaign", prior, config).await;

    assert!(!outcome.has_errors(), "{:?}", outcome.diagnostics);
    let state = outcome.state.unwrap();
    assert_eq!(state.get_string(&path("name")).unwrap(), "Nurture v2");
    update.assert_async().await;
    schedule.assert_async().await;
}

#[tokio::test]
async fn campaign_schedule_change_is_posted() {
    let mut server = Server::new_async().await;
    let _token = mock_identity(&mut server).await;
    let _update = server
        .mock("POST", "/rest/asset/v1/smartCampaign/3021.json")
        .with_body(CAMPAIGN_BODY)
        .create_async()
        .await;
    let schedule = server
        .mock("POST", "/rest/v1/campaigns/3021/schedule.json")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "input": { "runAt": "2024-04-01T09:00:00Z" }
        })))
        .with_body(r#"{"success":true,"result":[{"id":3021}]}"#)
        .expect(1)
        .create_async()
        .await;

    let host = configured_host(&server).await;
    let mut prior = object(&[("id", "3021"), ("name", "Nurture"), ("program", "1001")]);
    prior.set_null(&path("folder")).unwrap();
    prior
        .set_map(&path("schedule"), schedule_block("2024-03-01T09:00:00Z"))
        .unwrap();
    let mut config = object(&[("name", "Nurture"), ("program", "1001")]);
    config
        .set_map(&path("schedule"), schedule_block("2024-04-01T09:00:00Z"))
        .unwrap();

    let outcome = host.update("marketo_smart_campaign", prior, config).await;

    assert!(!outcome.has_errors(), "{:?}", outcome.diagnostics);
    schedule.assert_async().await;
}

#[tokio::test]
async fn smart_list_source_change_warns() {
    let mut server = Server::new_async().await;
    let _token = mock_identity(&mut server).await;
    let update = server
        .mock("POST", "/rest/asset/v1/smartList/1200.json")
        .match_body(Matcher::UrlEncoded("name".into(), "Engaged".into()))
        .with_body(r#"{"success":true,"errors":[],"warnings":[],"result":[{"id":1200,"name":"Engaged","folder":{"id":12,"type":"Folder"}}]}"#)
        .expect(1)
        .create_async()
        .await;

    let host = configured_host(&server).await;
    let mut prior = object(&[
        ("id", "1200"),
        ("name", "Engaged"),
        ("source", "77"),
        ("folder", "12"),
    ]);
    prior.set_null(&path("program")).unwrap();

    let outcome = host
        .update(
            "marketo_smart_list",
            prior,
            object(&[("name", "Engaged"), ("source", "78"), ("folder", "12")]),
        )
        .await;

    assert!(!outcome.has_errors(), "{:?}", outcome.diagnostics);
    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.diagnostics[0].severity, DiagnosticSeverity::Warning);
    assert!(outcome.state.is_some());
    update.assert_async().await;
}

#[tokio::test]
async fn channel_lookup_by_name() {
    let mut server = Server::new_async().await;
    let _token = mock_identity(&mut server).await;
    let _found = server
        .mock("GET", "/rest/asset/v1/channel/byName.json")
        .match_query(Matcher::UrlEncoded("name".into(), "Webinar".into()))
        .with_body(r#"{"success":true,"errors":[],"warnings":[],"result":[{"id":5,"name":"Webinar","applicableProgramType":"event"}]}"#)
        .create_async()
        .await;
    let _missing = server
        .mock("GET", "/rest/asset/v1/channel/byName.json")
        .match_query(Matcher::UrlEncoded("name".into(), "Carrier Pigeon".into()))
        .with_body(NOT_FOUND_BODY)
        .create_async()
        .await;

    let host = configured_host(&server).await;

    let found = host
        .read_data_source("marketo_channel", object(&[("name", "Webinar")]))
        .await;
    let state = found.state.unwrap();
    assert_eq!(state.get_string(&path("id")).unwrap(), "5");
    assert_eq!(state.get_string(&path("program_type")).unwrap(), "event");
    assert!(!state.is_null_at(&path("last_updated")));

    let missing = host
        .read_data_source("marketo_channel", object(&[("name", "Carrier Pigeon")]))
        .await;
    assert!(missing.state.is_none());
    assert_eq!(missing.diagnostics[0].summary, "Channel not found");
}

#[tokio::test]
async fn smart_list_lookup_by_name() {
    let mut server = Server::new_async().await;
    let _token = mock_identity(&mut server).await;
    let _found = server
        .mock("GET", "/rest/asset/v1/smartList/byName.json")
        .match_query(Matcher::UrlEncoded("name".into(), "All Leads".into()))
        .with_body(r#"{"success":true,"errors":[],"warnings":[],"result":[{"id":77,"name":"All Leads"}]}"#)
        .create_async()
        .await;

    let host = configured_host(&server).await;
    let outcome = host
        .read_data_source("marketo_smart_list", object(&[("name", "All Leads")]))
        .await;

    assert_eq!(
        outcome.state.unwrap().get_string(&path("id")).unwrap(),
        "77"
    );
}

#[tokio::test]
async fn schemas_are_served_without_configuration() {
    let host = ProviderHost::new(MarketoProvider::new());

    let program = host.resource_schema("marketo_program").await.unwrap();
    assert!(program.attribute("name").unwrap().required);
    assert!(program.attribute("id").unwrap().computed);

    let channel = host.data_source_schema("marketo_channel").await.unwrap();
    assert!(channel.attribute("name").unwrap().required);
    assert!(channel.attribute("program_type").unwrap().computed);

    let unknown = host.resource_schema("marketo_webinar").await.unwrap_err();
    assert_eq!(unknown[0].summary, "Unknown resource type");
}
