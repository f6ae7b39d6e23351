//! Smart list API implementation
//!
//! Smart lists can't be created empty through the API; a new list is a
//! clone of an existing one.

use serde::Deserialize;
use tfplug::Context;

use super::{fetch, remove, submit, MarketoAsset, ASSET_PREFIX};
use crate::api::client::first_result;
use crate::api::common::{string_or_number, ApiQueryParams, FolderRef, FormParams, Placement};
use crate::api::{ApiError, Client};

/// Response from GET /rest/asset/v1/smartList/{id}.json
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartList {
    #[serde(with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub folder: Option<FolderRef>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl MarketoAsset for SmartList {
    const KIND: &'static str = "smart list";

    fn entity_path() -> &'static str {
        "/rest/asset/v1/smartList"
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SmartListRequest {
    pub name: String,
    pub description: Option<String>,
    pub folder: Option<Placement>,
    /// Smart list cloned on creation
    pub source: String,
}

pub struct SmartListsApi<'a> {
    client: &'a Client,
}

impl<'a> SmartListsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn create(
        &self,
        ctx: &Context,
        request: &SmartListRequest,
    ) -> Result<SmartList, ApiError> {
        let form = FormParams::new()
            .add("name", &request.name)
            .add_optional("folder", request.folder.as_ref().map(Placement::to_param))
            .add_optional("description", request.description.as_ref());

        submit(
            self.client,
            ctx,
            &format!(
                "{}/smartList/{}/clone.json",
                ASSET_PREFIX,
                urlencoding::encode(&request.source)
            ),
            &form,
        )
        .await
    }

    pub async fn get(&self, ctx: &Context, id: &str) -> Result<SmartList, ApiError> {
        fetch(self.client, ctx, id, &ApiQueryParams::new()).await
    }

    pub async fn get_by_name(&self, ctx: &Context, name: &str) -> Result<SmartList, ApiError> {
        let results = self
            .client
            .get(
                ctx,
                &format!("{}/smartList/byName.json", ASSET_PREFIX),
                &ApiQueryParams::new().add("name", name),
            )
            .await?;
        first_result(results, &format!("smart list named '{}'", name))
    }

    /// The source list only matters at creation and is not sent
    pub async fn update(
        &self,
        ctx: &Context,
        id: &str,
        request: &SmartListRequest,
    ) -> Result<SmartList, ApiError> {
        let form = FormParams::new()
            .add("name", &request.name)
            .add("description", request.description.as_deref().unwrap_or(""));

        submit(self.client, ctx, &SmartList::resource_path(id), &form).await
    }

    pub async fn delete(&self, ctx: &Context, id: &str) -> Result<(), ApiError> {
        remove::<SmartList>(self.client, ctx, id, &FormParams::new()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::{create_test_client, mock_token};
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn create_clones_source_list() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let mock = server
            .mock("POST", "/rest/asset/v1/smartList/77/clone.json")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("name".into(), "Engaged".into()),
                Matcher::UrlEncoded("folder".into(), r#"{"id":9,"type":"Folder"}"#.into()),
            ]))
            .with_body(r#"{"success":true,"errors":[],"warnings":[],"result":[{"id":1200,"name":"Engaged","folder":{"id":9,"type":"Folder"}}]}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let list = client
            .assets()
            .smart_lists()
            .create(
                &Context::new(),
                &SmartListRequest {
                    name: "Engaged".to_string(),
                    folder: Some(Placement::Folder("9".to_string())),
                    source: "77".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(list.id, "1200");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn lookup_by_name() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _mock = server
            .mock("GET", "/rest/asset/v1/smartList/byName.json")
            .match_query(Matcher::UrlEncoded("name".into(), "All Leads".into()))
            .with_body(r#"{"success":true,"errors":[],"warnings":[],"result":[{"id":5,"name":"All Leads"}]}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let list = client
            .assets()
            .smart_lists()
            .get_by_name(&Context::new(), "All Leads")
            .await
            .unwrap();

        assert_eq!(list.id, "5");
    }
}
