//! Folder API implementation

use serde::Deserialize;
use tfplug::Context;

use super::{fetch, remove, submit, MarketoAsset, ASSET_PREFIX};
use crate::api::common::{string_or_number, ApiQueryParams, FolderRef, FormParams, Placement};
use crate::api::{ApiError, Client};

/// Response from GET /rest/asset/v1/folder/{id}.json
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    #[serde(with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent: Option<FolderRef>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub is_archive: Option<bool>,
}

impl MarketoAsset for Folder {
    const KIND: &'static str = "folder";

    fn entity_path() -> &'static str {
        "/rest/asset/v1/folder"
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FolderRequest {
    pub name: String,
    pub description: Option<String>,
    pub parent: Option<Placement>,
}

pub struct FoldersApi<'a> {
    client: &'a Client,
}

impl<'a> FoldersApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn create(&self, ctx: &Context, request: &FolderRequest) -> Result<Folder, ApiError> {
        let form = FormParams::new()
            .add("name", &request.name)
            .add_optional("parent", request.parent.as_ref().map(Placement::to_param))
            .add_optional("description", request.description.as_ref());

        submit(
            self.client,
            ctx,
            &format!("{}/folders.json", ASSET_PREFIX),
            &form,
        )
        .await
    }

    /// Folder ids and program ids share a namespace per type, so lookups
    /// always state the type
    pub async fn get(&self, ctx: &Context, id: &str) -> Result<Folder, ApiError> {
        fetch(
            self.client,
            ctx,
            id,
            &ApiQueryParams::new().add("type", "Folder"),
        )
        .await
    }

    pub async fn update(
        &self,
        ctx: &Context,
        id: &str,
        request: &FolderRequest,
    ) -> Result<Folder, ApiError> {
        let form = FormParams::new()
            .add("name", &request.name)
            .add("description", request.description.as_deref().unwrap_or(""))
            .add("type", "Folder");

        submit(self.client, ctx, &Folder::resource_path(id), &form).await
    }

    pub async fn delete(&self, ctx: &Context, id: &str) -> Result<(), ApiError> {
        remove::<Folder>(
            self.client,
            ctx,
            id,
            &FormParams::new().add("type", "Folder"),
        )
        .await
    }
}
