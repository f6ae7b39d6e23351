//! Program API implementation

use serde::Deserialize;
use tfplug::Context;

use super::{fetch, remove, submit, MarketoAsset, ASSET_PREFIX};
use crate::api::common::{string_or_number, ApiQueryParams, FolderRef, FormParams, Placement};
use crate::api::{ApiError, Client};

/// Program type used when none is configured
pub const DEFAULT_PROGRAM_TYPE: &str = "Default";

/// Response from GET /rest/asset/v1/program/{id}.json
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    #[serde(with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub folder: Option<FolderRef>,
    #[serde(rename = "type", default)]
    pub program_type: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl MarketoAsset for Program {
    const KIND: &'static str = "program";

    fn entity_path() -> &'static str {
        "/rest/asset/v1/program"
    }
}

/// Fields sent on create and update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramRequest {
    pub name: String,
    pub description: Option<String>,
    pub folder: Option<Placement>,
    pub program_type: Option<String>,
    pub channel: Option<String>,
}

pub struct ProgramsApi<'a> {
    client: &'a Client,
}

impl<'a> ProgramsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn create(&self, ctx: &Context, request: &ProgramRequest) -> Result<Program, ApiError> {
        let form = FormParams::new()
            .add("name", &request.name)
            .add_optional("folder", request.folder.as_ref().map(Placement::to_param))
            .add(
                "type",
                request.program_type.as_deref().unwrap_or(DEFAULT_PROGRAM_TYPE),
            )
            .add_optional("channel", request.channel.as_ref())
            .add_optional("description", request.description.as_ref());

        submit(
            self.client,
            ctx,
            &format!("{}/programs.json", ASSET_PREFIX),
            &form,
        )
        .await
    }

    pub async fn get(&self, ctx: &Context, id: &str) -> Result<Program, ApiError> {
        fetch(self.client, ctx, id, &ApiQueryParams::new()).await
    }

    /// Type, channel and folder are fixed at creation; only name and
    /// description are sent
    pub async fn update(
        &self,
        ctx: &Context,
        id: &str,
        request: &ProgramRequest,
    ) -> Result<Program, ApiError> {
        let form = FormParams::new()
            .add("name", &request.name)
            .add("description", request.description.as_deref().unwrap_or(""));

        submit(self.client, ctx, &Program::resource_path(id), &form).await
    }

    pub async fn delete(&self, ctx: &Context, id: &str) -> Result<(), ApiError> {
        remove::<Program>(self.client, ctx, id, &FormParams::new()).await
    }
}
