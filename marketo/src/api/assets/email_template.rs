//! Email template API implementation

use serde::Deserialize;
use tfplug::Context;

use super::{fetch, remove, submit, MarketoAsset, ASSET_PREFIX};
use crate::api::common::{string_or_number, ApiQueryParams, FolderRef, FormParams, Placement};
use crate::api::{ApiError, Client};

/// Response from GET /rest/asset/v1/emailTemplate/{id}.json.
/// The HTML body is not part of the metadata.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailTemplate {
    #[serde(with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub folder: Option<FolderRef>,
    #[serde(default)]
    pub status: Option<String>,
}

impl MarketoAsset for EmailTemplate {
    const KIND: &'static str = "email template";

    fn entity_path() -> &'static str {
        "/rest/asset/v1/emailTemplate"
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmailTemplateRequest {
    pub name: String,
    pub description: Option<String>,
    pub folder: Option<Placement>,
    /// Template HTML
    pub content: String,
}

pub struct EmailTemplatesApi<'a> {
    client: &'a Client,
}

impl<'a> EmailTemplatesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn create(
        &self,
        ctx: &Context,
        request: &EmailTemplateRequest,
    ) -> Result<EmailTemplate, ApiError> {
        let form = FormParams::new()
            .add("name", &request.name)
            .add_optional("folder", request.folder.as_ref().map(Placement::to_param))
            .add_optional("description", request.description.as_ref())
            .add("content", &request.content);

        submit(
            self.client,
            ctx,
            &format!("{}/emailTemplates.json", ASSET_PREFIX),
            &form,
        )
        .await
    }

    pub async fn get(&self, ctx: &Context, id: &str) -> Result<EmailTemplate, ApiError> {
        fetch(self.client, ctx, id, &ApiQueryParams::new()).await
    }

    pub async fn update(
        &self,
        ctx: &Context,
        id: &str,
        request: &EmailTemplateRequest,
    ) -> Result<EmailTemplate, ApiError> {
        let metadata = FormParams::new()
            .add("name", &request.name)
            .add("description", request.description.as_deref().unwrap_or(""));
        let template: EmailTemplate =
            submit(self.client, ctx, &EmailTemplate::resource_path(id), &metadata).await?;

        let content = FormParams::new().add("content", &request.content);
        self.client
            .post_form(
                ctx,
                &format!(
                    "{}/emailTemplate/{}/content.json",
                    ASSET_PREFIX,
                    urlencoding::encode(id)
                ),
                &content,
            )
            .await?;

        Ok(template)
    }

    pub async fn delete(&self, ctx: &Context, id: &str) -> Result<(), ApiError> {
        remove::<EmailTemplate>(self.client, ctx, id, &FormParams::new()).await
    }
}
