//! Email API implementation
//!
//! An email is created from a template, then its editable sections are
//! filled one request per section. Header fields (subject, sender, reply-to)
//! are updated through the content endpoint rather than the metadata one.

use serde::Deserialize;
use tfplug::Context;

use super::{fetch, remove, submit, MarketoAsset, ASSET_PREFIX};
use crate::api::common::{
    deserialize_text_value, string_or_number, ApiQueryParams, FolderRef, FormParams, Placement,
};
use crate::api::{ApiError, Client};

/// Response from GET /rest/asset/v1/email/{id}.json
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Email {
    #[serde(with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub folder: Option<FolderRef>,
    #[serde(default, deserialize_with = "deserialize_text_value")]
    pub subject: Option<String>,
    #[serde(default, deserialize_with = "deserialize_text_value")]
    pub from_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_text_value")]
    pub from_email: Option<String>,
    #[serde(default, deserialize_with = "deserialize_text_value")]
    pub reply_email: Option<String>,
    #[serde(default, deserialize_with = "string_or_number::deserialize_optional")]
    pub template: Option<String>,
    #[serde(default)]
    pub operational: Option<bool>,
    #[serde(default)]
    pub text_only: Option<bool>,
    #[serde(default)]
    pub status: Option<String>,
}

impl MarketoAsset for Email {
    const KIND: &'static str = "email";

    fn entity_path() -> &'static str {
        "/rest/asset/v1/email"
    }
}

/// What fills an editable section
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionContent {
    Text(String),
    DynamicContent(String),
    Snippet(String),
}

impl SectionContent {
    fn type_name(&self) -> &'static str {
        match self {
            SectionContent::Text(_) => "Text",
            SectionContent::DynamicContent(_) => "DynamicContent",
            SectionContent::Snippet(_) => "Snippet",
        }
    }

    fn value(&self) -> &str {
        match self {
            SectionContent::Text(v) | SectionContent::DynamicContent(v) | SectionContent::Snippet(v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentBlock {
    /// htmlId of the editable section in the template
    pub section: String,
    pub content: SectionContent,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmailRequest {
    pub name: String,
    pub description: Option<String>,
    pub folder: Option<Placement>,
    pub template: String,
    pub subject: String,
    pub from_name: String,
    pub from_email: String,
    pub reply_to: String,
    pub operational: Option<bool>,
    pub text_only: Option<bool>,
    pub content: Vec<ContentBlock>,
}

/// Header fields on the content endpoint take `{"type":"Text","value":..}`
fn text_param(value: &str) -> String {
    serde_json::json!({ "type": "Text", "value": value }).to_string()
}

pub struct EmailsApi<'a> {
    client: &'a Client,
}

impl<'a> EmailsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn create(&self, ctx: &Context, request: &EmailRequest) -> Result<Email, ApiError> {
        let form = FormParams::new()
            .add("name", &request.name)
            .add_optional("folder", request.folder.as_ref().map(Placement::to_param))
            .add("template", &request.template)
            .add_optional("description", request.description.as_ref())
            .add("subject", &request.subject)
            .add("fromName", &request.from_name)
            .add("fromEmail", &request.from_email)
            .add("replyEmail", &request.reply_to)
            .add_optional("operational", request.operational)
            .add_optional("textOnly", request.text_only);

        let email: Email = submit(
            self.client,
            ctx,
            &format!("{}/emails.json", ASSET_PREFIX),
            &form,
        )
        .await?;

        if let Err(e) = self.update_sections(ctx, &email.id, &request.content).await {
            return Err(ApiError::incomplete(Email::KIND, email.id, e));
        }

        Ok(email)
    }

    pub async fn get(&self, ctx: &Context, id: &str) -> Result<Email, ApiError> {
        fetch(self.client, ctx, id, &ApiQueryParams::new()).await
    }

    /// Replace metadata, header fields and section content, then read back
    /// the canonical email
    pub async fn update(
        &self,
        ctx: &Context,
        id: &str,
        request: &EmailRequest,
    ) -> Result<Email, ApiError> {
        let metadata = FormParams::new()
            .add("name", &request.name)
            .add("description", request.description.as_deref().unwrap_or(""))
            .add_optional("operational", request.operational)
            .add_optional("textOnly", request.text_only);
        self.client
            .post_form(ctx, &Email::resource_path(id), &metadata)
            .await?;

        let headers = FormParams::new()
            .add("subject", text_param(&request.subject))
            .add("fromName", text_param(&request.from_name))
            .add("fromEmail", text_param(&request.from_email))
            .add("replyTo", text_param(&request.reply_to));
        self.client
            .post_form(
                ctx,
                &format!(
                    "{}/email/{}/content.json",
                    ASSET_PREFIX,
                    urlencoding::encode(id)
                ),
                &headers,
            )
            .await?;

        self.update_sections(ctx, id, &request.content).await?;

        self.get(ctx, id).await
    }

    pub async fn delete(&self, ctx: &Context, id: &str) -> Result<(), ApiError> {
        remove::<Email>(self.client, ctx, id, &FormParams::new()).await
    }

    async fn update_sections(
        &self,
        ctx: &Context,
        id: &str,
        blocks: &[ContentBlock],
    ) -> Result<(), ApiError> {
        for block in blocks {
            let form = FormParams::new()
                .add("type", block.content.type_name())
                .add("value", block.content.value());
            let path = format!(
                "{}/email/{}/content/{}.json",
                ASSET_PREFIX,
                urlencoding::encode(id),
                urlencoding::encode(&block.section)
            );

            tracing::debug!("Updating section {} of email {}", block.section, id);
            self.client.post_form(ctx, &path, &form).await?;
        }
        Ok(())
    }
}
