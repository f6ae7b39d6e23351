//! marketo_email_template resource

use async_trait::async_trait;
use std::sync::OnceLock;
use tfplug::context::Context;
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};

use super::{
    description_attribute, id_attribute, last_updated_attribute, name_attribute,
    optional_string, placement_attributes, placement_from, set_placement, set_server_string,
    validate_placement, ManagedAsset,
};
use crate::api::assets::email_template::{EmailTemplate, EmailTemplateRequest};
use crate::api::common::FolderRef;
use crate::api::{ApiError, Client};

#[derive(Default)]
pub struct EmailTemplateAsset;

#[async_trait]
impl ManagedAsset for EmailTemplateAsset {
    type Request = EmailTemplateRequest;
    type Remote = EmailTemplate;

    const TYPE_NAME: &'static str = "marketo_email_template";
    const KIND: &'static str = "email template";

    fn schema(&self) -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            let mut builder = SchemaBuilder::new()
                .version(0)
                .description("Manages a Marketo email template")
                .attribute(id_attribute())
                .attribute(name_attribute("Template name"))
                .attribute(description_attribute());
            for attr in placement_attributes() {
                builder = builder.attribute(attr);
            }
            builder
                .attribute(
                    AttributeBuilder::new("content", AttributeType::String)
                        .description("Template HTML")
                        .required()
                        .build(),
                )
                .attribute(last_updated_attribute())
                .build()
        })
    }

    fn validate(&self, config: &DynamicValue, diagnostics: &mut Vec<Diagnostic>) {
        validate_placement(config, diagnostics);
    }

    fn immutable_attributes(&self) -> &'static [&'static str] {
        &["folder", "program"]
    }

    fn request(&self, config: &DynamicValue) -> tfplug::Result<EmailTemplateRequest> {
        Ok(EmailTemplateRequest {
            name: config.get_string(&AttributePath::new("name"))?,
            description: optional_string(config, "description")?,
            folder: placement_from(config)?,
            content: config.get_string(&AttributePath::new("content"))?,
        })
    }

    fn remote_id<'r>(&self, remote: &'r EmailTemplate) -> &'r str {
        &remote.id
    }

    fn apply_remote(&self, remote: &EmailTemplate, state: &mut DynamicValue) -> tfplug::Result<()> {
        state.set_string(&AttributePath::new("name"), remote.name.clone())?;
        set_server_string(state, "description", remote.description.as_deref())?;
        set_placement(state, remote.folder.as_ref().map(FolderRef::placement))
    }

    async fn create(
        &self,
        client: &Client,
        ctx: &Context,
        request: &EmailTemplateRequest,
    ) -> Result<EmailTemplate, ApiError> {
        client.assets().email_templates().create(ctx, request).await
    }

    async fn get(
        &self,
        client: &Client,
        ctx: &Context,
        id: &str,
    ) -> Result<EmailTemplate, ApiError> {
        client.assets().email_templates().get(ctx, id).await
    }

    async fn update(
        &self,
        client: &Client,
        ctx: &Context,
        id: &str,
        request: &EmailTemplateRequest,
    ) -> Result<EmailTemplate, ApiError> {
        client
            .assets()
            .email_templates()
            .update(ctx, id, request)
            .await
    }

    async fn delete(&self, client: &Client, ctx: &Context, id: &str) -> Result<(), ApiError> {
        client.assets().email_templates().delete(ctx, id).await
    }
}
