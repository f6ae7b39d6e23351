//! marketo_program resource

use async_trait::async_trait;
use std::sync::OnceLock;
use tfplug::context::Context;
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, DynamicValue};
use tfplug::validator::OneOfValidator;

use super::{
    description_attribute, id_attribute, last_updated_attribute, name_attribute,
    optional_string, set_server_string, set_string_or_keep, ManagedAsset,
};
use crate::api::assets::program::{Program, ProgramRequest, DEFAULT_PROGRAM_TYPE};
use crate::api::common::Placement;
use crate::api::{ApiError, Client};

const PROGRAM_TYPES: [&str; 5] = ["Default", "Event", "Event with Webinar", "Engagement", "Email"];

#[derive(Default)]
pub struct ProgramAsset;

#[async_trait]
impl ManagedAsset for ProgramAsset {
    type Request = ProgramRequest;
    type Remote = Program;

    const TYPE_NAME: &'static str = "marketo_program";
    const KIND: &'static str = "program";

    fn schema(&self) -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            SchemaBuilder::new()
                .version(0)
                .description("Manages a Marketo program")
                .attribute(id_attribute())
                .attribute(name_attribute("Program name, unique within the workspace"))
                .attribute(description_attribute())
                .attribute(
                    AttributeBuilder::new("folder", AttributeType::String)
                        .description("ID of the folder holding the program")
                        .optional()
                        .computed()
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("type", AttributeType::String)
                        .description("Program type, defaults to Default")
                        .optional()
                        .computed()
                        .validator(OneOfValidator {
                            values: PROGRAM_TYPES.iter().map(|t| t.to_string()).collect(),
                        })
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("channel", AttributeType::String)
                        .description("Channel of the program, e.g. Online Advertising")
                        .optional()
                        .computed()
                        .build(),
                )
                .attribute(last_updated_attribute())
                .build()
        })
    }

    fn immutable_attributes(&self) -> &'static [&'static str] {
        &["type", "channel", "folder"]
    }

    fn request(&self, config: &DynamicValue) -> tfplug::Result<ProgramRequest> {
        Ok(ProgramRequest {
            name: config.get_string(&AttributePath::new("name"))?,
            description: optional_string(config, "description")?,
            folder: optional_string(config, "folder")?.map(Placement::Folder),
            program_type: optional_string(config, "type")?,
            channel: optional_string(config, "channel")?,
        })
    }

    fn remote_id<'r>(&self, remote: &'r Program) -> &'r str {
        &remote.id
    }

    fn apply_remote(&self, remote: &Program, state: &mut DynamicValue) -> tfplug::Result<()> {
        state.set_string(&AttributePath::new("name"), remote.name.clone())?;
        set_server_string(state, "description", remote.description.as_deref())?;
        let folder = remote.folder.as_ref().map(|f| f.id.as_str());
        set_string_or_keep(state, "folder", folder)?;
        let program_type = remote
            .program_type
            .as_deref()
            .or(Some(DEFAULT_PROGRAM_TYPE));
        set_string_or_keep(state, "type", program_type)?;
        set_string_or_keep(state, "channel", remote.channel.as_deref())
    }

    async fn create(
        &self,
        client: &Client,
        ctx: &Context,
        request: &ProgramRequest,
    ) -> Result<Program, ApiError> {
        client.assets().programs().create(ctx, request).await
    }

    async fn get(&self, client: &Client, ctx: &Context, id: &str) -> Result<Program, ApiError> {
        client.assets().programs().get(ctx, id).await
    }

    async fn update(
        &self,
        client: &Client,
        ctx: &Context,
        id: &str,
        request: &ProgramRequest,
    ) -> Result<Program, ApiError> {
        client.assets().programs().update(ctx, id, request).await
    }

    async fn delete(&self, client: &Client, ctx: &Context, id: &str) -> Result<(), ApiError> {
        client.assets().programs().delete(ctx, id).await
    }
}
