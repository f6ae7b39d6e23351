//! marketo_smart_list resource

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
use crate::api::assets::smart_list::{SmartList, SmartListRequest};
use crate::api::common::FolderRef;
use crate::api::{ApiError, Client};

#[derive(Default)]
pub struct SmartListAsset;

#[async_trait]
impl ManagedAsset for SmartListAsset {
    type Request = SmartListRequest;
    type Remote = SmartList;

    const TYPE_NAME: &'static str = "marketo_smart_list";
    const KIND: &'static str = "smart list";

    fn schema(&self) -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            let mut builder = SchemaBuilder::new()
                .version(0)
                .description("Manages a Marketo smart list cloned from an existing one")
                .attribute(id_attribute())
                .attribute(name_attribute("Smart list name"))
                .attribute(description_attribute());
            for attr in placement_attributes() {
                builder = builder.attribute(attr);
            }
            builder
                .attribute(
                    AttributeBuilder::new("source", AttributeType::String)
                        .description("ID of the smart list cloned on creation")
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

    fn update_warnings(&self, prior: &DynamicValue, config: &DynamicValue) -> Vec<Diagnostic> {
        let prior_source = optional_string(prior, "source").ok().flatten();
        let source = optional_string(config, "source").ok().flatten();
        match (prior_source, source) {
            (Some(before), Some(after)) if before != after => vec![Diagnostic::warning(
                "Smart list source changed",
                format!(
                    "The smart list was cloned from {}; changing source to {} has no effect on the existing list",
                    before, after
                ),
            )
            .with_attribute(AttributePath::new("source"))],
            _ => vec![],
        }
    }

    fn request(&self, config: &DynamicValue) -> tfplug::Result<SmartListRequest> {
        Ok(SmartListRequest {
            name: config.get_string(&AttributePath::new("name"))?,
            description: optional_string(config, "description")?,
            folder: placement_from(config)?,
            source: config.get_string(&AttributePath::new("source"))?,
        })
    }

    fn remote_id<'r>(&self, remote: &'r SmartList) -> &'r str {
        &remote.id
    }

    fn apply_remote(&self, remote: &SmartList, state: &mut DynamicValue) -> tfplug::Result<()> {
        state.set_string(&AttributePath::new("name"), remote.name.clone())?;
        set_server_string(state, "description", remote.description.as_deref())?;
        set_placement(state, remote.folder.as_ref().map(FolderRef::placement))
    }

    async fn create(
        &self,
        client: &Client,
        ctx: &Context,
        request: &SmartListRequest,
    ) -> Result<SmartList, ApiError> {
        client.assets().smart_lists().create(ctx, request).await
    }

    async fn get(&self, client: &Client, ctx: &Context, id: &str) -> Result<SmartList, ApiError> {
        client.assets().smart_lists().get(ctx, id).await
    }

    async fn update(
        &self,
        client: &Client,
        ctx: &Context,
        id: &str,
        request: &SmartListRequest,
    ) -> Result<SmartList, ApiError> {
        client.assets().smart_lists().update(ctx, id, request).await
    }

    async fn delete(&self, client: &Client, ctx: &Context, id: &str) -> Result<(), ApiError> {
        client.assets().smart_lists().delete(ctx, id).await
    }
}
