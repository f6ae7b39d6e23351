//! marketo_folder resource

use async_trait::async_trait;
use std::sync::OnceLock;
use tfplug::context::Context;
use tfplug::schema::{Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};

use super::{
    description_attribute, id_attribute, last_updated_attribute, name_attribute,
    optional_string, placement_attributes, placement_from, set_placement, set_server_string,
    validate_placement, ManagedAsset,
};
use crate::api::assets::folder::{Folder, FolderRequest};
use crate::api::common::FolderRef;
use crate::api::{ApiError, Client};

#[derive(Default)]
pub struct FolderAsset;

#[async_trait]
impl ManagedAsset for FolderAsset {
    type Request = FolderRequest;
    type Remote = Folder;

    const TYPE_NAME: &'static str = "marketo_folder";
    const KIND: &'static str = "folder";

    fn schema(&self) -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            let mut builder = SchemaBuilder::new()
                .version(0)
                .description("Manages a Marketo folder. The parent is a folder or a program")
                .attribute(id_attribute())
                .attribute(name_attribute("Folder name"))
                .attribute(description_attribute());
            for attr in placement_attributes() {
                builder = builder.attribute(attr);
            }
            builder.attribute(last_updated_attribute()).build()
        })
    }

    fn validate(&self, config: &DynamicValue, diagnostics: &mut Vec<Diagnostic>) {
        validate_placement(config, diagnostics);
    }

    fn immutable_attributes(&self) -> &'static [&'static str] {
        &["folder", "program"]
    }

    fn request(&self, config: &DynamicValue) -> tfplug::Result<FolderRequest> {
        Ok(FolderRequest {
            name: config.get_string(&AttributePath::new("name"))?,
            description: optional_string(config, "description")?,
            parent: placement_from(config)?,
        })
    }

    fn remote_id<'r>(&self, remote: &'r Folder) -> &'r str {
        &remote.id
    }

    fn apply_remote(&self, remote: &Folder, state: &mut DynamicValue) -> tfplug::Result<()> {
        state.set_string(&AttributePath::new("name"), remote.name.clone())?;
        set_server_string(state, "description", remote.description.as_deref())?;
        set_placement(state, remote.parent.as_ref().map(FolderRef::placement))
    }

    async fn create(
        &self,
        client: &Client,
        ctx: &Context,
        request: &FolderRequest,
    ) -> Result<Folder, ApiError> {
        client.assets().folders().create(ctx, request).await
    }

    async fn get(&self, client: &Client, ctx: &Context, id: &str) -> Result<Folder, ApiError> {
        client.assets().folders().get(ctx, id).await
    }

    async fn update(
        &self,
        client: &Client,
        ctx: &Context,
        id: &str,
        request: &FolderRequest,
    ) -> Result<Folder, ApiError> {
        client.assets().folders().update(ctx, id, request).await
    }

    async fn delete(&self, client: &Client, ctx: &Context, id: &str) -> Result<(), ApiError> {
        client.assets().folders().delete(ctx, id).await
    }
}
