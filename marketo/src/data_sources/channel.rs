//! marketo_channel data source

use async_trait::async_trait;
use std::sync::OnceLock;
use tfplug::context::Context;
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, DynamicValue};

use super::{lookup_attributes, NamedLookup};
use crate::api::assets::channel::Channel;
use crate::api::{ApiError, Client};
use crate::resources::set_optional_string;

#[derive(Default)]
pub struct ChannelLookup;

#[async_trait]
impl NamedLookup for ChannelLookup {
    type Remote = Channel;

    const TYPE_NAME: &'static str = "marketo_channel";
    const KIND: &'static str = "channel";

    fn schema(&self) -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            let mut builder = SchemaBuilder::new()
                .version(0)
                .description("Looks up a Marketo channel by name");
            for attr in lookup_attributes(Self::KIND) {
                builder = builder.attribute(attr);
            }
            builder
                .attribute(
                    AttributeBuilder::new("program_type", AttributeType::String)
                        .description("Program type the channel applies to")
                        .computed()
                        .build(),
                )
                .build()
        })
    }

    async fn find(&self, client: &Client, ctx: &Context, name: &str) -> Result<Channel, ApiError> {
        client.assets().channels().get_by_name(ctx, name).await
    }

    fn apply_remote(&self, remote: &Channel, state: &mut DynamicValue) -> tfplug::Result<()> {
        state.set_string(&AttributePath::new("id"), remote.id.clone())?;
        set_optional_string(
            state,
            "program_type",
            remote.applicable_program_type.clone(),
        )
    }
}
