//! marketo_smart_list data source

use async_trait::async_trait;
use std::sync::OnceLock;
use tfplug::context::Context;
use tfplug::schema::{Schema, SchemaBuilder};
use tfplug::types::{AttributePath, DynamicValue};

use super::{lookup_attributes, NamedLookup};
use crate::api::assets::smart_list::SmartList;
use crate::api::{ApiError, Client};

#[derive(Default)]
pub struct SmartListLookup;

#[async_trait]
impl NamedLookup for SmartListLookup {
    type Remote = SmartList;

    const TYPE_NAME: &'static str = "marketo_smart_list";
    const KIND: &'static str = "smart list";

    fn schema(&self) -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            let mut builder = SchemaBuilder::new()
                .version(0)
                .description("Looks up a Marketo smart list by name, e.g. as a clone source");
            for attr in lookup_attributes(Self::KIND) {
                builder = builder.attribute(attr);
            }
            builder.build()
        })
    }

    async fn find(
        &self,
        client: &Client,
        ctx: &Context,
        name: &str,
    ) -> Result<SmartList, ApiError> {
        client.assets().smart_lists().get_by_name(ctx, name).await
    }

    fn apply_remote(&self, remote: &SmartList, state: &mut DynamicValue) -> tfplug::Result<()> {
        state.set_string(&AttributePath::new("id"), remote.id.clone())
    }
}
