//! marketo_smart_campaign resource

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tfplug::context::Context;
use tfplug::schema::{AttributeBuilder, AttributeType, NestedType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::Rfc3339Validator;
use tfplug::TfplugError;

use super::{
    description_attribute, id_attribute, last_updated_attribute, name_attribute,
    optional_string, placement_attributes, placement_from, set_placement, set_server_string,
    validate_placement, ManagedAsset,
};
use crate::api::assets::smart_campaign::{Schedule, SmartCampaign, SmartCampaignRequest};
use crate::api::common::FolderRef;
use crate::api::{ApiError, Client};

#[derive(Default)]
pub struct SmartCampaignAsset;

fn schedule_from(config: &DynamicValue) -> tfplug::Result<Option<Schedule>> {
    let path = AttributePath::new("schedule");
    let fields = match config.get(&path) {
        Ok(Dynamic::Map(fields)) => fields,
        Ok(Dynamic::Null | Dynamic::Unknown) | Err(TfplugError::AttributeNotFound(_)) => {
            return Ok(None)
        }
        Ok(other) => {
            return Err(TfplugError::TypeMismatch {
                expected: "object".to_string(),
                actual: other.type_name().to_string(),
            })
        }
        Err(e) => return Err(e),
    };

    let run_at = fields
        .get("run_at")
        .and_then(Dynamic::as_string)
        .ok_or_else(|| TfplugError::AttributeNotFound(path.clone().attribute("run_at").to_string()))?
        .to_string();

    let tokens = match fields.get("tokens") {
        Some(Dynamic::Map(tokens)) => tokens
            .iter()
            .filter_map(|(name, value)| {
                value
                    .as_string()
                    .map(|v| (name.clone(), v.to_string()))
            })
            .collect(),
        _ => BTreeMap::new(),
    };

    Ok(Some(Schedule { run_at, tokens }))
}

#[async_trait]
impl ManagedAsset for SmartCampaignAsset {
    type Request = SmartCampaignRequest;
    type Remote = SmartCampaign;

    const TYPE_NAME: &'static str = "marketo_smart_campaign";
    const KIND: &'static str = "smart campaign";

    fn schema(&self) -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            let mut builder = SchemaBuilder::new()
                .version(0)
                .description("Manages a Marketo batch smart campaign")
                .attribute(id_attribute())
                .attribute(name_attribute("Campaign name"))
                .attribute(description_attribute());
            for attr in placement_attributes() {
                builder = builder.attribute(attr);
            }
            builder
                .attribute(
                    AttributeBuilder::new("schedule", AttributeType::String)
                        .description("Batch run to schedule on create, and again whenever it changes")
                        .optional()
                        .nested_type(NestedType::single(vec![
                            AttributeBuilder::new("run_at", AttributeType::String)
                                .description("RFC 3339 time of the run")
                                .required()
                                .validator(Rfc3339Validator)
                                .build(),
                            AttributeBuilder::new(
                                "tokens",
                                AttributeType::Map(Box::new(AttributeType::String)),
                            )
                            .description("My-token overrides for the run")
                            .optional()
                            .build(),
                        ]))
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

    fn request(&self, config: &DynamicValue) -> tfplug::Result<SmartCampaignRequest> {
        Ok(SmartCampaignRequest {
            name: config.get_string(&AttributePath::new("name"))?,
            description: optional_string(config, "description")?,
            folder: placement_from(config)?,
            schedule: schedule_from(config)?,
        })
    }

    /// Each schedule call queues another batch run, so only send one when
    /// the block differs from what was last applied
    fn update_request(
        &self,
        prior: &DynamicValue,
        config: &DynamicValue,
    ) -> tfplug::Result<SmartCampaignRequest> {
        let mut request = self.request(config)?;
        if request.schedule == schedule_from(prior)? {
            request.schedule = None;
        }
        Ok(request)
    }

        fn remote_id<'r>(&self, remote: &'r SmartCampaign) -> &'r str {
        &remote.id
    }

    fn apply_remote(&self, remote: &SmartCampaign, state: &mut DynamicValue) -> tfplug::Result<()> {
        state.set_string(&AttributePath::new("name"), remote.name.clone())?;
        set_server_string(state, "description", remote.description.as_deref())?;
        set_placement(state, remote.folder.as_ref().map(FolderRef::placement))
    }

    async fn create(
        &self,
        client: &Client,
        ctx: &Context,
        request: &SmartCampaignRequest,
    ) -> Result<SmartCampaign, ApiError> {
        client.assets().smart_campaigns().create(ctx, request).await
    }

    async fn get(
        &self,
        client: &Client,
        ctx: &Context,
        id: &str,
    ) -> Result<SmartCampaign, ApiError> {
        client.assets().smart_campaigns().get(ctx, id).await
    }

    async fn update(
        &self,
        client: &Client,
        ctx: &Context,
        id: &str,
        request: &SmartCampaignRequest,
    ) -> Result<SmartCampaign, ApiError> {
        client
            .assets()
            .smart_campaigns()
            .update(ctx, id, request)
            .await
    }

    async fn delete(&self, client: &Client, ctx: &Context, id: &str) -> Result<(), ApiError> {
        client.assets().smart_campaigns().delete(ctx, id).await
    }
}
