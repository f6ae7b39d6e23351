//! marketo_email resource
//!
//! Emails are built from a template. The `content` blocks fill the
//! template's editable sections in the order given.

use async_trait::async_trait;
use std::sync::OnceLock;
use tfplug::context::Context;
use tfplug::schema::{AttributeBuilder, AttributeType, NestedType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::{StringLengthValidator, StringPatternValidator};
use tfplug::TfplugError;

use super::{
    description_attribute, id_attribute, last_updated_attribute, name_attribute, optional_bool,
    optional_string, placement_attributes, placement_from, set_placement, set_server_string,
    set_string_or_keep, validate_placement, ManagedAsset,
};
use crate::api::assets::email::{ContentBlock, Email, EmailRequest, SectionContent};
use crate::api::common::FolderRef;
use crate::api::{ApiError, Client};

const CONTENT_KINDS: [&str; 3] = ["text", "dynamic_content", "snippet"];

#[derive(Default)]
pub struct EmailAsset;

fn content_attribute() -> tfplug::schema::Attribute {
    AttributeBuilder::new("content", AttributeType::String)
        .description("Editable sections to fill, applied in order")
        .optional()
        .nested_type(NestedType::list(vec![
            AttributeBuilder::new("section", AttributeType::String)
                .description("htmlId of the editable section in the template")
                .required()
                .validator(StringLengthValidator {
                    min: Some(1),
                    max: None,
                })
                .build(),
            AttributeBuilder::new("text", AttributeType::String)
                .description("HTML placed in the section")
                .optional()
                .build(),
            AttributeBuilder::new("dynamic_content", AttributeType::String)
                .description("ID of the segmentation driving dynamic content")
                .optional()
                .build(),
            AttributeBuilder::new("snippet", AttributeType::String)
                .description("ID of the snippet placed in the section")
                .optional()
                .build(),
        ]))
        .build()
}

fn block_value<'a>(block: &'a Dynamic, key: &str) -> Option<&'a str> {
    match block {
        Dynamic::Map(fields) => fields.get(key).and_then(Dynamic::as_string),
        _ => None,
    }
}

fn content_blocks(config: &DynamicValue) -> tfplug::Result<Vec<ContentBlock>> {
    let path = AttributePath::new("content");
    if config.is_null_at(&path) || config.is_unknown_at(&path) {
        return Ok(Vec::new());
    }

    config
        .get_list(&path)?
        .iter()
        .enumerate()
        .map(|(idx, block)| {
            let block_path = path.clone().index(idx as i64);
            let section = block_value(block, "section").ok_or_else(|| {
                TfplugError::AttributeNotFound(block_path.clone().attribute("section").to_string())
            })?;
            let content = if let Some(text) = block_value(block, "text") {
                SectionContent::Text(text.to_string())
            } else if let Some(id) = block_value(block, "dynamic_content") {
                SectionContent::DynamicContent(id.to_string())
            } else if let Some(id) = block_value(block, "snippet") {
                SectionContent::Snippet(id.to_string())
            } else {
                return Err(TfplugError::AttributeNotFound(block_path.to_string()));
            };
            Ok(ContentBlock {
                section: section.to_string(),
                content,
            })
        })
        .collect()
}

fn set_bool_or_keep(state: &mut DynamicValue, name: &str, value: Option<bool>) -> tfplug::Result<()> {
    let path = AttributePath::new(name);
    match value {
        Some(v) => state.set_bool(&path, v),
        None if state.is_unknown_at(&path) => state.set_null(&path),
        None => Ok(()),
    }
}

#[async_trait]
impl ManagedAsset for EmailAsset {
    type Request = EmailRequest;
    type Remote = Email;

    const TYPE_NAME: &'static str = "marketo_email";
    const KIND: &'static str = "email";

    fn schema(&self) -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            let mut builder = SchemaBuilder::new()
                .version(0)
                .description("Manages a Marketo email built from an email template")
                .attribute(id_attribute())
                .attribute(name_attribute("Email name"))
                .attribute(description_attribute());
            for attr in placement_attributes() {
                builder = builder.attribute(attr);
            }
            builder
                .attribute(
                    AttributeBuilder::new("template", AttributeType::String)
                        .description("ID of the email template the email is built from")
                        .required()
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("subject", AttributeType::String)
                        .description("Subject line")
                        .required()
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("from_name", AttributeType::String)
                        .description("Sender name")
                        .required()
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("from_email", AttributeType::String)
                        .description("Sender address")
                        .required()
                        .validator(StringPatternValidator::email())
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("reply_to", AttributeType::String)
                        .description("Reply-to address")
                        .required()
                        .validator(StringPatternValidator::email())
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("operational", AttributeType::Bool)
                        .description("Operational emails ignore unsubscribe status")
                        .optional()
                        .computed()
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("text_only", AttributeType::Bool)
                        .description("Send only the text version")
                        .optional()
                        .computed()
                        .build(),
                )
                .attribute(content_attribute())
                .attribute(last_updated_attribute())
                .build()
        })
    }

    fn validate(&self, config: &DynamicValue, diagnostics: &mut Vec<Diagnostic>) {
        validate_placement(config, diagnostics);

        let path = AttributePath::new("content");
        let Ok(blocks) = config.get_list(&path) else {
            return;
        };
        for (idx, block) in blocks.iter().enumerate() {
            if block.is_unknown() {
                continue;
            }
            let set = CONTENT_KINDS
                .iter()
                .filter(|kind| block_value(block, kind).is_some())
                .count();
            if set != 1 {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid content block",
                        format!(
                            "Exactly one of {} must be set, found {}",
                            CONTENT_KINDS.join(", "),
                            set
                        ),
                    )
                    .with_attribute(path.clone().index(idx as i64)),
                );
            }
        }
    }

    fn immutable_attributes(&self) -> &'static [&'static str] {
        &["folder", "program", "template"]
    }

    fn request(&self, config: &DynamicValue) -> tfplug::Result<EmailRequest> {
        Ok(EmailRequest {
            name: config.get_string(&AttributePath::new("name"))?,
            description: optional_string(config, "description")?,
            folder: placement_from(config)?,
            template: config.get_string(&AttributePath::new("template"))?,
            subject: config.get_string(&AttributePath::new("subject"))?,
            from_name: config.get_string(&AttributePath::new("from_name"))?,
            from_email: config.get_string(&AttributePath::new("from_email"))?,
            reply_to: config.get_string(&AttributePath::new("reply_to"))?,
            operational: optional_bool(config, "operational")?,
            text_only: optional_bool(config, "text_only")?,
            content: content_blocks(config)?,
        })
    }

    fn remote_id<'r>(&self, remote: &'r Email) -> &'r str {
        &remote.id
    }

    /// Section content isn't part of the email metadata and stays as
    /// configured
    fn apply_remote(&self, remote: &Email, state: &mut DynamicValue) -> tfplug::Result<()> {
        state.set_string(&AttributePath::new("name"), remote.name.clone())?;
        set_server_string(state, "description", remote.description.as_deref())?;
        set_placement(state, remote.folder.as_ref().map(FolderRef::placement))?;
        set_string_or_keep(state, "template", remote.template.as_deref())?;
        set_string_or_keep(state, "subject", remote.subject.as_deref())?;
        set_string_or_keep(state, "from_name", remote.from_name.as_deref())?;
        set_string_or_keep(state, "from_email", remote.from_email.as_deref())?;
        set_string_or_keep(state, "reply_to", remote.reply_email.as_deref())?;
        set_bool_or_keep(state, "operational", remote.operational)?;
        set_bool_or_keep(state, "text_only", remote.text_only)
    }

    async fn create(
        &self,
        client: &Client,
        ctx: &Context,
        request: &EmailRequest,
    ) -> Result<Email, ApiError> {
        client.assets().emails().create(ctx, request).await
    }

    async fn get(&self, client: &Client, ctx: &Context, id: &str) -> Result<Email, ApiError> {
        client.assets().emails().get(ctx, id).await
    }

    async fn update(
        &self,
        client: &Client,
        ctx: &Context,
        id: &str,
        request: &EmailRequest,
    ) -> Result<Email, ApiError> {
        client.assets().emails().update(ctx, id, request).await
    }

    async fn delete(&self, client: &Client, ctx: &Context, id: &str) -> Result<(), ApiError> {
        client.assets().emails().delete(ctx, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn block(fields: &[(&str, &str)]) -> Dynamic {
        Dynamic::Map(
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), Dynamic::String(v.to_string())))
                .collect::<HashMap<_, _>>(),
        )
    }

    fn config(blocks: Vec<Dynamic>) -> DynamicValue {
        let mut config = DynamicValue::object();
        for (name, value) in [
            ("name", "Welcome"),
            ("template", "7"),
            ("subject", "Hello"),
            ("from_name", "Team"),
            ("from_email", "team@example.com"),
            ("reply_to", "reply@example.com"),
            ("program", "1001"),
        ] {
            config
                .set_string(&AttributePath::new(name), value.to_string())
                .unwrap();
        }
        config
            .set_list(&AttributePath::new("content"), blocks)
            .unwrap();
        config
    }

    #[test]
    fn content_blocks_keep_order() {
        let config = config(vec![
            block(&[("section", "header"), ("text", "<h1>Hi</h1>")]),
            block(&[("section", "footer"), ("snippet", "33")]),
        ]);

        let request = EmailAsset.request(&config).unwrap();

        assert_eq!(
            request.content,
            vec![
                ContentBlock {
                    section: "header".to_string(),
                    content: SectionContent::Text("<h1>Hi</h1>".to_string()),
                },
                ContentBlock {
                    section: "footer".to_string(),
                    content: SectionContent::Snippet("33".to_string()),
                },
            ]
        );
    }

    #[test]
    fn block_with_two_kinds_is_rejected() {
        let config = config(vec![block(&[
            ("section", "header"),
            ("text", "<h1>Hi</h1>"),
            ("snippet", "33"),
        ])]);

        let mut diags = vec![];
        EmailAsset.validate(&config, &mut diags);

        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Invalid content block");
        assert_eq!(
            diags[0].attribute,
            Some(AttributePath::new("content").index(0))
        );
    }

    #[test]
    fn block_without_kind_is_rejected() {
        let config = config(vec![block(&[("section", "header")])]);

        let mut diags = vec![];
        EmailAsset.validate(&config, &mut diags);

        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn schema_checks_addresses() {
        let mut config = config(vec![]);
        config
            .set_string(&AttributePath::new("reply_to"), "not-an-address".to_string())
            .unwrap();

        let diags = EmailAsset.schema().validate(&config);

        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].attribute, Some(AttributePath::new("reply_to")));
    }
}
