//! Marketo data sources
//!
//! Both data sources resolve an asset by name through a `byName` endpoint.
//! [`LookupDataSource`] carries the shared read flow.

pub mod channel;
pub mod smart_list;

pub use channel::ChannelLookup;
pub use smart_list::SmartListLookup;

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource,
    DataSourceSchemaRequest, DataSourceSchemaResponse, DataSourceWithConfigure,
    ReadDataSourceRequest, ReadDataSourceResponse, ValidateDataSourceConfigRequest,
    ValidateDataSourceConfigResponse,
};
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType, Schema};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::validator::StringLengthValidator;
use tracing::debug;

use crate::api::{ApiError, Client};
use crate::resources::{last_updated, not_configured};
use crate::MarketoProviderData;

/// A by-name lookup of one Marketo asset kind
#[async_trait]
pub trait NamedLookup: Default + Send + Sync + 'static {
    type Remote: Send + Sync;

    const TYPE_NAME: &'static str;
    const KIND: &'static str;

    fn schema(&self) -> &'static Schema;

    async fn find(&self, client: &Client, ctx: &Context, name: &str)
        -> Result<Self::Remote, ApiError>;

    /// Write the found asset into state; `name` is already set
    fn apply_remote(&self, remote: &Self::Remote, state: &mut DynamicValue) -> tfplug::Result<()>;
}

#[derive(Default)]
pub struct LookupDataSource<L: NamedLookup> {
    lookup: L,
    provider_data: Option<MarketoProviderData>,
}

impl<L: NamedLookup> LookupDataSource<L> {
    pub fn new() -> Self {
        Self {
            lookup: L::default(),
            provider_data: None,
        }
    }
}

#[async_trait]
impl<L: NamedLookup> DataSource for LookupDataSource<L> {
    fn type_name(&self) -> &str {
        L::TYPE_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: self.lookup.schema().clone(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        _request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        ValidateDataSourceConfigResponse {
            diagnostics: vec![],
        }
    }

    async fn read(&self, ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return ReadDataSourceResponse::failed(request.config, not_configured());
        };

        let name = match request.config.get_string(&AttributePath::new("name")) {
            Ok(name) => name,
            Err(e) => {
                return ReadDataSourceResponse::failed(
                    request.config,
                    Diagnostic::error("Invalid configuration", format!("Could not read name: {}", e))
                        .with_attribute(AttributePath::new("name")),
                )
            }
        };

        debug!("Looking up {} '{}'", L::KIND, name);
        match self.lookup.find(&provider_data.client, &ctx, &name).await {
            Ok(remote) => {
                let mut diagnostics = vec![];
                let mut state = request.config;
                let result = self
                    .lookup
                    .apply_remote(&remote, &mut state)
                    .and_then(|_| state.set_string(&AttributePath::new("last_updated"), last_updated()));
                if let Err(e) = result {
                    diagnostics.push(Diagnostic::error(
                        "Failed to set state",
                        format!("Could not record {} in state: {}", L::KIND, e),
                    ));
                }
                ReadDataSourceResponse { state, diagnostics }
            }
            Err(e) => {
                let summary = if e.is_not_found() {
                    format!("{} not found", capitalize(L::KIND))
                } else {
                    format!("Failed to read {}", L::KIND)
                };
                ReadDataSourceResponse::failed(
                    request.config,
                    Diagnostic::error(
                        summary,
                        format!("Could not find {} named '{}': {}", L::KIND, name, e),
                    ),
                )
            }
        }
    }
}

#[async_trait]
impl<L: NamedLookup> DataSourceWithConfigure for LookupDataSource<L> {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        // Nothing to keep before the provider is configured; read reports it
        match request.data::<MarketoProviderData>() {
            Ok(data) => {
                self.provider_data = data.cloned();
                ConfigureDataSourceResponse::default()
            }
            Err(diag) => ConfigureDataSourceResponse {
                diagnostics: vec![diag],
            },
        }
    }
}

fn capitalize(kind: &str) -> String {
    let mut chars = kind.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `name` (required), `id` and `last_updated` (computed)
pub(crate) fn lookup_attributes(kind: &str) -> Vec<Attribute> {
    vec![
        AttributeBuilder::new("name", AttributeType::String)
            .description(&format!("Name of the {} to look up", kind))
            .required()
            .validator(StringLengthValidator {
                min: Some(1),
                max: None,
            })
            .build(),
        AttributeBuilder::new("id", AttributeType::String)
            .description(&format!("ID of the {}", kind))
            .computed()
            .build(),
        AttributeBuilder::new("last_updated", AttributeType::String)
            .description("Time of the lookup")
            .computed()
            .build(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capitalize_kind() {
        assert_eq!(capitalize("smart list"), "Smart list");
        assert_eq!(capitalize(""), "");
    }
}
