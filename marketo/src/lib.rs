//! Terraform provider for Marketo
//!
//! Manages programs, folders, emails, email templates, smart campaigns and
//! smart lists through the Marketo REST API, and looks up channels and smart
//! lists by name.

pub mod api;
pub mod config;
pub mod data_sources;
pub mod provider_data;
pub mod resources;

pub use config::ProviderConfig;
pub use provider_data::MarketoProviderData;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tfplug::context::Context;
use tfplug::data_source::DataSourceWithConfigure;
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider, ProviderData,
    ProviderSchemaRequest, ProviderSchemaResponse, ResourceFactory,
    ValidateProviderConfigRequest, ValidateProviderConfigResponse,
};
use tfplug::resource::ResourceWithConfigure;
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic};
use tracing::info;

use data_sources::{ChannelLookup, LookupDataSource, NamedLookup, SmartListLookup};
use resources::{
    AssetResource, EmailAsset, EmailTemplateAsset, FolderAsset, ManagedAsset, ProgramAsset,
    SmartCampaignAsset, SmartListAsset,
};

#[derive(Default)]
pub struct MarketoProvider;

impl MarketoProvider {
    pub fn new() -> Self {
        Self
    }

    fn provider_schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            SchemaBuilder::new()
                .version(0)
                .description("Marketo provider")
                .attribute(
                    AttributeBuilder::new("endpoint", AttributeType::String)
                        .description(
                            "REST endpoint of the Marketo instance, e.g. https://123-ABC-456.mktorest.com. \
                             Falls back to MARKETO_ENDPOINT",
                        )
                        .optional()
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("id", AttributeType::String)
                        .description("Client ID of the API service. Falls back to MARKETO_ID")
                        .optional()
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("secret", AttributeType::String)
                        .description("Client secret of the API service. Falls back to MARKETO_SECRET")
                        .optional()
                        .sensitive()
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("max_retries", AttributeType::Number)
                        .description("Retries for rate-limited or failed requests, 0 to 10, defaults to 3")
                        .optional()
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("request_timeout", AttributeType::Number)
                        .description("Per-request timeout in seconds, 1 to 3600, defaults to 10")
                        .optional()
                        .build(),
                )
                .build()
        })
    }
}

fn resource_factory<M: ManagedAsset>() -> (String, ResourceFactory) {
    (
        M::TYPE_NAME.to_string(),
        Box::new(|| Box::new(AssetResource::<M>::new()) as Box<dyn ResourceWithConfigure>),
    )
}

fn data_source_factory<L: NamedLookup>() -> (String, DataSourceFactory) {
    (
        L::TYPE_NAME.to_string(),
        Box::new(|| Box::new(LookupDataSource::<L>::new()) as Box<dyn DataSourceWithConfigure>),
    )
}

#[async_trait]
impl Provider for MarketoProvider {
    fn type_name(&self) -> &str {
        "marketo"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ProviderSchemaRequest,
    ) -> ProviderSchemaResponse {
        ProviderSchemaResponse {
            schema: Self::provider_schema().clone(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateProviderConfigRequest,
    ) -> ValidateProviderConfigResponse {
        let mut diagnostics = vec![];

        // Only literal endpoints can be checked before configure
        if let Ok(Dynamic::String(endpoint)) = request.config.get(&AttributePath::new("endpoint")) {
            if !endpoint.trim().is_empty() {
                if let Err(e) = api::client::normalize_endpoint(endpoint) {
                    diagnostics.push(
                        Diagnostic::error("Invalid endpoint", e.to_string())
                            .with_attribute(AttributePath::new("endpoint")),
                    );
                }
            }
        }

        ValidateProviderConfigResponse { diagnostics }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        let (resolved, mut diagnostics) = ProviderConfig::resolve(&request.config);

        let Some(config) = resolved else {
            return ConfigureProviderResponse {
                diagnostics,
                provider_data: None,
            };
        };

        let provider_data = match api::Client::with_config(
            &config.endpoint,
            &config.client_id,
            &config.client_secret,
            config.retry_config(),
        ) {
            Ok(client) => {
                info!("Configured Marketo client for {}", client.base_url());
                let data: ProviderData = Arc::new(MarketoProviderData::new(client));
                Some(data)
            }
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to create API client",
                    e.to_string(),
                ));
                None
            }
        };

        ConfigureProviderResponse {
            diagnostics,
            provider_data,
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        HashMap::from([
            resource_factory::<ProgramAsset>(),
            resource_factory::<FolderAsset>(),
            resource_factory::<EmailAsset>(),
            resource_factory::<EmailTemplateAsset>(),
            resource_factory::<SmartCampaignAsset>(),
            resource_factory::<SmartListAsset>(),
        ])
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        HashMap::from([
            data_source_factory::<ChannelLookup>(),
            data_source_factory::<SmartListLookup>(),
        ])
    }
}
