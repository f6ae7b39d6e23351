//! In-process provider host
//!
//! `ProviderHost` plays the part Terraform core plays over the plugin
//! protocol: it configures the provider once, hands the resulting provider
//! data to every resource and data source it instantiates, validates
//! configuration against schemas, and drives the CRUD and import calls with a
//! deadline per operation.

use crate::context::Context;
use crate::data_source::{
    ConfigureDataSourceRequest, DataSourceSchemaRequest, DataSourceWithConfigure,
    ReadDataSourceRequest, ValidateDataSourceConfigRequest,
};
use crate::error::{Result, TfplugError};
use crate::provider::{
    ConfigureProviderRequest, DataSourceFactory, Provider, ProviderData, ProviderSchemaRequest,
    ResourceFactory, ValidateProviderConfigRequest,
};
use crate::resource::{
    ConfigureResourceRequest, CreateResourceRequest, DeleteResourceRequest,
    ImportResourceStateRequest, ReadResourceRequest, ResourceSchemaRequest, ResourceWithConfigure,
    UpdateResourceRequest, ValidateResourceConfigRequest,
};
use crate::schema::Schema;
use crate::types::{has_errors, AttributePath, Diagnostic, DynamicValue};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Log level for provider output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Install a global fmt subscriber writing to stderr.
/// stdout is reserved for the plugin handshake line.
pub fn init_logging(level: LogLevel) -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(level.as_tracing_level())
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| TfplugError::LoggingError(e.to_string()))
}

#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Deadline applied to every configure/CRUD/import call
    pub operation_timeout: Duration,
    pub log_level: LogLevel,
    pub enable_logging: bool,
    pub terraform_version: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_secs(10),
            log_level: LogLevel::Info,
            enable_logging: false,
            terraform_version: "1.9.0".to_string(),
        }
    }
}

impl HostConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self.enable_logging = true;
        self
    }

    pub fn with_terraform_version(mut self, version: &str) -> Self {
        self.terraform_version = version.to_string();
        self
    }
}

/// Result of an operation that produces state
#[derive(Debug)]
pub struct StateOutcome {
    /// None when the object does not exist (read) or the call failed
    pub state: Option<DynamicValue>,
    pub diagnostics: Vec<Diagnostic>,
    /// Create failed after the remote object came into existence; `state`
    /// holds what is known about it
    pub tainted: bool,
}

impl StateOutcome {
    fn failed(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            state: None,
            diagnostics,
            tainted: false,
        }
    }

    fn settled(state: Option<DynamicValue>, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            state,
            diagnostics,
            tainted: false,
        }
    }

    pub fn has_errors(&self) -> bool {
        has_errors(&self.diagnostics)
    }
}

pub struct ProviderHost<P: Provider> {
    provider: RwLock<P>,
    provider_data: RwLock<Option<ProviderData>>,
    resources: HashMap<String, ResourceFactory>,
    data_sources: HashMap<String, DataSourceFactory>,
    root: Context,
    config: HostConfig,
}

impl<P: Provider> ProviderHost<P> {
    pub fn new(provider: P) -> Self {
        Self::with_config(provider, HostConfig::default())
    }

    pub fn with_config(provider: P, config: HostConfig) -> Self {
        if config.enable_logging {
            // A subscriber may already be installed by the embedding process
            if let Err(e) = init_logging(config.log_level) {
                debug!("Logging not initialised: {}", e);
            }
        }

        let resources = provider.resources();
        let data_sources = provider.data_sources();

        Self {
            provider: RwLock::new(provider),
            provider_data: RwLock::new(None),
            resources,
            data_sources,
            root: Context::new(),
            config,
        }
    }

    pub fn resource_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.resources.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn data_source_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.data_sources.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn is_configured(&self) -> bool {
        self.provider_data.read().await.is_some()
    }

    /// Cancel every in-flight and future operation
    pub fn stop(&self) {
        info!("Stopping provider host");
        self.root.cancel();
    }

    fn operation_context(&self) -> Context {
        self.root.clone().with_timeout(self.config.operation_timeout)
    }

    pub async fn provider_schema(&self) -> Schema {
        let provider = self.provider.read().await;
        provider
            .schema(self.operation_context(), ProviderSchemaRequest)
            .await
            .schema
    }

    /// Validate and configure the provider, storing its provider data for
    /// subsequent resource and data source instances
    pub async fn configure(&self, config: DynamicValue) -> Vec<Diagnostic> {
        let ctx = self.operation_context();
        let mut provider = self.provider.write().await;

        let schema = provider
            .schema(ctx.clone(), ProviderSchemaRequest)
            .await
            .schema;
        let mut diagnostics = schema.validate(&config);
        diagnostics.extend(
            provider
                .validate(
                    ctx.clone(),
                    ValidateProviderConfigRequest {
                        config: config.clone(),
                    },
                )
                .await
                .diagnostics,
        );
        if has_errors(&diagnostics) {
            return diagnostics;
        }

        let response = provider
            .configure(
                ctx,
                ConfigureProviderRequest {
                    terraform_version: self.config.terraform_version.clone(),
                    config,
                },
            )
            .await;
        diagnostics.extend(response.diagnostics);

        if !has_errors(&diagnostics) {
            if let Some(data) = response.provider_data {
                info!("Provider {} configured", provider.type_name());
                *self.provider_data.write().await = Some(data);
            } else {
                warn!("Provider {} left unconfigured", provider.type_name());
            }
        }

        diagnostics
    }

    async fn instantiate_resource(
        &self,
        ctx: &Context,
        type_name: &str,
    ) -> std::result::Result<Box<dyn ResourceWithConfigure>, Vec<Diagnostic>> {
        let factory = self.resources.get(type_name).ok_or_else(|| {
            vec![Diagnostic::error(
                "Unknown resource type",
                TfplugError::ResourceNotFound(type_name.to_string()).to_string(),
            )]
        })?;

        let mut resource = factory();
        let provider_data = self.provider_data.read().await.clone();
        let response = resource
            .configure(ctx.clone(), ConfigureResourceRequest { provider_data })
            .await;
        if has_errors(&response.diagnostics) {
            return Err(response.diagnostics);
        }
        Ok(resource)
    }

    async fn instantiate_data_source(
        &self,
        ctx: &Context,
        type_name: &str,
    ) -> std::result::Result<Box<dyn DataSourceWithConfigure>, Vec<Diagnostic>> {
        let factory = self.data_sources.get(type_name).ok_or_else(|| {
            vec![Diagnostic::error(
                "Unknown data source type",
                TfplugError::DataSourceNotFound(type_name.to_string()).to_string(),
            )]
        })?;

        let mut data_source = factory();
        let provider_data = self.provider_data.read().await.clone();
        let response = data_source
            .configure(ctx.clone(), ConfigureDataSourceRequest { provider_data })
            .await;
        if has_errors(&response.diagnostics) {
            return Err(response.diagnostics);
        }
        Ok(data_source)
    }

    pub async fn resource_schema(
        &self,
        type_name: &str,
    ) -> std::result::Result<Schema, Vec<Diagnostic>> {
        let ctx = self.operation_context();
        let resource = self.instantiate_resource(&ctx, type_name).await?;
        Ok(resource.schema(ctx, ResourceSchemaRequest).await.schema)
    }

    pub async fn data_source_schema(
        &self,
        type_name: &str,
    ) -> std::result::Result<Schema, Vec<Diagnostic>> {
        let ctx = self.operation_context();
        let data_source = self.instantiate_data_source(&ctx, type_name).await?;
        Ok(data_source.schema(ctx, DataSourceSchemaRequest).await.schema)
    }

    async fn validate_with(
        &self,
        ctx: &Context,
        resource: &dyn ResourceWithConfigure,
        type_name: &str,
        config: &DynamicValue,
    ) -> (Schema, Vec<Diagnostic>) {
        let schema = resource
            .schema(ctx.clone(), ResourceSchemaRequest)
            .await
            .schema;
        let mut diagnostics = schema.validate(config);
        diagnostics.extend(
            resource
                .validate(
                    ctx.clone(),
                    ValidateResourceConfigRequest {
                        type_name: type_name.to_string(),
                        config: config.clone(),
                    },
                )
                .await
                .diagnostics,
        );
        (schema, diagnostics)
    }

    /// Schema checks followed by the resource's own validation
    pub async fn validate_resource(&self, type_name: &str, config: &DynamicValue) -> Vec<Diagnostic> {
        let ctx = self.operation_context();
        let resource = match self.instantiate_resource(&ctx, type_name).await {
            Ok(r) => r,
            Err(diags) => return diags,
        };
        self.validate_with(&ctx, resource.as_ref(), type_name, config)
            .await
            .1
    }

    pub async fn create(&self, type_name: &str, config: DynamicValue) -> StateOutcome {
        let ctx = self.operation_context();
        let resource = match self.instantiate_resource(&ctx, type_name).await {
            Ok(r) => r,
            Err(diags) => return StateOutcome::failed(diags),
        };

        let (schema, mut diagnostics) = self
            .validate_with(&ctx, resource.as_ref(), type_name, &config)
            .await;
        if has_errors(&diagnostics) {
            return StateOutcome::failed(diagnostics);
        }

        debug!("Creating {}", type_name);
        let planned_state = plan(&schema, &config);
        let response = resource
            .create(
                ctx,
                CreateResourceRequest {
                    type_name: type_name.to_string(),
                    planned_state,
                    config,
                },
            )
            .await;
        diagnostics.extend(response.diagnostics);

        let failed = has_errors(&diagnostics);
        let tainted = failed && response.tainted;
        if tainted {
            warn!("{} was created but left incomplete, keeping it as tainted", type_name);
        }
        let state = (!failed || tainted).then_some(response.new_state);
        StateOutcome {
            state,
            diagnostics,
            tainted,
        }
    }

    /// Refresh; a `None` state means the object is gone and should be
    /// dropped from state
    pub async fn read(&self, type_name: &str, current_state: DynamicValue) -> StateOutcome {
        let ctx = self.operation_context();
        let resource = match self.instantiate_resource(&ctx, type_name).await {
            Ok(r) => r,
            Err(diags) => return StateOutcome::failed(diags),
        };

        let response = resource
            .read(
                ctx,
                ReadResourceRequest {
                    type_name: type_name.to_string(),
                    current_state,
                },
            )
            .await;
        StateOutcome::settled(response.new_state, response.diagnostics)
    }

    pub async fn update(
        &self,
        type_name: &str,
        prior_state: DynamicValue,
        config: DynamicValue,
    ) -> StateOutcome {
        let ctx = self.operation_context();
        let resource = match self.instantiate_resource(&ctx, type_name).await {
            Ok(r) => r,
            Err(diags) => return StateOutcome::failed(diags),
        };

        let (schema, mut diagnostics) = self
            .validate_with(&ctx, resource.as_ref(), type_name, &config)
            .await;
        if has_errors(&diagnostics) {
            return StateOutcome::failed(diagnostics);
        }

        debug!("Updating {}", type_name);
        let planned_state = plan(&schema, &config);
        let response = resource
            .update(
                ctx,
                UpdateResourceRequest {
                    type_name: type_name.to_string(),
                    prior_state,
                    planned_state,
                    config,
                },
            )
            .await;
        diagnostics.extend(response.diagnostics);

        let state = (!has_errors(&diagnostics)).then_some(response.new_state);
        StateOutcome::settled(state, diagnostics)
    }

    pub async fn delete(&self, type_name: &str, prior_state: DynamicValue) -> Vec<Diagnostic> {
        let ctx = self.operation_context();
        let resource = match self.instantiate_resource(&ctx, type_name).await {
            Ok(r) => r,
            Err(diags) => return diags,
        };

        debug!("Deleting {}", type_name);
        resource
            .delete(
                ctx,
                DeleteResourceRequest {
                    type_name: type_name.to_string(),
                    prior_state,
                },
            )
            .await
            .diagnostics
    }

    /// `terraform import`: map the id onto state, then read the object back
    pub async fn import(&self, type_name: &str, id: &str) -> StateOutcome {
        let ctx = self.operation_context();
        let resource = match self.instantiate_resource(&ctx, type_name).await {
            Ok(r) => r,
            Err(diags) => return StateOutcome::failed(diags),
        };

        let importer = match resource.as_import_state() {
            Some(importer) => importer,
            None => {
                return StateOutcome::failed(vec![Diagnostic::error(
                    "Resource import not supported",
                    format!("The resource type {} does not support import", type_name),
                )])
            }
        };

        let response = importer
            .import_state(
                ctx.clone(),
                ImportResourceStateRequest {
                    type_name: type_name.to_string(),
                    id: id.to_string(),
                },
            )
            .await;
        let mut diagnostics = response.diagnostics;
        if has_errors(&diagnostics) {
            return StateOutcome::failed(diagnostics);
        }

        let imported = match response.imported_resources.into_iter().next() {
            Some(imported) => imported,
            None => {
                diagnostics.push(Diagnostic::error(
                    "Import returned no resources",
                    format!("Importing {} with ID {} produced no state", type_name, id),
                ));
                return StateOutcome::failed(diagnostics);
            }
        };

        let read = resource
            .read(
                ctx,
                ReadResourceRequest {
                    type_name: imported.type_name,
                    current_state: imported.state,
                },
            )
            .await;
        diagnostics.extend(read.diagnostics);

        if read.new_state.is_none() && !has_errors(&diagnostics) {
            diagnostics.push(Diagnostic::error(
                "Cannot import non-existent remote object",
                format!(
                    "While attempting to import an existing object to {}, the provider detected that no object exists with the given id {}",
                    type_name, id
                ),
            ));
        }

        let state = if has_errors(&diagnostics) {
            None
        } else {
            read.new_state
        };
        StateOutcome::settled(state, diagnostics)
    }

    pub async fn read_data_source(&self, type_name: &str, config: DynamicValue) -> StateOutcome {
        let ctx = self.operation_context();
        let data_source = match self.instantiate_data_source(&ctx, type_name).await {
            Ok(d) => d,
            Err(diags) => return StateOutcome::failed(diags),
        };

        let schema = data_source
            .schema(ctx.clone(), DataSourceSchemaRequest)
            .await
            .schema;
        let mut diagnostics = schema.validate(&config);
        diagnostics.extend(
            data_source
                .validate(
                    ctx.clone(),
                    ValidateDataSourceConfigRequest {
                        type_name: type_name.to_string(),
                        config: config.clone(),
                    },
                )
                .await
                .diagnostics,
        );
        if has_errors(&diagnostics) {
            return StateOutcome::failed(diagnostics);
        }

        let response = data_source
            .read(
                ctx,
                ReadDataSourceRequest {
                    type_name: type_name.to_string(),
                    config,
                },
            )
            .await;
        diagnostics.extend(response.diagnostics);

        let state = (!has_errors(&diagnostics)).then_some(response.state);
        StateOutcome::settled(state, diagnostics)
    }
}

/// Planned state: the configuration with every unset computed attribute
/// marked unknown
fn plan(schema: &Schema, config: &DynamicValue) -> DynamicValue {
    let mut planned = config.clone();
    for attr in schema.block.attributes.iter().filter(|a| a.computed) {
        let path = AttributePath::new(&attr.name);
        if config.is_null_at(&path) {
            if let Err(e) = planned.mark_unknown(&path) {
                debug!("Could not mark {} unknown: {}", path, e);
            }
        }
    }
    planned
}
