//! Provider trait and related types
//!
//! A provider is configured once; the data it hands back from `configure` is
//! passed to every resource and data source the host instantiates.

use crate::context::Context;
use crate::data_source::DataSourceWithConfigure;
use crate::resource::ResourceWithConfigure;
use crate::schema::Schema;
use crate::types::{Diagnostic, DynamicValue};
use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Whatever `configure` built for resources to share, usually an API client
pub type ProviderData = Arc<dyn Any + Send + Sync>;

/// Factories create a fresh, unconfigured instance per request
pub type ResourceFactory = Box<dyn Fn() -> Box<dyn ResourceWithConfigure> + Send + Sync>;
pub type DataSourceFactory = Box<dyn Fn() -> Box<dyn DataSourceWithConfigure> + Send + Sync>;

#[async_trait]
pub trait Provider: Send + Sync {
    /// Prefix shared by every resource type name (e.g., "marketo")
    fn type_name(&self) -> &str;

    async fn schema(&self, ctx: Context, request: ProviderSchemaRequest) -> ProviderSchemaResponse;

    async fn validate(
        &self,
        ctx: Context,
        request: ValidateProviderConfigRequest,
    ) -> ValidateProviderConfigResponse;

    /// Build whatever resources need (API clients, credentials) and return it
    /// as provider_data. Leaving provider_data empty means "not configured".
    async fn configure(
        &mut self,
        ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse;

    fn resources(&self) -> HashMap<String, ResourceFactory>;

    fn data_sources(&self) -> HashMap<String, DataSourceFactory>;
}

pub struct ProviderSchemaRequest;

pub struct ProviderSchemaResponse {
    pub schema: Schema,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ValidateProviderConfigRequest {
    pub config: DynamicValue,
}

pub struct ValidateProviderConfigResponse {
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ConfigureProviderRequest {
    pub terraform_version: String,
    pub config: DynamicValue,
}

pub struct ConfigureProviderResponse {
    pub diagnostics: Vec<Diagnostic>,
    pub provider_data: Option<ProviderData>,
}

/// Recover the provider's own type from the data handed to a resource or
/// data source. `Ok(None)` means the provider is not configured yet, which
/// is not an error until an operation needs the data.
pub fn downcast_provider_data<T: Any + Send + Sync>(
    data: Option<&ProviderData>,
) -> Result<Option<&T>, Diagnostic> {
    match data {
        None => Ok(None),
        Some(data) => data.downcast_ref::<T>().map(Some).ok_or_else(|| {
            Diagnostic::error(
                "Invalid provider data",
                format!(
                    "Expected provider data of type {}",
                    std::any::type_name::<T>()
                ),
            )
        }),
    }
}
