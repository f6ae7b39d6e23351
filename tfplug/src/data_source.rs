//! Read-only data sources
//!
//! Same lifecycle as a resource minus the writes: configure, validate, read.

use crate::context::Context;
use crate::provider::{downcast_provider_data, ProviderData};
use crate::schema::Schema;
use crate::types::{Diagnostic, DynamicValue};
use async_trait::async_trait;
use std::any::Any;

#[async_trait]
pub trait DataSource: Send + Sync {
    /// Full type name, e.g. "marketo_channel"
    fn type_name(&self) -> &str;

    async fn schema(
        &self,
        ctx: Context,
        request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse;

    async fn validate(
        &self,
        ctx: Context,
        request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse;

    /// Returns the config with every computed attribute filled in
    async fn read(&self, ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse;
}

#[async_trait]
pub trait DataSourceWithConfigure: DataSource {
    async fn configure(
        &mut self,
        ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse;
}

pub struct DataSourceSchemaRequest;

pub struct DataSourceSchemaResponse {
    pub schema: Schema,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
pub struct ValidateDataSourceConfigRequest {
    pub type_name: String,
    pub config: DynamicValue,
}

#[derive(Debug, Default)]
pub struct ValidateDataSourceConfigResponse {
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
pub struct ReadDataSourceRequest {
    pub type_name: String,
    pub config: DynamicValue,
}

#[derive(Debug)]
pub struct ReadDataSourceResponse {
    pub state: DynamicValue,
    pub diagnostics: Vec<Diagnostic>,
}

impl ReadDataSourceResponse {
    /// Echo the config back with an error; the host discards the state
    pub fn failed(config: DynamicValue, diagnostic: Diagnostic) -> Self {
        Self {
            state: config,
            diagnostics: vec![diagnostic],
        }
    }
}

pub struct ConfigureDataSourceRequest {
    pub provider_data: Option<ProviderData>,
}

impl ConfigureDataSourceRequest {
    pub fn data<T: Any + Send + Sync>(&self) -> Result<Option<&T>, Diagnostic> {
        downcast_provider_data(self.provider_data.as_ref())
    }
}

#[derive(Debug, Default)]
pub struct ConfigureDataSourceResponse {
    pub diagnostics: Vec<Diagnostic>,
}
