//! Managed resources
//!
//! The host drives a resource through `configure`, then `validate`, then one
//! of the CRUD calls. Import is opt-in through [`ResourceWithImportState`].

use crate::context::Context;
use crate::provider::{downcast_provider_data, ProviderData};
use crate::schema::Schema;
use crate::types::{Diagnostic, DynamicValue};
use async_trait::async_trait;
use std::any::Any;

#[async_trait]
pub trait Resource: Send + Sync {
    /// Full type name, e.g. "marketo_program"; the key under which the
    /// provider registers the factory
    fn type_name(&self) -> &str;

    async fn schema(&self, ctx: Context, request: ResourceSchemaRequest) -> ResourceSchemaResponse;

    /// Cross-attribute checks. Required attributes and attribute validators
    /// have already been applied by the host.
    async fn validate(
        &self,
        ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse;

    /// `new_state` must have every computed attribute resolved
    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse;

    async fn read(&self, ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse;

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse;

    /// Deleting something that is already gone succeeds
    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse;

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        None
    }
}

#[async_trait]
pub trait ResourceWithConfigure: Resource {
    /// Runs right after the factory builds the resource, before any other call
    async fn configure(
        &mut self,
        ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse;
}

#[async_trait]
pub trait ResourceWithImportState: Resource {
    /// Map an import id onto state; the host reads the object back afterwards
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse;
}

pub struct ResourceSchemaRequest;

pub struct ResourceSchemaResponse {
    pub schema: Schema,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
pub struct ValidateResourceConfigRequest {
    pub type_name: String,
    pub config: DynamicValue,
}

#[derive(Debug, Default)]
pub struct ValidateResourceConfigResponse {
    pub diagnostics: Vec<Diagnostic>,
}

/// `planned_state` is the config with unset computed attributes marked
/// unknown
#[derive(Debug, Clone)]
pub struct CreateResourceRequest {
    pub type_name: String,
    pub planned_state: DynamicValue,
    pub config: DynamicValue,
}

#[derive(Debug)]
pub struct CreateResourceResponse {
    pub new_state: DynamicValue,
    pub diagnostics: Vec<Diagnostic>,
    /// The object exists remotely even though creation failed. The host
    /// keeps `new_state` next to the errors so the next apply replaces the
    /// object instead of creating a second one.
    pub tainted: bool,
}

#[derive(Debug, Clone)]
pub struct ReadResourceRequest {
    pub type_name: String,
    pub current_state: DynamicValue,
}

#[derive(Debug)]
pub struct ReadResourceResponse {
    /// `None` drops the object from state
    pub new_state: Option<DynamicValue>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ReadResourceResponse {
    /// The remote object no longer exists
    pub fn gone() -> Self {
        Self {
            new_state: None,
            diagnostics: vec![],
        }
    }

    /// Keep the current state and report why it could not be refreshed
    pub fn failed(current_state: DynamicValue, diagnostic: Diagnostic) -> Self {
        Self {
            new_state: Some(current_state),
            diagnostics: vec![diagnostic],
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpdateResourceRequest {
    pub type_name: String,
    pub prior_state: DynamicValue,
    pub planned_state: DynamicValue,
    pub config: DynamicValue,
}

#[derive(Debug)]
pub struct UpdateResourceResponse {
    pub new_state: DynamicValue,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
pub struct DeleteResourceRequest {
    pub type_name: String,
    pub prior_state: DynamicValue,
}

#[derive(Debug, Default)]
pub struct DeleteResourceResponse {
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ConfigureResourceRequest {
    /// `None` until the provider has been configured
    pub provider_data: Option<ProviderData>,
}

impl ConfigureResourceRequest {
    /// Provider data as the provider's own type
    pub fn data<T: Any + Send + Sync>(&self) -> Result<Option<&T>, Diagnostic> {
        downcast_provider_data(self.provider_data.as_ref())
    }
}

#[derive(Debug, Default)]
pub struct ConfigureResourceResponse {
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
pub struct ImportResourceStateRequest {
    pub type_name: String,
    pub id: String,
}

#[derive(Debug, Default)]
pub struct ImportResourceStateResponse {
    pub imported_resources: Vec<ImportedResource>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug)]
pub struct ImportedResource {
    pub type_name: String,
    pub state: DynamicValue,
}
