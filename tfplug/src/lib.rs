//! tfplug - Terraform provider framework for Rust
//!
//! Traits for providers, resources and data sources, the dynamic value and
//! schema types they exchange, and an in-process host that drives the
//! provider lifecycle.

// Core modules
pub mod context;
pub mod error;
pub mod schema;
pub mod types;

// Provider API modules
pub mod data_source;
pub mod provider;
pub mod resource;

// Helper modules
pub mod import;
pub mod validator;

pub mod host;

// Re-exports for convenience
pub use context::Context;
pub use data_source::{DataSource, DataSourceWithConfigure};
pub use error::{Result, TfplugError};
pub use host::{init_logging, HostConfig, LogLevel, ProviderHost, StateOutcome};
pub use import::import_state_passthrough_id;
pub use provider::{downcast_provider_data, DataSourceFactory, Provider, ProviderData, ResourceFactory};
pub use resource::{Resource, ResourceWithConfigure, ResourceWithImportState};
pub use schema::{AttributeBuilder, AttributeType, NestedType, Schema, SchemaBuilder};
pub use types::{AttributePath, Diagnostic, DiagnosticSeverity, Dynamic, DynamicValue};
