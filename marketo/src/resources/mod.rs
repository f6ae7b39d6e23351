//! Marketo resources
//!
//! All six asset kinds share one lifecycle, [`AssetResource`]. What differs
//! per kind (schema, how a configuration becomes an API request, how an API
//! response lands in state) lives behind [`ManagedAsset`].

pub mod email;
pub mod email_template;
pub mod folder;
pub mod program;
pub mod smart_campaign;
pub mod smart_list;

pub use email::EmailAsset;
pub use email_template::EmailTemplateAsset;
pub use folder::FolderAsset;
pub use program::ProgramAsset;
pub use smart_campaign::SmartCampaignAsset;
pub use smart_list::SmartListAsset;

use async_trait::async_trait;
use chrono::Utc;
use tfplug::context::Context;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest,
    UpdateResourceResponse, ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType, Schema};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::StringLengthValidator;
use tracing::{debug, warn};

use crate::api::common::{non_empty, Placement};
use crate::api::{ApiError, Client};
use crate::MarketoProviderData;

/// `last_updated` format, e.g. `Monday, 02-Jan-06 15:04:05 UTC`
const LAST_UPDATED_FORMAT: &str = "%A, %d-%b-%y %H:%M:%S UTC";

/// One Marketo asset kind as seen by the generic resource lifecycle
#[async_trait]
pub trait ManagedAsset: Default + Send + Sync + 'static {
    /// Fields sent on create and update
    type Request: Send + Sync;
    /// Asset as returned by the API
    type Remote: Send + Sync;

    const TYPE_NAME: &'static str;
    /// Human readable kind used in diagnostics
    const KIND: &'static str;

    fn schema(&self) -> &'static Schema;

    /// Checks the schema can't express
    fn validate(&self, _config: &DynamicValue, _diagnostics: &mut Vec<Diagnostic>) {}

    /// Attributes Marketo fixes at creation
    fn immutable_attributes(&self) -> &'static [&'static str] {
        &[]
    }

    /// Non-fatal notes about a pending update
    fn update_warnings(&self, _prior: &DynamicValue, _config: &DynamicValue) -> Vec<Diagnostic> {
        Vec::new()
    }

    fn request(&self, config: &DynamicValue) -> tfplug::Result<Self::Request>;

    /// Request sent on update. Kinds with side-effecting sub-requests
    /// compare against `prior` to skip the ones that haven't changed.
    fn update_request(
        &self,
        _prior: &DynamicValue,
        config: &DynamicValue,
    ) -> tfplug::Result<Self::Request> {
        self.request(config)
    }

    fn remote_id<'r>(&self, remote: &'r Self::Remote) -> &'r str;

    /// Copy server-owned fields into state
    fn apply_remote(&self, remote: &Self::Remote, state: &mut DynamicValue) -> tfplug::Result<()>;

    async fn create(
        &self,
        client: &Client,
        ctx: &Context,
        request: &Self::Request,
    ) -> Result<Self::Remote, ApiError>;

    async fn get(&self, client: &Client, ctx: &Context, id: &str)
        -> Result<Self::Remote, ApiError>;

    async fn update(
        &self,
        client: &Client,
        ctx: &Context,
        id: &str,
        request: &Self::Request,
    ) -> Result<Self::Remote, ApiError>;

    async fn delete(&self, client: &Client, ctx: &Context, id: &str) -> Result<(), ApiError>;
}

#[derive(Default)]
pub struct AssetResource<M: ManagedAsset> {
    asset: M,
    provider_data: Option<MarketoProviderData>,
}

impl<M: ManagedAsset> AssetResource<M> {
    pub fn new() -> Self {
        Self {
            asset: M::default(),
            provider_data: None,
        }
    }

    fn client(&self) -> Result<&Client, Diagnostic> {
        self.provider_data
            .as_ref()
            .map(|data| data.client.as_ref())
            .ok_or_else(not_configured)
    }

    /// Request plus the name used in error messages. `prior` is set when
    /// updating.
    fn build_request(
        &self,
        prior: Option<&DynamicValue>,
        config: &DynamicValue,
    ) -> Result<(M::Request, String), Diagnostic> {
        let name = optional_string(config, "name")
            .ok()
            .flatten()
            .unwrap_or_default();
        let request = match prior {
            Some(prior) => self.asset.update_request(prior, config),
            None => self.asset.request(config),
        };
        request
            .map(|request| (request, name))
            .map_err(|e| {
                Diagnostic::error(
                    "Invalid configuration",
                    format!("Could not read {} configuration: {}", M::KIND, e),
                )
            })
    }

    fn finish_state(
        &self,
        remote: &M::Remote,
        mut state: DynamicValue,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> DynamicValue {
        let result = state
            .set_string(
                &AttributePath::new("id"),
                self.asset.remote_id(remote).to_string(),
            )
            .and_then(|_| self.asset.apply_remote(remote, &mut state))
            .and_then(|_| state.set_string(&AttributePath::new("last_updated"), last_updated()));
        if let Err(e) = result {
            diagnostics.push(Diagnostic::error(
                "Failed to set state",
                format!("Could not record {} in state: {}", M::KIND, e),
            ));
        }
        state
    }

    /// State for an object that was created but not finished: the id plus
    /// whatever the configuration says. Computed attributes the server never
    /// reported stay null until the next refresh.
    fn incomplete_state(&self, id: &str, mut state: DynamicValue) -> DynamicValue {
        if let Err(e) = state.set_string(&AttributePath::new("id"), id.to_string()) {
            debug!("Could not record id {} in state: {}", id, e);
        }
        for attr in self.asset.schema().block.attributes.iter().filter(|a| a.computed) {
            let path = AttributePath::new(&attr.name);
            if state.is_unknown_at(&path) {
                if let Err(e) = state.set_null(&path) {
                    debug!("Could not clear {}: {}", path, e);
                }
            }
        }
        state
    }

    fn immutable_changes(&self, prior: &DynamicValue, config: &DynamicValue) -> Vec<Diagnostic> {
        let immutable = self.asset.immutable_attributes();
        let mut diagnostics: Vec<Diagnostic> = immutable
            .iter()
            .filter_map(|attr| {
                let path = AttributePath::new(attr);
                let wanted = config.get(&path).ok()?;
                let current = prior.get(&path).ok()?;
                if wanted.is_null() || wanted.is_unknown() || current.is_null() || wanted == current
                {
                    return None;
                }
                Some(
                    Diagnostic::error(
                        format!("Cannot change {}", attr),
                        format!(
                            "The {} of a {} is fixed at creation; replace the resource to change it",
                            attr,
                            M::KIND
                        ),
                    )
                    .with_attribute(path),
                )
            })
            .collect();

        // Moving between a folder and a program touches two attributes
        if diagnostics.is_empty() && immutable.contains(&"folder") {
            if let (Ok(Some(wanted)), Ok(Some(current))) =
                (placement_from(config), placement_from(prior))
            {
                if wanted != current {
                    diagnostics.push(Diagnostic::error(
                        "Cannot change placement",
                        format!(
                            "A {} can't move from {} {} to {} {}; replace the resource instead",
                            M::KIND,
                            current.type_name().to_lowercase(),
                            current.id(),
                            wanted.type_name().to_lowercase(),
                            wanted.id()
                        ),
                    ));
                }
            }
        }

        diagnostics
    }
}

#[async_trait]
impl<M: ManagedAsset> Resource for AssetResource<M> {
    fn type_name(&self) -> &str {
        M::TYPE_NAME
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: self.asset.schema().clone(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let mut diagnostics = vec![];
        self.asset.validate(&request.config, &mut diagnostics);
        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut diagnostics = vec![];

        let client = match self.client() {
            Ok(client) => client,
            Err(diag) => {
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics: vec![diag],
                    tainted: false,
                }
            }
        };

        let (api_request, name) = match self.build_request(None, &request.config) {
            Ok(built) => built,
            Err(diag) => {
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics: vec![diag],
                    tainted: false,
                }
            }
        };

        debug!("Creating {} '{}'", M::KIND, name);
        match self.asset.create(client, &ctx, &api_request).await {
            Ok(remote) => {
                let new_state = self.finish_state(&remote, request.planned_state, &mut diagnostics);
                CreateResourceResponse {
                    new_state,
                    diagnostics,
                    tainted: false,
                }
            }
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    format!("Failed to create {}", M::KIND),
                    format!("Could not create {} '{}': {}", M::KIND, name, e),
                ));
                match e.created_id() {
                    Some(id) => {
                        warn!("{} {} exists but is incomplete", M::KIND, id);
                        CreateResourceResponse {
                            new_state: self.incomplete_state(id, request.planned_state),
                            diagnostics,
                            tainted: true,
                        }
                    }
                    None => CreateResourceResponse {
                        new_state: request.planned_state,
                        diagnostics,
                        tainted: false,
                    },
                }
            }
        }
    }

    async fn read(&self, ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let client = match self.client() {
            Ok(client) => client,
            Err(diag) => return ReadResourceResponse::failed(request.current_state, diag),
        };

        let id = match required_id(&request.current_state) {
            Ok(id) => id,
            Err(diag) => return ReadResourceResponse::failed(request.current_state, diag),
        };

        match self.asset.get(client, &ctx, &id).await {
            Ok(remote) => {
                let mut diagnostics = vec![];
                let mut state = request.current_state;
                if let Err(e) = self.asset.apply_remote(&remote, &mut state) {
                    diagnostics.push(Diagnostic::error(
                        "Failed to set state",
                        format!("Could not record {} in state: {}", M::KIND, e),
                    ));
                }
                ReadResourceResponse {
                    new_state: Some(state),
                    diagnostics,
                }
            }
            Err(e) if e.is_not_found() => {
                warn!("{} {} no longer exists, removing from state", M::KIND, id);
                ReadResourceResponse::gone()
            }
            Err(e) => ReadResourceResponse::failed(
                request.current_state,
                Diagnostic::error(
                    format!("Failed to read {}", M::KIND),
                    format!("Could not read {} with ID {}: {}", M::KIND, id, e),
                ),
            ),
        }
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let client = match self.client() {
            Ok(client) => client,
            Err(diag) => {
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics: vec![diag],
                }
            }
        };

        let id = match required_id(&request.prior_state) {
            Ok(id) => id,
            Err(diag) => {
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics: vec![diag],
                }
            }
        };

        let mut diagnostics = self.immutable_changes(&request.prior_state, &request.config);
        if !diagnostics.is_empty() {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics,
            };
        }
        diagnostics.extend(
            self.asset
                .update_warnings(&request.prior_state, &request.config),
        );

        let built = self.build_request(Some(&request.prior_state), &request.config);
        let (api_request, _) = match built {
            Ok(built) => built,
            Err(diag) => {
                diagnostics.push(diag);
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics,
                };
            }
        };

        debug!("Updating {} {}", M::KIND, id);
        match self.asset.update(client, &ctx, &id, &api_request).await {
            Ok(remote) => {
                let new_state = self.finish_state(&remote, request.planned_state, &mut diagnostics);
                UpdateResourceResponse {
                    new_state,
                    diagnostics,
                }
            }
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    format!("Failed to update {}", M::KIND),
                    format!("Could not update {} with ID {}: {}", M::KIND, id, e),
                ));
                UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics,
                }
            }
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let client = match self.client() {
            Ok(client) => client,
            Err(diag) => {
                return DeleteResourceResponse {
                    diagnostics: vec![diag],
                }
            }
        };

        let id = match required_id(&request.prior_state) {
            Ok(id) => id,
            Err(diag) => {
                return DeleteResourceResponse {
                    diagnostics: vec![diag],
                }
            }
        };

        debug!("Deleting {} {}", M::KIND, id);
        let diagnostics = match self.asset.delete(client, &ctx, &id).await {
            Ok(()) => vec![],
            Err(e) => vec![Diagnostic::error(
                format!("Failed to delete {}", M::KIND),
                format!("Could not delete {} with ID {}: {}", M::KIND, id, e),
            )],
        };

        DeleteResourceResponse { diagnostics }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl<M: ManagedAsset> ResourceWithConfigure for AssetResource<M> {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        // Unconfigured providers hand over nothing; CRUD calls report it
        match request.data::<MarketoProviderData>() {
            Ok(data) => {
                self.provider_data = data.cloned();
                ConfigureResourceResponse::default()
            }
            Err(diag) => ConfigureResourceResponse {
                diagnostics: vec![diag],
            },
        }
    }
}

#[async_trait]
impl<M: ManagedAsset> ResourceWithImportState for AssetResource<M> {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };
        tfplug::import_state_passthrough_id(&ctx, AttributePath::new("id"), &request, &mut response);
        response
    }
}

pub(crate) fn not_configured() -> Diagnostic {
    Diagnostic::error(
        "Provider not configured",
        "Provider data was not properly configured",
    )
}

fn required_id(state: &DynamicValue) -> Result<String, Diagnostic> {
    match optional_string(state, "id") {
        Ok(Some(id)) if !id.is_empty() => Ok(id),
        _ => Err(Diagnostic::error(
            "Missing resource ID",
            "The resource state has no ID",
        )
        .with_attribute(AttributePath::new("id"))),
    }
}

/// Advisory client-side timestamp of the last create or update
pub(crate) fn last_updated() -> String {
    Utc::now().format(LAST_UPDATED_FORMAT).to_string()
}

/// Like `get_optional_string`, but a value not known until apply counts as unset
pub(crate) fn optional_string(value: &DynamicValue, name: &str) -> tfplug::Result<Option<String>> {
    let path = AttributePath::new(name);
    if value.is_unknown_at(&path) {
        return Ok(None);
    }
    value.get_optional_string(&path)
}

pub(crate) fn optional_bool(value: &DynamicValue, name: &str) -> tfplug::Result<Option<bool>> {
    let path = AttributePath::new(name);
    if value.is_unknown_at(&path) {
        return Ok(None);
    }
    value.get_optional_bool(&path)
}

pub(crate) fn set_optional_string(
    state: &mut DynamicValue,
    name: &str,
    value: Option<String>,
) -> tfplug::Result<()> {
    let path = AttributePath::new(name);
    match value {
        Some(v) => state.set_string(&path, v),
        None => state.set_null(&path),
    }
}

/// Optional+computed attributes the server may leave blank
pub(crate) fn set_server_string(
    state: &mut DynamicValue,
    name: &str,
    value: Option<&str>,
) -> tfplug::Result<()> {
    set_optional_string(state, name, non_empty(value))
}

/// Keep a configured value when the server doesn't report one
pub(crate) fn set_string_or_keep(
    state: &mut DynamicValue,
    name: &str,
    value: Option<&str>,
) -> tfplug::Result<()> {
    match non_empty(value) {
        Some(v) => state.set_string(&AttributePath::new(name), v),
        None if state.is_unknown_at(&AttributePath::new(name)) => {
            state.set_null(&AttributePath::new(name))
        }
        None => Ok(()),
    }
}

pub(crate) fn id_attribute() -> Attribute {
    AttributeBuilder::new("id", AttributeType::String)
        .description("Marketo asset ID")
        .computed()
        .build()
}

pub(crate) fn name_attribute(description: &str) -> Attribute {
    AttributeBuilder::new("name", AttributeType::String)
        .description(description)
        .required()
        .validator(StringLengthValidator {
            min: Some(1),
            max: None,
        })
        .build()
}

pub(crate) fn description_attribute() -> Attribute {
    AttributeBuilder::new("description", AttributeType::String)
        .description("Free-form description")
        .optional()
        .computed()
        .build()
}

pub(crate) fn last_updated_attribute() -> Attribute {
    AttributeBuilder::new("last_updated", AttributeType::String)
        .description("Time of the last create or update made by Terraform")
        .computed()
        .build()
}

/// `folder` and `program` placement attributes, mutually exclusive
pub(crate) fn placement_attributes() -> Vec<Attribute> {
    vec![
        AttributeBuilder::new("folder", AttributeType::String)
            .description("ID of the folder holding the asset. Conflicts with program")
            .optional()
            .computed()
            .build(),
        AttributeBuilder::new("program", AttributeType::String)
            .description("ID of the program holding the asset. Conflicts with folder")
            .optional()
            .computed()
            .build(),
    ]
}

pub(crate) fn validate_placement(config: &DynamicValue, diagnostics: &mut Vec<Diagnostic>) {
    let folder = AttributePath::new("folder");
    let program = AttributePath::new("program");
    let is_set = |path: &AttributePath| {
        config
            .get(path)
            .map(|v| !matches!(v, Dynamic::Null))
            .unwrap_or(false)
    };

    if is_set(&folder) && is_set(&program) {
        diagnostics.push(
            Diagnostic::error(
                "Conflicting placement",
                "Only one of \"folder\" or \"program\" can be set",
            )
            .with_attribute(program),
        );
    }
}

pub(crate) fn placement_from(config: &DynamicValue) -> tfplug::Result<Option<Placement>> {
    if let Some(id) = optional_string(config, "folder")? {
        return Ok(Some(Placement::Folder(id)));
    }
    Ok(optional_string(config, "program")?.map(Placement::Program))
}

/// Record where the server placed the asset. Without a reported placement
/// the configured one stays.
pub(crate) fn set_placement(
    state: &mut DynamicValue,
    placement: Option<Placement>,
) -> tfplug::Result<()> {
    match placement {
        Some(Placement::Folder(id)) => {
            state.set_string(&AttributePath::new("folder"), id)?;
            state.set_null(&AttributePath::new("program"))
        }
        Some(Placement::Program(id)) => {
            state.set_string(&AttributePath::new("program"), id)?;
            state.set_null(&AttributePath::new("folder"))
        }
        None => {
            for name in ["folder", "program"] {
                if state.is_unknown_at(&AttributePath::new(name)) {
                    state.set_null(&AttributePath::new(name))?;
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_updated_uses_rfc850_layout() {
        let stamp = last_updated();
        let parsed = chrono::NaiveDateTime::parse_from_str(&stamp, LAST_UPDATED_FORMAT);
        assert!(parsed.is_ok(), "unexpected timestamp {}", stamp);
        assert!(stamp.ends_with(" UTC"));
    }

    #[test]
    fn placement_conflict_is_reported() {
        let mut config = DynamicValue::object();
        config
            .set_string(&AttributePath::new("folder"), "12".to_string())
            .unwrap();
        config
            .set_string(&AttributePath::new("program"), "1001".to_string())
            .unwrap();

        let mut diags = vec![];
        validate_placement(&config, &mut diags);

        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Conflicting placement");
    }

    #[test]
    fn placement_prefers_folder_then_program() {
        let mut config = DynamicValue::object();
        config
            .set_string(&AttributePath::new("program"), "1001".to_string())
            .unwrap();
        config.mark_unknown(&AttributePath::new("folder")).unwrap();

        assert_eq!(
            placement_from(&config).unwrap(),
            Some(Placement::Program("1001".to_string()))
        );
        assert_eq!(placement_from(&DynamicValue::object()).unwrap(), None);
    }

    #[test]
    fn set_placement_clears_the_other_attribute() {
        let mut state = DynamicValue::object();
        state.mark_unknown(&AttributePath::new("folder")).unwrap();
        state
            .set_string(&AttributePath::new("program"), "1001".to_string())
            .unwrap();

        set_placement(&mut state, Some(Placement::Folder("15".to_string()))).unwrap();

        assert_eq!(
            state.get_string(&AttributePath::new("folder")).unwrap(),
            "15"
        );
        assert!(state.is_null_at(&AttributePath::new("program")));
    }

    #[test]
    fn unknown_placement_resolves_to_null() {
        let mut state = DynamicValue::object();
        state.mark_unknown(&AttributePath::new("folder")).unwrap();
        state.mark_unknown(&AttributePath::new("program")).unwrap();

        set_placement(&mut state, None).unwrap();

        assert!(state.is_null_at(&AttributePath::new("folder")));
        assert!(state.is_null_at(&AttributePath::new("program")));
    }
}
