//! Asset API: programs, folders, emails, templates, campaigns, smart lists
//! and channels under `/rest/asset/v1`

pub mod channel;
pub mod email;
pub mod email_template;
pub mod folder;
pub mod program;
pub mod smart_campaign;
pub mod smart_list;

use serde::de::DeserializeOwned;
use tfplug::Context;

use super::client::{first_result, Client};
use super::common::{ApiQueryParams, FormParams};
use super::error::ApiError;

pub const ASSET_PREFIX: &str = "/rest/asset/v1";

/// Assets addressed as `{entity_path}/{id}.json`
pub trait MarketoAsset: DeserializeOwned {
    /// Human-readable kind used in error messages
    const KIND: &'static str;

    fn entity_path() -> &'static str;

    fn resource_path(id: &str) -> String {
        format!("{}/{}.json", Self::entity_path(), urlencoding::encode(id))
    }

    fn delete_path(id: &str) -> String {
        format!(
            "{}/{}/delete.json",
            Self::entity_path(),
            urlencoding::encode(id)
        )
    }
}

pub struct AssetsApi<'a> {
    client: &'a Client,
}

impl<'a> AssetsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub fn programs(&self) -> program::ProgramsApi<'a> {
        program::ProgramsApi::new(self.client)
    }

    pub fn folders(&self) -> folder::FoldersApi<'a> {
        folder::FoldersApi::new(self.client)
    }

    pub fn emails(&self) -> email::EmailsApi<'a> {
        email::EmailsApi::new(self.client)
    }

    pub fn email_templates(&self) -> email_template::EmailTemplatesApi<'a> {
        email_template::EmailTemplatesApi::new(self.client)
    }

    pub fn smart_campaigns(&self) -> smart_campaign::SmartCampaignsApi<'a> {
        smart_campaign::SmartCampaignsApi::new(self.client)
    }

    pub fn smart_lists(&self) -> smart_list::SmartListsApi<'a> {
        smart_list::SmartListsApi::new(self.client)
    }

    pub fn channels(&self) -> channel::ChannelsApi<'a> {
        channel::ChannelsApi::new(self.client)
    }
}

/// GET a single asset by id
pub(crate) async fn fetch<A: MarketoAsset>(
    client: &Client,
    ctx: &Context,
    id: &str,
    params: &ApiQueryParams,
) -> Result<A, ApiError> {
    let results = client.get(ctx, &A::resource_path(id), params).await?;
    first_result(results, &format!("{} {}", A::KIND, id))
}

/// POST a form and decode the asset echoed back
pub(crate) async fn submit<A: MarketoAsset>(
    client: &Client,
    ctx: &Context,
    path: &str,
    form: &FormParams,
) -> Result<A, ApiError> {
    let results = client.post_form(ctx, path, form).await?;
    first_result(results, A::KIND)
}

/// Delete an asset. An asset that is already gone counts as deleted.
pub(crate) async fn remove<A: MarketoAsset>(
    client: &Client,
    ctx: &Context,
    id: &str,
    form: &FormParams,
) -> Result<(), ApiError> {
    match client.post_form(ctx, &A::delete_path(id), form).await {
        Ok(_) => Ok(()),
        Err(e) if e.is_not_found() => {
            tracing::debug!("{} {} already deleted", A::KIND, id);
            Ok(())
        }
        Err(e) => Err(e),
    }
}
