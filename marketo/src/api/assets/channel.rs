//! Channel API implementation (read-only)

use serde::Deserialize;
use tfplug::Context;

use super::ASSET_PREFIX;
use crate::api::client::first_result;
use crate::api::common::{string_or_number, ApiQueryParams};
use crate::api::{ApiError, Client};

/// Response from GET /rest/asset/v1/channel/byName.json
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    #[serde(with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub applicable_program_type: Option<String>,
}

pub struct ChannelsApi<'a> {
    client: &'a Client,
}

impl<'a> ChannelsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get_by_name(&self, ctx: &Context, name: &str) -> Result<Channel, ApiError> {
        let results = self
            .client
            .get(
                ctx,
                &format!("{}/channel/byName.json", ASSET_PREFIX),
                &ApiQueryParams::new().add("name", name),
            )
            .await?;
        first_result(results, &format!("channel named '{}'", name))
    }
}
