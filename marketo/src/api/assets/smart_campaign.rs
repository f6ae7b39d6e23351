//! Smart campaign API implementation
//!
//! Campaign metadata lives under the asset API; scheduling a batch run goes
//! through the lead database API at `/rest/v1/campaigns/{id}/schedule.json`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tfplug::Context;

use super::{fetch, remove, submit, MarketoAsset, ASSET_PREFIX};
use crate::api::common::{string_or_number, ApiQueryParams, FolderRef, FormParams, Placement};
use crate::api::{ApiError, Client};

/// Response from GET /rest/asset/v1/smartCampaign/{id}.json
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartCampaign {
    #[serde(with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub folder: Option<FolderRef>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl MarketoAsset for SmartCampaign {
    const KIND: &'static str = "smart campaign";

    fn entity_path() -> &'static str {
        "/rest/asset/v1/smartCampaign"
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schedule {
    /// RFC 3339 timestamp of the batch run
    pub run_at: String,
    /// My-token overrides, keyed by token name (e.g. `{{my.offer}}`)
    pub tokens: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SmartCampaignRequest {
    pub name: String,
    pub description: Option<String>,
    pub folder: Option<Placement>,
    pub schedule: Option<Schedule>,
}

/// Body of POST /rest/v1/campaigns/{id}/schedule.json
#[derive(Debug, Serialize)]
struct ScheduleBody<'a> {
    input: ScheduleInput<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleInput<'a> {
    run_at: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tokens: Vec<TokenValue<'a>>,
}

#[derive(Debug, Serialize)]
struct TokenValue<'a> {
    name: &'a str,
    value: &'a str,
}

pub struct SmartCampaignsApi<'a> {
    client: &'a Client,
}

impl<'a> SmartCampaignsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn create(
        &self,
        ctx: &Context,
        request: &SmartCampaignRequest,
    ) -> Result<SmartCampaign, ApiError> {
        let form = FormParams::new()
            .add("name", &request.name)
            .add_optional("folder", request.folder.as_ref().map(Placement::to_param))
            .add_optional("description", request.description.as_ref());

        let campaign: SmartCampaign = submit(
            self.client,
            ctx,
            &format!("{}/smartCampaigns.json", ASSET_PREFIX),
            &form,
        )
        .await?;

        if let Some(schedule) = &request.schedule {
            if let Err(e) = self.schedule(ctx, &campaign.id, schedule).await {
                return Err(ApiError::incomplete(SmartCampaign::KIND, campaign.id, e));
            }
        }

        Ok(campaign)
    }

    pub async fn get(&self, ctx: &Context, id: &str) -> Result<SmartCampaign, ApiError> {
        fetch(self.client, ctx, id, &ApiQueryParams::new()).await
    }

    pub async fn update(
        &self,
        ctx: &Context,
        id: &str,
        request: &SmartCampaignRequest,
    ) -> Result<SmartCampaign, ApiError> {
        let form = FormParams::new()
            .add("name", &request.name)
            .add("description", request.description.as_deref().unwrap_or(""));

        let campaign: SmartCampaign =
            submit(self.client, ctx, &SmartCampaign::resource_path(id), &form).await?;

        if let Some(schedule) = &request.schedule {
            self.schedule(ctx, id, schedule).await?;
        }

        Ok(campaign)
    }

    pub async fn delete(&self, ctx: &Context, id: &str) -> Result<(), ApiError> {
        remove::<SmartCampaign>(self.client, ctx, id, &FormParams::new()).await
    }

    /// Schedule a batch run of the campaign
    pub async fn schedule(
        &self,
        ctx: &Context,
        id: &str,
        schedule: &Schedule,
    ) -> Result<(), ApiError> {
        let body = ScheduleBody {
            input: ScheduleInput {
                run_at: &schedule.run_at,
                tokens: schedule
                    .tokens
                    .iter()
                    .map(|(name, value)| TokenValue { name, value })
                    .collect(),
            },
        };

        tracing::debug!("Scheduling smart campaign {} at {}", id, schedule.run_at);
        self.client
            .post_json(
                ctx,
                &format!("/rest/v1/campaigns/{}/schedule.json", urlencoding::encode(id)),
                &body,
            )
            .await
            .map(|_| ())
    }
}
