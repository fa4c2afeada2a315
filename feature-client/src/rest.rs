use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::domain::{Extent, FieldMap, MeterRecord};
use crate::error::{FeatureStoreError, Result};
use crate::store::{AttributeUpdate, EditResult, FeatureStore, PageRequest};
use crate::wire::{self, ApplyEditsResponse, ExtentResponse, QueryResponse};

/// Client for a hosted ArcGIS REST feature layer
/// (`https://.../FeatureServer/<layer>`).
pub struct ArcGisFeatureStore {
    client: reqwest::Client,
    layer_url: String,
    fields: FieldMap,
    out_sr: Option<u32>,
    token: Option<String>,
}

impl ArcGisFeatureStore {
    pub fn new(layer_url: impl Into<String>, fields: FieldMap) -> Result<Self> {
        let layer_url = layer_url.into();
        let trimmed = layer_url.trim().trim_end_matches('/');
        if !(trimmed.starts_with("https://") || trimmed.starts_with("http://")) {
            return Err(FeatureStoreError::InvalidUrl(layer_url));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            layer_url: trimmed.to_string(),
            fields,
            out_sr: None,
            token: None,
        })
    }

    /// Ask the service to project geometry into this spatial reference.
    pub fn with_out_sr(mut self, wkid: u32) -> Self {
        self.out_sr = Some(wkid);
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn layer_url(&self) -> &str {
        &self.layer_url
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    fn base_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("f", "json".to_string())];
        if let Some(token) = &self.token {
            params.push(("token", token.clone()));
        }
        params
    }

    fn feature_params(&self) -> Vec<(&'static str, String)> {
        let mut params = self.base_params();
        params.push(("outFields", "*".to_string()));
        params.push(("returnGeometry", "true".to_string()));
        if let Some(wkid) = self.out_sr {
            params.push(("outSR", wkid.to_string()));
        }
        params
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&'static str, String)],
    ) -> Result<T> {
        let url = format!("{}/{}", self.layer_url, endpoint);
        let resp = self.client.get(&url).query(params).send().await?;
        let body = read_body(resp).await?;
        wire::decode(&body)
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&'static str, String)],
    ) -> Result<T> {
        let url = format!("{}/{}", self.layer_url, endpoint);
        let resp = self.client.post(&url).form(params).send().await?;
        let body = read_body(resp).await?;
        wire::decode(&body)
    }

    fn update_payload(&self, updates: &[AttributeUpdate]) -> Value {
        let edits: Vec<Value> = updates
            .iter()
            .map(|u| {
                let mut attributes = Map::new();
                attributes.insert(self.fields.object_id.clone(), Value::from(u.object_id));
                attributes.insert(
                    self.fields.account_update.clone(),
                    u.account_update.clone().map(Value::String).unwrap_or(Value::Null),
                );
                serde_json::json!({ "attributes": attributes })
            })
            .collect();
        Value::Array(edits)
    }
}

async fn read_body(resp: reqwest::Response) -> Result<String> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(FeatureStoreError::Api {
            status: status.as_u16(),
            message: body,
        });
    }
    Ok(resp.text().await?)
}

#[async_trait::async_trait]
impl FeatureStore for ArcGisFeatureStore {
    async fn query_page(&self, request: PageRequest) -> Result<Vec<MeterRecord>> {
        let mut params = self.feature_params();
        params.push(("where", request.where_clause));
        params.push(("orderByFields", format!("{} ASC", self.fields.object_id)));
        params.push(("resultOffset", request.offset.to_string()));
        params.push(("resultRecordCount", request.count.to_string()));

        let resp: QueryResponse = self.get_json("query", &params).await?;
        let records = resp.into_records(&self.fields)?;
        tracing::debug!(
            offset = request.offset,
            returned = records.len(),
            "feature service page fetched"
        );
        Ok(records)
    }

    async fn query_by_id(&self, object_id: i64) -> Result<Option<MeterRecord>> {
        let mut params = self.feature_params();
        params.push(("objectIds", object_id.to_string()));

        let resp: QueryResponse = self.get_json("query", &params).await?;
        let records = resp.into_records(&self.fields)?;
        Ok(records.into_iter().find(|r| r.object_id == object_id))
    }

    async fn apply_edits(&self, updates: &[AttributeUpdate]) -> Result<Vec<EditResult>> {
        let mut params = self.base_params();
        params.push(("updates", self.update_payload(updates).to_string()));

        let resp: ApplyEditsResponse = self.post_form("applyEdits", &params).await?;
        Ok(resp.into_results())
    }

    async fn query_extent(&self) -> Result<Option<Extent>> {
        let mut params = self.base_params();
        params.push(("where", "1=1".to_string()));
        params.push(("returnExtentOnly", "true".to_string()));
        if let Some(wkid) = self.out_sr {
            params.push(("outSR", wkid.to_string()));
        }

        let resp: ExtentResponse = self.get_json("query", &params).await?;
        Ok(resp.into_extent())
    }
}
