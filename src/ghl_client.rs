use moka::future::Cache;
use serde_json::Value;
use std::time::Duration;

use crate::errors::AppError;

/// Client for the GHL REST API.
///
/// The reconciliation pipeline only needs one call: resolving a
/// `(pipelineId, stageId)` pair to a stage label when a webhook delivers
/// stage as IDs. The pipeline catalog changes rarely, so resolved names
/// are cached for an hour.
#[derive(Clone)]
pub struct GhlClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    stage_names: Cache<String, String>,
}

impl GhlClient {
    pub fn new(base_url: String, api_key: String) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::ExternalApi(format!("Failed to create GHL client: {}", e)))?;

        let stage_names = Cache::builder()
            .time_to_live(Duration::from_secs(3600))
            .max_capacity(10_000)
            .build();

        Ok(Self {
            client,
            base_url,
            api_key,
            stage_names,
        })
    }

    /// Resolve a pipeline stage ID to its human-readable name.
    ///
    /// Returns `Ok(None)` when the pipeline or stage is unknown to GHL;
    /// transport and non-2xx responses are errors.
    pub async fn get_stage_name_by_id(
        &self,
        pipeline_id: &str,
        stage_id: &str,
    ) -> Result<Option<String>, AppError> {
        let cache_key = format!("{}:{}", pipeline_id, stage_id);
        if let Some(name) = self.stage_names.get(&cache_key).await {
            return Ok(Some(name));
        }

        let url = format!("{}/v1/pipelines/", self.base_url);
        tracing::debug!(pipeline_id, stage_id, "fetching pipeline catalog from GHL");

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| AppError::ExternalApi(format!("GHL request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApi(format!(
                "GHL returned {}: {}",
                status, error_text
            )));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| AppError::ExternalApi(format!("Failed to parse GHL response: {}", e)))?;

        let name = find_stage_name(&data, pipeline_id, stage_id);
        match name {
            Some(name) => {
                self.stage_names.insert(cache_key, name.clone()).await;
                Ok(Some(name))
            }
            None => {
                tracing::warn!(pipeline_id, stage_id, "stage not found in GHL pipelines");
                Ok(None)
            }
        }
    }
}

/// Walk the pipelines response: `{"pipelines": [{id, stages: [{id, name}]}]}`.
fn find_stage_name(data: &Value, pipeline_id: &str, stage_id: &str) -> Option<String> {
    data.get("pipelines")?
        .as_array()?
        .iter()
        .find(|p| p.get("id").and_then(Value::as_str) == Some(pipeline_id))?
        .get("stages")?
        .as_array()?
        .iter()
        .find(|s| s.get("id").and_then(Value::as_str) == Some(stage_id))?
        .get("name")?
        .as_str()
        .map(str::to_string)
}
