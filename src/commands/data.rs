use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::models::{ApiResponse, GenerationRequest, PersistedMetric, Record};
use crate::services::GenerationService;

pub const DEFAULT_DATA_TYPE: &str = "AI model performance metrics";
pub const DEFAULT_METRIC_RECORDS: u32 = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsPayload {
    #[serde(default = "default_data_type")]
    pub data_type: String,
    #[serde(default = "default_metric_records")]
    pub records: u32,
}

impl Default for MetricsPayload {
    fn default() -> Self {
        Self {
            data_type: default_data_type(),
            records: default_metric_records(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SynthesizePayload {
    #[serde(default = "default_metric_records")]
    pub records: u32,
}

impl Default for SynthesizePayload {
    fn default() -> Self {
        Self {
            records: default_metric_records(),
        }
    }
}

fn default_data_type() -> String {
    DEFAULT_DATA_TYPE.to_string()
}

fn default_metric_records() -> u32 {
    DEFAULT_METRIC_RECORDS
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MetricBatch {
    pub records: Vec<PersistedMetric>,
    pub source: String,
}

pub async fn generate_data(payload: GenerationRequest, service: &GenerationService) -> ApiResponse<Vec<Record>> {
    match service.generate_records(&payload).await {
        Ok(records) => {
            let message = format!("Generated {} rows successfully", records.len());
            ApiResponse::success(records, message)
        }
        Err(e) => {
            tracing::error!(error = %e, "generate_data failed");
            ApiResponse::error(e.to_string())
        }
    }
}

pub async fn generate_metrics(payload: MetricsPayload, service: &GenerationService) -> ApiResponse<MetricBatch> {
    match service.generate_metrics(&payload.data_type, payload.records).await {
        Ok(records) => {
            let message = format!("Generated {} {} records", records.len(), payload.data_type);
            ApiResponse::success(
                MetricBatch {
                    records,
                    source: "remote".to_string(),
                },
                message,
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "generate_metrics failed");
            ApiResponse::error(e.to_string())
        }
    }
}

pub fn synthesize(payload: SynthesizePayload, service: &GenerationService) -> ApiResponse<MetricBatch> {
    match service.synthesize(payload.records) {
        Ok(records) => {
            let message = format!("Generated {} records locally", records.len());
            ApiResponse::success(
                MetricBatch {
                    records,
                    source: "offline".to_string(),
                },
                message,
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "synthesize failed");
            ApiResponse::error(e.to_string())
        }
    }
}

pub fn fetch_data(service: &GenerationService) -> AppResult<Vec<PersistedMetric>> {
    service.recent_metrics()
}
