use rand::Rng;

use crate::config::{AppConfig, GenerationConfig};
use crate::error::{AppError, AppResult};
use crate::models::{GenerationRequest, PersistedMetric, Record};
use crate::services::completion::CompletionClient;
use crate::services::normalizer::{is_diagnostic, normalize_with_strategy};
use crate::services::prompt::PromptBuilder;
use crate::services::storage::{open_store, MetricStore, RETRIEVAL_LIMIT};
use crate::services::synthesizer::RecordSynthesizer;
use crate::services::validation::validate_records;

/// Runs one request end to end: prompt, remote call, recovery, persistence.
/// Every step is awaited in order and nothing is shared between calls apart
/// from the HTTP client and the store.
pub struct GenerationService {
    pub completion: CompletionClient,
    pub prompt_builder: PromptBuilder,
    pub store: Box<dyn MetricStore>,
    pub config: GenerationConfig,
}

impl GenerationService {
    pub fn new(completion: CompletionClient, store: Box<dyn MetricStore>, config: GenerationConfig) -> Self {
        Self {
            completion,
            prompt_builder: PromptBuilder::new(),
            store,
            config,
        }
    }

    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let completion = CompletionClient::new(config.completion.clone())?;
        let store = open_store(&config.storage)?;

        tracing::info!(
            backend = %store.kind(),
            dataset = store.dataset(),
            model = %config.completion.model,
            "generation service ready"
        );

        Ok(Self::new(completion, store, config.generation.clone()))
    }

    /// Free-form table generation. The records are returned to the caller
    /// and not stored.
    pub async fn generate_records(&self, request: &GenerationRequest) -> AppResult<Vec<Record>> {
        request.validate()?;

        let prompt = self.prompt_builder.build(&request.description, request.rows, &request.columns);
        let raw = self.completion.complete(&prompt).await?;

        let expected_columns = request.column_names();
        let normalized = normalize_with_strategy(&raw, request.rows as usize, expected_columns.as_deref());
        validate_records(
            &normalized,
            request.rows as usize,
            expected_columns.as_deref(),
            self.config.validation,
        )?;

        tracing::info!(
            rows = normalized.records.len(),
            requested = request.rows,
            strategy = %normalized.strategy,
            "generated records"
        );

        Ok(normalized.records)
    }

    /// Asks the remote model for metric rows, maps them onto the stored shape
    /// and persists them with the remote policy.
    pub async fn generate_metrics(&self, data_type: &str, count: u32) -> AppResult<Vec<PersistedMetric>> {
        let request =
            GenerationRequest::new(data_type, count).with_columns(PersistedMetric::column_specs());
        request.validate()?;

        let prompt = self.prompt_builder.build(&request.description, request.rows, &request.columns);
        let raw = self.completion.complete(&prompt).await?;

        let expected_columns = request.column_names();
        let normalized = normalize_with_strategy(&raw, count as usize, expected_columns.as_deref());
        validate_records(&normalized, count as usize, expected_columns.as_deref(), self.config.validation)?;

        let metrics = Self::map_metrics(&normalized.records)?;
        let skipped = normalized.records.len() - metrics.len();
        if skipped > 0 {
            tracing::warn!(skipped, "dropped diagnostic records before persisting");
        }

        self.store.persist(&metrics, self.config.remote_policy)?;

        Ok(metrics)
    }

    fn map_metrics(records: &[Record]) -> AppResult<Vec<PersistedMetric>> {
        Self::map_metrics_with(records, &mut RecordSynthesizer::new())
    }

    /// Ids already present in the reply are reserved first so a drawn
    /// fallback id never lands on one of them.
    fn map_metrics_with<R: Rng>(
        records: &[Record],
        synthesizer: &mut RecordSynthesizer<R>,
    ) -> AppResult<Vec<PersistedMetric>> {
        for id in records.iter().filter_map(PersistedMetric::record_id) {
            synthesizer.reserve_id(id);
        }

        let mut metrics = Vec::with_capacity(records.len());
        for record in records.iter().filter(|r| !is_diagnostic(r)) {
            let metric = PersistedMetric::from_record(record, || synthesizer.next_id().map_err(AppError::from))?;
            metrics.push(metric);
        }

        Ok(metrics)
    }

    /// Offline path: no remote call. A fresh synthesizer per call, so ids are
    /// only unique within the batch.
    pub fn synthesize(&self, count: u32) -> AppResult<Vec<PersistedMetric>> {
        if count == 0 {
            return Err(AppError::Validation("record count must be at least 1".to_string()));
        }

        let metrics = RecordSynthesizer::new().synthesize(count as usize)?;
        self.store.persist(&metrics, self.config.offline_policy)?;
        Ok(metrics)
    }

    pub fn recent_metrics(&self) -> AppResult<Vec<PersistedMetric>> {
        Ok(self.store.fetch_recent(RETRIEVAL_LIMIT)?)
    }
}
