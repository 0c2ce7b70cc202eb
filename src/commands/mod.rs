pub mod data;

pub use data::{fetch_data, generate_data, generate_metrics, synthesize, MetricBatch, MetricsPayload, SynthesizePayload};
