use std::collections::HashSet;
use std::fmt;
use std::ops::RangeInclusive;

use chrono::{Duration, SecondsFormat, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::error::AppError;
use crate::models::PersistedMetric;

pub const MODEL_CATALOG: [&str; 5] = ["GPT-4", "Claude", "Gemini", "LLaMA", "PaLM"];
pub const TASK_CATALOG: [&str; 5] = ["text_generation", "summarization", "translation", "qa", "classification"];

pub const DEFAULT_ID_RANGE: RangeInclusive<i64> = 1000..=99999;
const MAX_DRAW_ATTEMPTS: usize = 10_000;

#[derive(Debug)]
pub enum SynthesisError {
    IdentifierExhausted(String),
}

impl fmt::Display for SynthesisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SynthesisError::IdentifierExhausted(msg) => write!(f, "Identifier pool exhausted: {}", msg),
        }
    }
}

impl std::error::Error for SynthesisError {}

impl From<SynthesisError> for AppError {
    fn from(err: SynthesisError) -> Self {
        match err {
            SynthesisError::IdentifierExhausted(msg) => AppError::IdentifierExhausted(msg),
        }
    }
}

/// Ids already handed out by one generator instance. Does not look at
/// persisted rows, so uniqueness only holds within the instance.
#[derive(Debug, Clone)]
pub struct IdentifierPool {
    range: RangeInclusive<i64>,
    issued: HashSet<i64>,
    issued_in_range: usize,
}

impl Default for IdentifierPool {
    fn default() -> Self {
        Self::with_range(DEFAULT_ID_RANGE)
    }
}

impl IdentifierPool {
    pub fn with_range(range: RangeInclusive<i64>) -> Self {
        Self {
            range,
            issued: HashSet::new(),
            issued_in_range: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        if self.range.is_empty() {
            0
        } else {
            (self.range.end() - self.range.start() + 1) as usize
        }
    }

    pub fn issued(&self) -> usize {
        self.issued.len()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.issued.contains(&id)
    }

    pub fn allocate<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<i64, SynthesisError> {
        if self.issued_in_range >= self.capacity() {
            return Err(SynthesisError::IdentifierExhausted(format!(
                "all {} ids in {}..={} have been issued",
                self.capacity(),
                self.range.start(),
                self.range.end()
            )));
        }

        for _ in 0..MAX_DRAW_ATTEMPTS {
            let candidate = rng.gen_range(self.range.clone());
            if self.issued.insert(candidate) {
                self.issued_in_range += 1;
                return Ok(candidate);
            }
        }

        Err(SynthesisError::IdentifierExhausted(format!(
            "no free id found after {} draws ({} of {} issued)",
            MAX_DRAW_ATTEMPTS,
            self.issued_in_range,
            self.capacity()
        )))
    }

    /// Reserves an id that came from somewhere else, e.g. a remote record.
    /// Ids outside the range are remembered but do not use up capacity.
    pub fn reserve(&mut self, id: i64) -> bool {
        let inserted = self.issued.insert(id);
        if inserted && self.range.contains(&id) {
            self.issued_in_range += 1;
        }
        inserted
    }
}

pub struct RecordSynthesizer<R: Rng = StdRng> {
    rng: R,
    pool: IdentifierPool,
}

impl RecordSynthesizer<StdRng> {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }
}

impl Default for RecordSynthesizer<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> RecordSynthesizer<R> {
    pub fn with_rng(rng: R) -> Self {
        Self {
            rng,
            pool: IdentifierPool::default(),
        }
    }

    pub fn with_pool(mut self, pool: IdentifierPool) -> Self {
        self.pool = pool;
        self
    }

    pub fn pool(&self) -> &IdentifierPool {
        &self.pool
    }

    pub fn next_id(&mut self) -> Result<i64, SynthesisError> {
        self.pool.allocate(&mut self.rng)
    }

    pub fn reserve_id(&mut self, id: i64) -> bool {
        self.pool.reserve(id)
    }

    pub fn synthesize(&mut self, count: usize) -> Result<Vec<PersistedMetric>, SynthesisError> {
        let mut metrics = Vec::with_capacity(count);
        for _ in 0..count {
            metrics.push(self.synthesize_one()?);
        }

        tracing::debug!(count, issued = self.pool.issued(), "synthesized metric records");

        Ok(metrics)
    }

    fn synthesize_one(&mut self) -> Result<PersistedMetric, SynthesisError> {
        let id = self.next_id()?;
        let rng = &mut self.rng;

        let model_name = MODEL_CATALOG.choose(rng).copied().unwrap_or(MODEL_CATALOG[0]);
        let task_type = TASK_CATALOG.choose(rng).copied().unwrap_or(TASK_CATALOG[0]);
        let days_ago = rng.gen_range(0..=30);
        let timestamp = (Utc::now() - Duration::days(days_ago)).to_rfc3339_opts(SecondsFormat::Secs, true);

        Ok(PersistedMetric {
            id,
            model_name: model_name.to_string(),
            task_type: task_type.to_string(),
            input_tokens: rng.gen_range(50..=2000),
            output_tokens: rng.gen_range(10..=500),
            latency_ms: round_to(rng.gen_range(100.0..=3000.0), 2),
            accuracy_score: round_to(rng.gen_range(0.70..=0.99), 3),
            timestamp,
            user_rating: rng.gen_range(1..=5),
            cost_usd: round_to(rng.gen_range(0.001..=0.1), 4),
        })
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
