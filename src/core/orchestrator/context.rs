use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::StepKind;
use crate::core::store::types::RepositoryRecord;

/// Accumulated step payloads for one run, keyed by step key. Threaded through
/// the step loop by value: each step receives a snapshot and the driver
/// produces the next context with [`WorkflowContext::with_result`].
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowContext {
    pub run_id: String,
    pub repository: RepositoryRecord,
    pub results: BTreeMap<String, Value>,
}

impl WorkflowContext {
    pub fn new(run_id: &str, repository: RepositoryRecord) -> Self {
        Self {
            run_id: run_id.to_string(),
            repository,
            results: BTreeMap::new(),
        }
    }

    pub fn with_result(mut self, step: StepKind, payload: Value) -> Self {
        self.results.insert(step.step_key().to_string(), payload);
        self
    }

    pub fn result(&self, step: StepKind) -> Option<&Value> {
        self.results.get(step.step_key())
    }

    /// Numeric field of an earlier step's payload; `0` when the step did not
    /// run, failed, or did not report the field.
    pub fn metric(&self, step: StepKind, field: &str) -> u64 {
        self.result(step)
            .and_then(|v| v.get(field))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }

    pub fn metric_f64(&self, step: StepKind, field: &str) -> f64 {
        self.result(step)
            .and_then(|v| v.get(field))
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
    }
}
