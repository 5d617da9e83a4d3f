use async_trait::async_trait;
use graph_flow::{Context, GraphError, NextAction, Result, Task, TaskResult};
use std::sync::Arc;
use tracing::{info, warn};

use super::types::session_keys;
use crate::models::PatientRecord;
use crate::summary::{SummaryGenerator, request_summary};

/// Asks the text-generation service for a summary of the current record.
/// A failed request stores the fallback text instead of failing the step.
pub struct SummaryRequestTask {
    generator: Arc<dyn SummaryGenerator>,
}

impl SummaryRequestTask {
    pub fn new(generator: Arc<dyn SummaryGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Task for SummaryRequestTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let record: PatientRecord = context
            .get(session_keys::PATIENT_RECORD)
            .await
            .ok_or_else(|| GraphError::InvalidInput("No patient record loaded".to_string()))?;

        info!(mrn = %record.patient_info.mrn, "Requesting discharge summary");
        let outcome = request_summary(self.generator.as_ref(), &record).await;

        context
            .set(session_keys::DISCHARGE_SUMMARY, &outcome.text)
            .await?;
        context
            .set(session_keys::SUMMARY_IS_FALLBACK, outcome.is_fallback)
            .await?;
        context.remove(session_keys::DOCUMENT_PDF).await;
        context.remove(session_keys::DOCUMENT_FILENAME).await;

        let status = if outcome.is_fallback {
            warn!("Stored fallback discharge summary");
            "Discharge summary could not be generated; fallback text stored"
        } else {
            "Discharge summary generated, ready for review"
        };

        Ok(TaskResult::new_with_status(
            Some(outcome.text),
            NextAction::Continue,
            Some(status.to_string()),
        ))
    }
}
