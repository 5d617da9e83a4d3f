use async_trait::async_trait;
use chrono::Local;
use graph_flow::{Context, GraphError, NextAction, Result, Task, TaskResult};
use tracing::{info, warn};

use super::types::{RecordSource, session_keys};
use crate::generator::PatientGenerator;
use crate::ingest;
use crate::models::PatientRecord;

/// Replaces the session's patient record. The summary and any rendered document
/// belonged to the previous record and are dropped with it.
pub struct LoadRecordTask {
    generator: PatientGenerator,
}

impl LoadRecordTask {
    pub fn new(generator: PatientGenerator) -> Self {
        Self { generator }
    }

    fn build_record(&self, source: RecordSource) -> Result<PatientRecord> {
        let record = match source {
            RecordSource::Synthetic => self.generator.generate(),
            RecordSource::Record { record } => {
                ingest::check_record(record, Local::now().date_naive())
                    .map_err(|e| GraphError::InvalidInput(e.to_string()))?
            }
            RecordSource::Upload { format, body } => {
                ingest::parse_upload(format, body.as_bytes())
                    .map_err(|e| GraphError::InvalidInput(e.to_string()))?
            }
            RecordSource::Manual { entry } => ingest::from_manual_entry(entry)
                .map_err(|e| GraphError::InvalidInput(e.to_string()))?,
        };
        Ok(record)
    }
}

#[async_trait]
impl Task for LoadRecordTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let source = match context.remove(session_keys::RECORD_SOURCE).await {
            Some(value) => serde_json::from_value::<RecordSource>(value)?,
            None => {
                warn!("No record source in context, generating a synthetic patient");
                RecordSource::Synthetic
            }
        };
        let label = source.label();
        info!(source = label, "Loading patient record");

        let record = self.build_record(source)?;

        context.set(session_keys::PATIENT_RECORD, &record).await?;
        context.remove(session_keys::DISCHARGE_SUMMARY).await;
        context.remove(session_keys::SUMMARY_IS_FALLBACK).await;
        context.remove(session_keys::SUMMARY_EDIT).await;
        context.remove(session_keys::DOCUMENT_PDF).await;
        context.remove(session_keys::DOCUMENT_FILENAME).await;

        info!(
            mrn = %record.patient_info.mrn,
            length_of_stay = record.admission_info.length_of_stay,
            "Patient record loaded"
        );

        Ok(TaskResult::new_with_status(
            None,
            NextAction::Continue,
            Some(format!("Patient record loaded from {}", label)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UploadFormat;
    use crate::vocabulary::Vocabulary;

    fn task() -> LoadRecordTask {
        LoadRecordTask::new(PatientGenerator::new(Vocabulary::default()).unwrap())
    }

    #[tokio::test]
    async fn synthetic_source_replaces_record_and_clears_summary() {
        let context = Context::new();
        context
            .set(session_keys::DISCHARGE_SUMMARY, "old summary")
            .await
            .unwrap();
        context
            .set(session_keys::RECORD_SOURCE, RecordSource::Synthetic)
            .await
            .unwrap();

        let result = task().run(context.clone()).await.unwrap();

        assert_eq!(result.next_action, NextAction::Continue);
        assert!(context.contains(session_keys::PATIENT_RECORD));
        assert!(!context.contains(session_keys::DISCHARGE_SUMMARY));
        assert!(!context.contains(session_keys::RECORD_SOURCE));
    }

    #[tokio::test]
    async fn bad_upload_keeps_previous_record() {
        let context = Context::new();
        context
            .set(session_keys::RECORD_SOURCE, RecordSource::Synthetic)
            .await
            .unwrap();
        task().run(context.clone()).await.unwrap();
        let before: PatientRecord = context.get(session_keys::PATIENT_RECORD).await.unwrap();

        context
            .set(
                session_keys::RECORD_SOURCE,
                RecordSource::Upload {
                    format: UploadFormat::Json,
                    body: "not json".to_string(),
                },
            )
            .await
            .unwrap();
        let err = task().run(context.clone()).await.unwrap_err();

        assert!(matches!(err, GraphError::InvalidInput(_)));
        let after: PatientRecord = context.get(session_keys::PATIENT_RECORD).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn replacement_record_is_validated() {
        let context = Context::new();
        context
            .set(session_keys::RECORD_SOURCE, RecordSource::Synthetic)
            .await
            .unwrap();
        task().run(context.clone()).await.unwrap();
        let mut record: PatientRecord = context.get(session_keys::PATIENT_RECORD).await.unwrap();
        record.patient_info.last_name = " ".to_string();

        context
            .set(session_keys::RECORD_SOURCE, RecordSource::Record { record })
            .await
            .unwrap();
        let err = task().run(context.clone()).await.unwrap_err();

        assert!(matches!(err, GraphError::InvalidInput(message) if message.contains("Last name")));
    }
}
