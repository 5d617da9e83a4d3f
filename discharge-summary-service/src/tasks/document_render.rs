use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use graph_flow::{Context, GraphError, NextAction, Result, Task, TaskResult};
use tracing::{error, info};

use super::types::session_keys;
use crate::models::PatientRecord;
use crate::render::{document_filename, render_document};

/// Renders the record and the reviewed summary into a PDF kept on the session.
pub struct DocumentRenderTask;

#[async_trait]
impl Task for DocumentRenderTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let record: PatientRecord = context
            .get(session_keys::PATIENT_RECORD)
            .await
            .ok_or_else(|| GraphError::InvalidInput("No patient record loaded".to_string()))?;
        let summary: String = context
            .get(session_keys::DISCHARGE_SUMMARY)
            .await
            .ok_or_else(|| {
                GraphError::InvalidInput(
                    "No discharge summary generated yet. Please generate a summary first."
                        .to_string(),
                )
            })?;

        let pdf = render_document(&record, &summary).map_err(|e| {
            error!(error = %e, "Failed to render discharge summary PDF");
            GraphError::TaskExecutionFailed(format!("Error generating PDF: {}", e))
        })?;

        let filename = document_filename(&record);
        info!(filename = %filename, bytes = pdf.len(), "Discharge summary PDF ready");

        context
            .set(session_keys::DOCUMENT_PDF, STANDARD.encode(&pdf))
            .await?;
        context
            .set(session_keys::DOCUMENT_FILENAME, &filename)
            .await?;

        Ok(TaskResult::new_with_status(
            Some(filename),
            NextAction::End,
            Some("Discharge summary PDF generated".to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::PatientGenerator;
    use crate::vocabulary::Vocabulary;

    #[tokio::test]
    async fn stores_pdf_and_filename() {
        let context = Context::new();
        let record = PatientGenerator::new(Vocabulary::default())
            .unwrap()
            .generate();
        let expected_name = document_filename(&record);
        context
            .set(session_keys::PATIENT_RECORD, record)
            .await
            .unwrap();
        context
            .set(session_keys::DISCHARGE_SUMMARY, "Stable at discharge.")
            .await
            .unwrap();

        let result = DocumentRenderTask.run(context.clone()).await.unwrap();

        assert_eq!(result.next_action, NextAction::End);
        assert_eq!(result.response.as_deref(), Some(expected_name.as_str()));
        let encoded: String = context.get(session_keys::DOCUMENT_PDF).await.unwrap();
        let pdf = STANDARD.decode(encoded).unwrap();
        assert!(pdf.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn refuses_without_summary() {
        let context = Context::new();
        let record = PatientGenerator::new(Vocabulary::default())
            .unwrap()
            .generate();
        context
            .set(session_keys::PATIENT_RECORD, record)
            .await
            .unwrap();

        let err = DocumentRenderTask.run(context).await.unwrap_err();
        assert!(matches!(err, GraphError::InvalidInput(_)));
    }
}
