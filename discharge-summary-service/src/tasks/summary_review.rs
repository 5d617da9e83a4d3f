use async_trait::async_trait;
use graph_flow::{Context, GraphError, NextAction, Result, Task, TaskResult};
use tracing::info;

use super::types::session_keys;

/// Human review checkpoint. An edit replaces the summary wholesale; without one
/// the session waits here.
pub struct SummaryReviewTask;

#[async_trait]
impl Task for SummaryReviewTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let edit = context.remove(session_keys::SUMMARY_EDIT).await;
        if !context.contains(session_keys::DISCHARGE_SUMMARY) {
            return Err(GraphError::InvalidInput(
                "No discharge summary to review; generate one first".to_string(),
            ));
        }

        let Some(edited) = edit else {
            info!("Waiting for review of the discharge summary");
            return Ok(TaskResult::new_with_status(
                None,
                NextAction::WaitForInput,
                Some("Review and edit the summary, then generate the PDF".to_string()),
            ));
        };
        let edited: String = serde_json::from_value(edited)?;

        info!(characters = edited.len(), "Discharge summary edited");
        context.set(session_keys::DISCHARGE_SUMMARY, &edited).await?;
        context.set(session_keys::SUMMARY_IS_FALLBACK, false).await?;
        context.remove(session_keys::DOCUMENT_PDF).await;
        context.remove(session_keys::DOCUMENT_FILENAME).await;

        Ok(TaskResult::new_with_status(
            None,
            NextAction::Continue,
            Some("Summary updated, ready to generate the PDF".to_string()),
        ))
    }
}
