use crate::generator::PatientGenerator;
use crate::summary::SummaryGenerator;
use crate::tasks::*;
use graph_flow::{FlowRunner, Graph, GraphBuilder, Result, Session, SessionStorage, Task};
use std::any::type_name;
use std::sync::Arc;
use uuid::Uuid;

/// Id of the task type `T` inside the discharge workflow graph.
pub fn task_id<T: Task>() -> &'static str {
    type_name::<T>()
}

pub fn build_discharge_workflow(
    patient_generator: PatientGenerator,
    summary_generator: Arc<dyn SummaryGenerator>,
) -> Graph {
    let load_record_task = Arc::new(LoadRecordTask::new(patient_generator));
    let load_record_id = load_record_task.id().to_string();

    let summary_request_task = Arc::new(SummaryRequestTask::new(summary_generator));
    let summary_request_id = summary_request_task.id().to_string();

    let summary_review_task = Arc::new(SummaryReviewTask);
    let summary_review_id = summary_review_task.id().to_string();

    let document_render_task = Arc::new(DocumentRenderTask);
    let document_render_id = document_render_task.id().to_string();

    GraphBuilder::new("discharge_summary_workflow")
        .add_task(load_record_task)
        .add_task(summary_request_task)
        .add_task(summary_review_task)
        .add_task(document_render_task)
        .add_edge(&load_record_id, &summary_request_id)
        .add_edge(&summary_request_id, &summary_review_id)
        .add_edge(&summary_review_id, &document_render_id)
        .build()
}

/// New session positioned at the record loader with a synthetic record queued.
pub async fn create_discharge_session() -> Result<Session> {
    let session_id = Uuid::new_v4().to_string();
    let session = Session::new_from_task(session_id, task_id::<LoadRecordTask>());
    session
        .context
        .set(session_keys::RECORD_SOURCE, RecordSource::Synthetic)
        .await?;

    Ok(session)
}

pub fn create_flow_runner(graph: Graph, session_storage: Arc<dyn SessionStorage>) -> FlowRunner {
    FlowRunner::new(Arc::new(graph), session_storage)
}
